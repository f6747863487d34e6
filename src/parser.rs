//! Lesson response parsing.
//!
//! The backend answers with one JSON object holding two parallel branches,
//! keyed by the learning and translated language names. This module cleans the
//! raw text up, parses it, and maps the branches positionally into a
//! `LessonGraph`, rejecting anything that does not line up.

use serde::Deserialize;
use serde_json::Value;

use crate::error::PromptParseError;
use crate::models::{AnswerDraft, DifficultyLevel, LessonGraph, QuestionDraft};

/// One language branch of the backend response.
#[derive(Debug, Deserialize)]
struct LessonBranch {
    lesson: String,
    questions: Vec<QuestionBranch>,
}

#[derive(Debug, Deserialize)]
struct QuestionBranch {
    question: String,
    options: Vec<String>,
    answer: String,
}

/// Cleans raw backend text before JSON parsing.
///
/// Escaped `\n` sequences, newlines and carriage returns become spaces, and
/// any text around the outermost `{…}` (preambles, markdown fences) is
/// dropped.
///
/// # Examples
///
/// ```
/// use lexis::parser::normalize_response;
///
/// let raw = "Sure!\n```json\n{\"a\":\n\"b\"}\n```";
/// assert_eq!(normalize_response(raw), "{\"a\": \"b\"}");
/// ```
pub fn normalize_response(text: &str) -> String {
    let flattened = text
        .replace("\\n", " ")
        .replace('\n', " ")
        .replace('\r', " ");
    let trimmed = flattened.trim();

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start <= end => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

/// Normalises and parses backend text into a JSON value.
///
/// # Errors
///
/// Returns `PromptParseError::Syntax` when the cleaned text is not valid JSON.
pub fn parse_response(text: &str) -> Result<Value, PromptParseError> {
    serde_json::from_str(&normalize_response(text)).map_err(PromptParseError::Syntax)
}

/// Maps a parsed backend response into a lesson graph.
pub struct LessonParser;

impl LessonParser {
    /// Builds a `LessonGraph` from the two language branches of `value`.
    ///
    /// Branch keys are matched case-sensitively against the language names as
    /// given. Questions and options are paired by position; an answer option
    /// is correct when its learning-language text equals the learning
    /// branch's `answer` exactly.
    ///
    /// # Errors
    ///
    /// Returns a `PromptParseError` when the value is not an object, a branch
    /// is missing or malformed, an unexpected key is present, the branches
    /// differ in length, or a question does not have exactly one correct
    /// option.
    pub fn parse(
        category: &str,
        learning_language: &str,
        translated_language: &str,
        level: &DifficultyLevel,
        value: &Value,
    ) -> Result<LessonGraph, PromptParseError> {
        let object = value.as_object().ok_or(PromptParseError::NotAnObject)?;

        if let Some(key) = object
            .keys()
            .find(|key| *key != learning_language && *key != translated_language)
        {
            return Err(PromptParseError::UnexpectedKey(key.clone()));
        }

        let learning = read_branch(object.get(learning_language), learning_language)?;
        let translated = read_branch(object.get(translated_language), translated_language)?;

        if learning.questions.is_empty() {
            return Err(PromptParseError::NoQuestions(learning_language.to_string()));
        }
        check_length("questions", learning.questions.len(), translated.questions.len())?;

        let questions = learning
            .questions
            .into_iter()
            .zip(translated.questions)
            .enumerate()
            .map(|(index, (learning_q, translated_q))| {
                pair_question(index, learning_q, translated_q)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LessonGraph {
            category: category.to_string(),
            learning_language: learning_language.to_string(),
            translated_language: translated_language.to_string(),
            level: level.clone(),
            prompt: learning.lesson,
            translation: translated.lesson,
            questions,
        })
    }
}

fn read_branch(value: Option<&Value>, branch: &str) -> Result<LessonBranch, PromptParseError> {
    let value = value.ok_or_else(|| PromptParseError::MissingBranch(branch.to_string()))?;
    LessonBranch::deserialize(value).map_err(|source| PromptParseError::Shape {
        branch: branch.to_string(),
        source,
    })
}

fn check_length(
    location: &str,
    learning: usize,
    translated: usize,
) -> Result<(), PromptParseError> {
    if learning != translated {
        return Err(PromptParseError::LengthMismatch {
            location: location.to_string(),
            learning,
            translated,
        });
    }
    Ok(())
}

fn pair_question(
    index: usize,
    learning: QuestionBranch,
    translated: QuestionBranch,
) -> Result<QuestionDraft, PromptParseError> {
    check_length(
        &format!("questions[{index}].options"),
        learning.options.len(),
        translated.options.len(),
    )?;

    let matches = learning
        .options
        .iter()
        .filter(|option| **option == learning.answer)
        .count();
    if matches != 1 {
        return Err(PromptParseError::AnswerMismatch { index, matches });
    }

    let answers = learning
        .options
        .into_iter()
        .zip(translated.options)
        .map(|(text, translation)| AnswerDraft {
            is_correct: text == learning.answer,
            text,
            translation,
        })
        .collect();

    Ok(QuestionDraft {
        text: learning.question,
        translation: translated.question,
        answers,
    })
}
