use serde::{Deserialize, Serialize};

use super::{CategoryId, DifficultyLevel};

/// One answer option of a generated question, paired with its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDraft {
    /// Option text in the learning language.
    pub text: String,
    /// Option text in the translated language.
    pub translation: String,
    /// Whether this option is the declared answer.
    pub is_correct: bool,
}

/// One generated question with its translation and answer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub translation: String,
    pub answers: Vec<AnswerDraft>,
}

impl QuestionDraft {
    /// Returns the option flagged as correct, if exactly one is.
    pub fn correct_answer(&self) -> Option<&AnswerDraft> {
        let mut correct = self.answers.iter().filter(|answer| answer.is_correct);
        match (correct.next(), correct.next()) {
            (Some(answer), None) => Some(answer),
            _ => None,
        }
    }
}

/// In-memory lesson graph produced by parsing one generation response.
///
/// Holds everything the repository needs to write the prompt, its
/// translation, every question and every answer in a single transaction.
/// Language and category names are kept exactly as the caller supplied
/// them; canonicalisation happens at the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonGraph {
    pub category: String,
    pub learning_language: String,
    pub translated_language: String,
    pub level: DifficultyLevel,
    /// Lesson paragraph in the learning language.
    pub prompt: String,
    /// Lesson paragraph in the translated language.
    pub translation: String,
    pub questions: Vec<QuestionDraft>,
}

impl LessonGraph {
    /// Total number of answer options across all questions.
    pub fn answer_count(&self) -> usize {
        self.questions.iter().map(|q| q.answers.len()).sum()
    }
}

/// Terminal marker emitted after the last lesson chunk.
///
/// Lets a client correlate the streamed text with the persisted record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonMarker {
    pub category_id: CategoryId,
    pub learning_language: String,
}

impl LessonMarker {
    /// Renders the marker as the JSON chunk sent after the lesson text.
    pub fn to_chunk(&self) -> String {
        serde_json::json!({
            "category_id": self.category_id.get(),
            "learning_language": self.learning_language,
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str, is_correct: bool) -> AnswerDraft {
        AnswerDraft {
            text: text.to_string(),
            translation: text.to_string(),
            is_correct,
        }
    }

    #[test]
    fn correct_answer_requires_exactly_one_flag() {
        let mut question = QuestionDraft {
            text: "q".to_string(),
            translation: "q".to_string(),
            answers: vec![answer("a", false), answer("b", true)],
        };
        assert_eq!(question.correct_answer().map(|a| a.text.as_str()), Some("b"));

        question.answers.push(answer("c", true));
        assert!(question.correct_answer().is_none());

        question.answers.clear();
        assert!(question.correct_answer().is_none());
    }

    #[test]
    fn marker_serializes_with_raw_category_id() {
        let marker = LessonMarker {
            category_id: CategoryId::new(12),
            learning_language: "vietnamese".to_string(),
        };
        let json = serde_json::to_string(&marker).unwrap();
        assert_eq!(json, r#"{"category_id":12,"learning_language":"vietnamese"}"#);
        assert_eq!(marker.to_chunk(), json);
    }
}
