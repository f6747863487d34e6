//! Lesson prompt generation.
//!
//! This module provides `PromptGenerator`, which renders the lesson template for
//! a request and hands it to a streaming text-generation backend. The returned
//! chunk stream is passed through untouched; parsing happens once the caller
//! has drained it.

use std::sync::Arc;

use tracing::debug;

use crate::models::DifficultyLevel;
use crate::ollama::{ChunkStream, OllamaClientTrait, OllamaError};

/// Output shape requested for each language branch.
const BRANCH_FORMAT: &str = r#"{
        "lesson": "<prompt of lesson without a newline>",
        "questions": [
            {
                "question": "What is the term used for a person who runs in a race?",
                "options": ["Swimmer", "Runner", "Cyclist"],
                "answer": "Runner"
            }
        ]
    }"#;

/// Prompt template for lesson generation.
///
/// The two top-level keys are the language names exactly as the caller
/// supplied them; the parser looks the branches up by those same strings.
const PROMPT_TEMPLATE: &str = r#"Create a {level} level lesson of more than 100 words about {category} and suggest {num_questions} vocabulary questions to learn {learning_language} in multiple-choice format with {num_answers} answers each.
Show the correct answer for each question and translate the lesson, every question and every option to {translated_language}.
The translated branch must contain the same number of questions, in the same order, with the same number of options as the {learning_language} branch.
Do not include any explanations. Only provide an RFC8259 compliant JSON response following this format without deviation. The lesson must not include a newline or special characters:
{
    "{learning_language}": {format},
    "{translated_language}": {format}
}"#;

/// Renders the lesson prompt for one request.
///
/// # Examples
///
/// ```
/// use lexis::generator::render_prompt;
/// use lexis::DifficultyLevel;
///
/// let prompt = render_prompt("football", "vietnamese", "english", 5, 3, &DifficultyLevel::default());
/// assert!(prompt.contains("\"vietnamese\":"));
/// assert!(prompt.contains("\"english\":"));
/// ```
pub fn render_prompt(
    category: &str,
    learning_language: &str,
    translated_language: &str,
    num_questions: u32,
    num_answers: u32,
    level: &DifficultyLevel,
) -> String {
    let level = level.as_str().to_lowercase();
    let num_questions = num_questions.to_string();
    let num_answers = num_answers.to_string();
    let values = [
        ("{format}", BRANCH_FORMAT),
        ("{level}", level.as_str()),
        ("{num_questions}", num_questions.as_str()),
        ("{num_answers}", num_answers.as_str()),
        ("{category}", category),
        ("{learning_language}", learning_language),
        ("{translated_language}", translated_language),
    ];
    fill_placeholders(PROMPT_TEMPLATE, &values)
}

/// Substitutes every placeholder in one left-to-right pass.
///
/// Inserted values are never scanned again, so braces inside a category or
/// language name come through literally.
fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + BRANCH_FORMAT.len() * 2);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match values.iter().find(|(key, _)| rest.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &rest[key.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Builder for constructing `PromptGenerator` instances.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use lexis::generator::PromptGeneratorBuilder;
/// use lexis::ollama::OllamaClientBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Arc::new(OllamaClientBuilder::new().build()?);
/// let generator = PromptGeneratorBuilder::new()
///     .client(client)
///     .model("gemma3:4b")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct PromptGeneratorBuilder {
    client: Option<Arc<dyn OllamaClientTrait>>,
    model: Option<String>,
}

impl PromptGeneratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the streaming backend.
    pub fn client(mut self, client: Arc<dyn OllamaClientTrait>) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the model name passed to the backend on every request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the generator.
    ///
    /// # Errors
    ///
    /// Returns `OllamaError::Api` when no client was provided.
    pub fn build(self) -> Result<PromptGenerator, OllamaError> {
        let client = self.client.ok_or_else(|| OllamaError::Api {
            message: "PromptGenerator requires a client".to_string(),
        })?;
        Ok(PromptGenerator {
            client,
            model: self.model.unwrap_or_default(),
        })
    }
}

/// Turns a lesson request into a stream of generated text chunks.
pub struct PromptGenerator {
    client: Arc<dyn OllamaClientTrait>,
    model: String,
}

impl PromptGenerator {
    /// Creates a generator over the given backend and model.
    ///
    /// Prefer using `PromptGeneratorBuilder` for more ergonomic construction.
    #[must_use]
    pub fn new(client: Arc<dyn OllamaClientTrait>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Starts generating a lesson.
    ///
    /// # Errors
    ///
    /// Returns the backend's `OllamaError` unchanged when the stream cannot be
    /// opened. Failures after that arrive inside the stream.
    pub fn generate(
        &self,
        category: &str,
        learning_language: &str,
        translated_language: &str,
        num_questions: u32,
        num_answers: u32,
        level: &DifficultyLevel,
    ) -> Result<ChunkStream, OllamaError> {
        let prompt = render_prompt(
            category,
            learning_language,
            translated_language,
            num_questions,
            num_answers,
            level,
        );
        debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            "START STREAMING"
        );
        self.client.generate_stream(&self.model, &prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records the prompt it was given and replays fixed chunks.
    struct RecordingClient {
        chunks: Vec<&'static str>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl OllamaClientTrait for RecordingClient {
        fn generate_stream(&self, model: &str, prompt: &str) -> Result<ChunkStream, OllamaError> {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string()));
            let chunks: Vec<Result<String, OllamaError>> =
                self.chunks.iter().map(|c| Ok(c.to_string())).collect();
            Ok(Box::new(chunks.into_iter()))
        }
    }

    struct FailingClient;

    impl OllamaClientTrait for FailingClient {
        fn generate_stream(&self, _model: &str, _prompt: &str) -> Result<ChunkStream, OllamaError> {
            Err(OllamaError::Http { status: 503 })
        }
    }

    #[test]
    fn rendered_prompt_names_both_branches_verbatim() {
        let prompt =
            render_prompt("football", "Vietnamese", "english", 4, 3, &DifficultyLevel::default());

        assert!(prompt.contains("\"Vietnamese\": {"));
        assert!(prompt.contains("\"english\": {"));
        assert!(prompt.contains("about football"));
        assert!(prompt.contains("suggest 4 vocabulary questions"));
        assert!(prompt.contains("with 3 answers"));
        assert!(prompt.contains("easy level"));
    }

    #[test]
    fn rendered_prompt_has_no_unfilled_placeholders() {
        let prompt = render_prompt("food", "spanish", "english", 5, 3, &DifficultyLevel::default());
        for placeholder in [
            "{format}",
            "{level}",
            "{category}",
            "{num_questions}",
            "{num_answers}",
            "{learning_language}",
            "{translated_language}",
        ] {
            assert!(!prompt.contains(placeholder), "{placeholder} left in prompt");
        }
    }

    #[test]
    fn placeholder_text_in_user_input_is_kept_literally() {
        let prompt = render_prompt(
            "{translated_language} club",
            "spanish",
            "english",
            2,
            3,
            &DifficultyLevel::default(),
        );

        assert!(prompt.contains("about {translated_language} club"));
        assert!(!prompt.contains("about english club"));
        assert!(prompt.contains("\"english\": {"));
    }

    #[test]
    fn template_braces_survive_rendering() {
        let prompt = render_prompt("food", "spanish", "english", 1, 2, &DifficultyLevel::default());
        assert!(prompt.ends_with('}'));
        assert!(prompt.contains("\"lesson\": \"<prompt of lesson without a newline>\""));
    }

    #[test]
    fn generate_forwards_model_and_prompt() {
        let client = Arc::new(RecordingClient {
            chunks: vec!["{", "}"],
            seen: Mutex::new(Vec::new()),
        });
        let generator = PromptGenerator::new(client.clone(), "gemma3:4b");

        let chunks: Vec<String> = generator
            .generate("food", "spanish", "english", 2, 3, &DifficultyLevel::default())
            .unwrap()
            .map(|c| c.unwrap())
            .collect();

        assert_eq!(chunks, vec!["{", "}"]);
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "gemma3:4b");
        assert!(seen[0].1.contains("\"spanish\":"));
    }

    #[test]
    fn backend_errors_propagate_unchanged() {
        let generator = PromptGenerator::new(Arc::new(FailingClient), "m");
        let result =
            generator.generate("food", "spanish", "english", 2, 3, &DifficultyLevel::default());
        assert!(matches!(result, Err(OllamaError::Http { status: 503 })));
    }

    #[test]
    fn builder_requires_client() {
        let result = PromptGeneratorBuilder::new().model("m").build();
        assert!(matches!(result, Err(OllamaError::Api { .. })));
    }

    #[test]
    fn builder_sets_model() {
        let generator = PromptGeneratorBuilder::new()
            .client(Arc::new(FailingClient))
            .model("llama3.1:8b")
            .build()
            .unwrap();
        assert_eq!(generator.model(), "llama3.1:8b");
    }
}
