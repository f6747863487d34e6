//! Error taxonomy for the vocabulary pipeline.
//!
//! Storage and backend library errors are wrapped here before they leave the
//! repository or generator, so callers only ever match on `VocabularyError`.

use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::ollama::OllamaError;

/// Failures turning generated text into a lesson graph.
#[derive(Debug, Error)]
pub enum PromptParseError {
    /// The accumulated text is not valid JSON after normalisation.
    #[error("Can not parse prompt response to json: {0}")]
    Syntax(#[source] serde_json::Error),

    /// The response was valid JSON but not an object.
    #[error("Prompt response is not a JSON object")]
    NotAnObject,

    /// A language branch named in the request is absent.
    #[error("Prompt response has no '{0}' branch")]
    MissingBranch(String),

    /// The response contains keys other than the two language branches.
    #[error("Prompt response has unexpected key '{0}'")]
    UnexpectedKey(String),

    /// A branch does not match the lesson shape.
    #[error("Branch '{branch}' is malformed: {source}")]
    Shape {
        branch: String,
        #[source]
        source: serde_json::Error,
    },

    /// A branch has an empty `questions` list.
    #[error("Branch '{0}' has no questions")]
    NoQuestions(String),

    /// The two branches disagree on the number of questions or options.
    #[error("Branches differ in length at {location}: {learning} vs {translated}")]
    LengthMismatch {
        location: String,
        learning: usize,
        translated: usize,
    },

    /// A question's declared answer does not match exactly one option.
    #[error("Question {index} has {matches} options equal to its answer (expected exactly 1)")]
    AnswerMismatch { index: usize, matches: usize },
}

/// Errors surfaced by the vocabulary service and its collaborators.
#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("Authorization failed: {0}")]
    Auth(#[from] AuthError),

    /// The external text-generation backend failed or returned nothing usable.
    #[error("Lesson generation failed: {0}")]
    Generation(#[from] OllamaError),

    #[error(transparent)]
    PromptParse(#[from] PromptParseError),

    #[error("{0} does not support yet!")]
    LanguageNotSupported(String),

    #[error("Invalid difficulty level: {0}")]
    InvalidLevel(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl VocabularyError {
    /// Numeric code reported to clients in error payloads.
    pub fn code(&self) -> u32 {
        match self {
            VocabularyError::Storage(_) => 10000,
            VocabularyError::Auth(_) => 10001,
            VocabularyError::PromptParse(_) => 10002,
            VocabularyError::LanguageNotSupported(_) | VocabularyError::InvalidLevel(_) => 10003,
            VocabularyError::NotFound { .. } => 10004,
            VocabularyError::InvalidRequest(_) => 10005,
            VocabularyError::Generation(_) => 10006,
        }
    }

    /// Returns true for errors caused by the caller's input rather than by
    /// the backend or the store.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            VocabularyError::Auth(_)
                | VocabularyError::LanguageNotSupported(_)
                | VocabularyError::InvalidLevel(_)
                | VocabularyError::InvalidRequest(_)
                | VocabularyError::NotFound { .. }
        )
    }

    /// Structured payload for the out-of-band error signal.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

/// Error body sent to clients after a failed request or stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub code: u32,
    pub message: String,
}
