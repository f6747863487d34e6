use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{AnswerId, CategoryId, PromptId, QuestionId};

/// A translation row attached to a prompt, question or answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: i64,
    /// Upper-case name of the language the text is translated into.
    pub language: String,
    pub text: String,
}

/// A persisted answer option with its translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyAnswer {
    pub id: AnswerId,
    pub text: String,
    pub is_correct: bool,
    pub translations: Vec<Translation>,
}

/// A persisted question with its translations and answer options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyQuestion {
    pub id: QuestionId,
    pub text: String,
    pub translations: Vec<Translation>,
    pub answers: Vec<VocabularyAnswer>,
}

/// A previously generated lesson, loaded with its full nested graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyPrompt {
    pub id: PromptId,
    pub text: String,
    pub category_id: CategoryId,
    /// Upper-case learning language name.
    pub language: String,
    /// Upper-case difficulty level name.
    pub difficulty_level: String,
    pub is_valid: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub translations: Vec<Translation>,
    pub questions: Vec<VocabularyQuestion>,
}
