use serde::{Deserialize, Serialize};

use super::{CategoryId, DifficultyLevel};
use crate::error::VocabularyError;

pub const DEFAULT_NUM_QUESTIONS: u32 = 5;
pub const DEFAULT_NUM_ANSWERS: u32 = 3;
pub const MAX_NUM_QUESTIONS: u32 = 20;
pub const MIN_NUM_ANSWERS: u32 = 2;
pub const MAX_NUM_ANSWERS: u32 = 8;

/// Parameters for generating a new vocabulary lesson.
///
/// The language strings double as the top-level keys of the generated JSON,
/// so they are kept exactly as supplied.
///
/// # Examples
///
/// ```
/// use lexis::LessonRequest;
///
/// let request = LessonRequest::new("football", "vietnamese", "english")
///     .num_questions(1)
///     .num_answers(4);
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRequest {
    pub category: String,
    pub learning_language: String,
    pub translated_language: String,
    pub num_questions: u32,
    pub num_answers: u32,
    pub level: DifficultyLevel,
}

impl LessonRequest {
    /// Creates a request with the default question count, option count and level.
    pub fn new(
        category: impl Into<String>,
        learning_language: impl Into<String>,
        translated_language: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            learning_language: learning_language.into(),
            translated_language: translated_language.into(),
            num_questions: DEFAULT_NUM_QUESTIONS,
            num_answers: DEFAULT_NUM_ANSWERS,
            level: DifficultyLevel::default(),
        }
    }

    pub fn num_questions(mut self, num_questions: u32) -> Self {
        self.num_questions = num_questions;
        self
    }

    pub fn num_answers(mut self, num_answers: u32) -> Self {
        self.num_answers = num_answers;
        self
    }

    pub fn level(mut self, level: DifficultyLevel) -> Self {
        self.level = level;
        self
    }

    /// Checks the request shape. Language support is checked by the service.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::InvalidRequest` describing the first problem found.
    pub fn validate(&self) -> Result<(), VocabularyError> {
        if self.category.trim().is_empty() {
            return Err(VocabularyError::InvalidRequest(
                "category cannot be empty".to_string(),
            ));
        }
        if self.learning_language.trim().is_empty() || self.translated_language.trim().is_empty()
        {
            return Err(VocabularyError::InvalidRequest(
                "languages cannot be empty".to_string(),
            ));
        }
        if self
            .learning_language
            .trim()
            .eq_ignore_ascii_case(self.translated_language.trim())
        {
            return Err(VocabularyError::InvalidRequest(
                "learning and translated language must differ".to_string(),
            ));
        }
        if !(1..=MAX_NUM_QUESTIONS).contains(&self.num_questions) {
            return Err(VocabularyError::InvalidRequest(format!(
                "num_questions must be between 1 and {MAX_NUM_QUESTIONS}"
            )));
        }
        if !(MIN_NUM_ANSWERS..=MAX_NUM_ANSWERS).contains(&self.num_answers) {
            return Err(VocabularyError::InvalidRequest(format!(
                "num_answers must be between {MIN_NUM_ANSWERS} and {MAX_NUM_ANSWERS}"
            )));
        }
        Ok(())
    }
}

/// Selects previously generated lessons for one category and learning language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFilter {
    pub category_id: CategoryId,
    pub learning_language: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_applies_defaults() {
        let request = LessonRequest::new("food", "spanish", "english");
        assert_eq!(request.num_questions, DEFAULT_NUM_QUESTIONS);
        assert_eq!(request.num_answers, DEFAULT_NUM_ANSWERS);
        assert_eq!(request.level.as_str(), "EASY");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn blank_category_is_rejected() {
        let request = LessonRequest::new("  ", "spanish", "english");
        assert!(matches!(
            request.validate(),
            Err(VocabularyError::InvalidRequest(msg)) if msg.contains("category")
        ));
    }

    #[test]
    fn identical_languages_are_rejected() {
        let request = LessonRequest::new("food", "English", "english");
        assert!(request.validate().is_err());
    }

    #[test]
    fn counts_outside_bounds_are_rejected() {
        let base = LessonRequest::new("food", "spanish", "english");
        assert!(base.clone().num_questions(0).validate().is_err());
        assert!(base.clone().num_questions(MAX_NUM_QUESTIONS + 1).validate().is_err());
        assert!(base.clone().num_answers(1).validate().is_err());
        assert!(base.clone().num_answers(MAX_NUM_ANSWERS + 1).validate().is_err());
        assert!(base.num_questions(1).num_answers(4).validate().is_ok());
    }

    #[test]
    fn deserialized_request_maps_legacy_level() {
        let json = r#"{"category":"food","learning_language":"spanish","translated_language":"english","num_questions":2,"num_answers":3,"level":2}"#;
        let request: LessonRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.level.as_str(), "INTERMEDIATE");

        let rejected = json.replace("\"level\":2", "\"level\":\"7\"");
        assert!(serde_json::from_str::<LessonRequest>(&rejected).is_err());
    }
}
