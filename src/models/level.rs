use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::VocabularyError;

/// Level names for the legacy numeric levels `1..=3`.
const LEGACY_LEVELS: [&str; 3] = ["EASY", "INTERMEDIATE", "ADVANCED"];

/// Difficulty tier attached to a lesson.
///
/// The set of tiers is open-ended: any non-empty name is accepted and stored
/// upper-case. Older clients send a number instead of a name; `1`, `2` and `3`
/// map to EASY, INTERMEDIATE and ADVANCED.
///
/// Deserialization goes through [`DifficultyLevel::parse`], so `"2"` and `2`
/// both read as INTERMEDIATE.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "LevelInput")]
pub struct DifficultyLevel(String);

/// Wire form of a level: a name or a legacy number.
#[derive(Deserialize)]
#[serde(untagged)]
enum LevelInput {
    Number(i64),
    Name(String),
}

impl DifficultyLevel {
    /// Parses a level from a name or a legacy numeric level.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::InvalidLevel` for empty input and for
    /// numbers outside `1..=3`.
    ///
    /// # Examples
    ///
    /// ```
    /// use lexis::DifficultyLevel;
    ///
    /// assert_eq!(DifficultyLevel::parse("easy").unwrap().as_str(), "EASY");
    /// assert_eq!(DifficultyLevel::parse("3").unwrap().as_str(), "ADVANCED");
    /// assert!(DifficultyLevel::parse("7").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, VocabularyError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VocabularyError::InvalidLevel(input.to_string()));
        }

        if let Ok(number) = trimmed.parse::<i64>() {
            return usize::try_from(number)
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| LEGACY_LEVELS.get(index))
                .map(|name| Self((*name).to_string()))
                .ok_or_else(|| VocabularyError::InvalidLevel(input.to_string()));
        }

        Ok(Self(trimmed.to_uppercase()))
    }

    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DifficultyLevel {
    fn default() -> Self {
        Self(LEGACY_LEVELS[0].to_string())
    }
}

impl TryFrom<LevelInput> for DifficultyLevel {
    type Error = VocabularyError;

    fn try_from(input: LevelInput) -> Result<Self, Self::Error> {
        match input {
            LevelInput::Number(number) => Self::parse(&number.to_string()),
            LevelInput::Name(name) => Self::parse(&name),
        }
    }
}

impl From<DifficultyLevel> for String {
    fn from(level: DifficultyLevel) -> Self {
        level.0
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
