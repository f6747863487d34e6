use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares a newtype over a database row id.
///
/// Every table gets its own id type so a `CategoryId` can never be passed
/// where a `PromptId` is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw row id.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying row id.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Identifier of a user-owned category.
    CategoryId
);
row_id!(
    /// Identifier of a generated lesson prompt.
    PromptId
);
row_id!(
    /// Identifier of a multiple-choice question.
    QuestionId
);
row_id!(
    /// Identifier of an answer option.
    AnswerId
);
