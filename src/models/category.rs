use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::CategoryId;

/// A user-scoped topic label grouping generated lessons (e.g. "football").
///
/// The `(owner_user_id, name)` pair is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub owner_user_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
