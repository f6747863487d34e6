use serde::{Deserialize, Serialize};

/// A language or difficulty-level row from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    /// Canonical upper-case name.
    pub name: String,
}
