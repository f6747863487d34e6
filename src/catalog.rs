//! Deduplicated name catalogs for languages and difficulty levels.
//!
//! Rows are created lazily the first time a lesson references a name. Names
//! are canonicalised to trimmed upper-case before every lookup, and creation
//! goes through a conflict-resolving insert so concurrent writers never
//! produce duplicates.

use rusqlite::{Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::error::VocabularyError;
use crate::models::{CatalogEntry, Page, PageRequest};

/// Which catalog table a `LanguageCatalog` reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CatalogTable {
    Languages,
    DifficultyLevels,
}

impl CatalogTable {
    fn find_sql(self) -> &'static str {
        match self {
            CatalogTable::Languages => "SELECT id FROM languages WHERE name = ?1",
            CatalogTable::DifficultyLevels => "SELECT id FROM difficulty_levels WHERE name = ?1",
        }
    }

    fn insert_sql(self) -> &'static str {
        match self {
            CatalogTable::Languages => {
                "INSERT INTO languages (name) VALUES (?1) ON CONFLICT(name) DO NOTHING"
            }
            CatalogTable::DifficultyLevels => {
                "INSERT INTO difficulty_levels (name, created_at) VALUES (?1, ?2)
                 ON CONFLICT(name) DO NOTHING"
            }
        }
    }

    fn count_sql(self) -> &'static str {
        match self {
            CatalogTable::Languages => "SELECT COUNT(*) FROM languages",
            CatalogTable::DifficultyLevels => "SELECT COUNT(*) FROM difficulty_levels",
        }
    }

    /// Languages list alphabetically; levels list newest first.
    fn list_sql(self) -> &'static str {
        match self {
            CatalogTable::Languages => {
                "SELECT id, name FROM languages ORDER BY name, id LIMIT ?1 OFFSET ?2"
            }
            CatalogTable::DifficultyLevels => {
                "SELECT id, name FROM difficulty_levels
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1 OFFSET ?2"
            }
        }
    }
}

/// Canonical stored form of a catalog name.
pub fn canonical_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Resolves catalog names to row ids, creating rows on demand.
///
/// Every method takes the connection explicitly so the same lookups can run
/// inside the repository's write transaction.
///
/// # Examples
///
/// ```
/// use lexis::{Database, LanguageCatalog};
///
/// # fn main() -> anyhow::Result<()> {
/// let db = Database::in_memory()?;
/// let languages = LanguageCatalog::languages();
///
/// let first = languages.resolve_or_create(db.connection(), "english")?;
/// let second = languages.resolve_or_create(db.connection(), "ENGLISH")?;
/// assert_eq!(first, second);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LanguageCatalog {
    table: CatalogTable,
}

impl LanguageCatalog {
    /// Catalog over the `languages` table.
    pub const fn languages() -> Self {
        Self {
            table: CatalogTable::Languages,
        }
    }

    /// Catalog over the `difficulty_levels` table.
    pub const fn difficulty_levels() -> Self {
        Self {
            table: CatalogTable::DifficultyLevels,
        }
    }

    /// Looks up a name without creating it.
    pub fn find(&self, conn: &Connection, name: &str) -> Result<Option<i64>, VocabularyError> {
        let canonical = canonical_name(name);
        let id = conn
            .query_row(self.table.find_sql(), [&canonical], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Returns the id for `name`, inserting a row if none exists.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::InvalidRequest` for blank names and
    /// `VocabularyError::Storage` when the statements fail.
    pub fn resolve_or_create(&self, conn: &Connection, name: &str) -> Result<i64, VocabularyError> {
        let canonical = canonical_name(name);
        if canonical.is_empty() {
            return Err(VocabularyError::InvalidRequest(
                "catalog names cannot be empty".to_string(),
            ));
        }

        match self.table {
            CatalogTable::Languages => {
                conn.execute(self.table.insert_sql(), [&canonical])?;
            }
            CatalogTable::DifficultyLevels => {
                let now = OffsetDateTime::now_utc().unix_timestamp();
                conn.execute(self.table.insert_sql(), (&canonical, now))?;
            }
        }

        // The row exists now, either inserted above or by an earlier writer.
        let id = conn.query_row(self.table.find_sql(), [&canonical], |row| row.get(0))?;
        Ok(id)
    }

    /// Returns one page of catalog rows.
    pub fn list(
        &self,
        conn: &Connection,
        page: PageRequest,
    ) -> Result<Page<CatalogEntry>, VocabularyError> {
        let total: i64 = conn.query_row(self.table.count_sql(), [], |row| row.get(0))?;

        let mut stmt = conn.prepare(self.table.list_sql())?;
        let rows = stmt.query_map((i64::from(page.size()), page.offset()), |row| {
            Ok(CatalogEntry {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let entries = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(entries, u64::try_from(total).unwrap_or(0), page))
    }
}
