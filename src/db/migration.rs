use anyhow::Context;
use rusqlite::{Connection, params};
use time::OffsetDateTime;
use tracing::info;

/// Individual migration with version metadata.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

impl Migration {
    /// Creates a new migration.
    pub const fn new(version: u32, description: &'static str, up: &'static str) -> Self {
        Self {
            version,
            description,
            up,
        }
    }

    /// Checks if this migration has been applied to the database.
    pub fn is_applied(&self, conn: &Connection) -> anyhow::Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
            [self.version],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Applies this migration and records it in `schema_migrations`,
    /// both inside one transaction.
    pub fn apply(&self, conn: &mut Connection) -> anyhow::Result<()> {
        let tx = conn.transaction()?;

        tx.execute_batch(self.up)
            .with_context(|| format!("migration {} failed", self.version))?;

        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at, description) VALUES (?1, ?2, ?3)",
            params![
                self.version,
                OffsetDateTime::now_utc().unix_timestamp(),
                self.description
            ],
        )?;

        tx.commit()?;
        Ok(())
    }
}

/// Registry of all migrations in version order.
pub const MIGRATIONS: &[Migration] = &[
    Migration::new(
        1,
        "Initial schema: catalogs, categories and the vocabulary lesson tables",
        include_str!("migrations/001_initial_schema.sql"),
    ),
    Migration::new(
        2,
        "Indexes for history queries and nested graph loading",
        include_str!("migrations/002_history_indexes.sql"),
    ),
];

/// Applies all pending migrations in version order. Migrations are additive-only.
pub fn apply_pending_migrations(conn: &mut Connection) -> anyhow::Result<()> {
    ensure_migration_table_exists(conn)?;

    for migration in MIGRATIONS {
        if !migration.is_applied(conn)? {
            migration.apply(conn)?;
            info!(
                version = migration.version,
                description = migration.description,
                "Applied migration"
            );
        }
    }

    Ok(())
}

/// Creates the schema_migrations table if it doesn't exist.
fn ensure_migration_table_exists(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL,
            description TEXT
        );
        "#,
    )?;
    Ok(())
}
