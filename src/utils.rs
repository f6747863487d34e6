//! Shared path and list helpers for configuration and the CLI.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Gets the cross-platform default database path.
///
/// Returns the path as `{data_dir}/lexis/lexis.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// Returns `None` if the data directory cannot be determined.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("lexis").join("lexis.db"))
}

/// Ensures the parent directory of the database file exists.
///
/// Creates the directory structure if it doesn't exist using `create_dir_all`.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
///
/// # Examples
///
/// ```
/// use lexis::utils::parse_list;
///
/// assert_eq!(parse_list("english, vietnamese,"), vec!["english", "vietnamese"]);
/// ```
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
