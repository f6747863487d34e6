//! Runtime configuration loaded from the environment.
//!
//! `AppConfig::from_env` reads a `.env` file first when one exists, then the
//! process environment:
//!
//! - `LEXIS_DATABASE_PATH`: SQLite file (default `{data_dir}/lexis/lexis.db`)
//! - `OLLAMA_HOST`: backend URL (default `http://localhost:11434`)
//! - `OLLAMA_MODEL`: model name passed to the backend
//! - `LEXIS_GENERATION_TIMEOUT_SECS`: per-request timeout (default 120)
//! - `LEXIS_SUPPORTED_LANGUAGES`: comma-separated language names
//! - `LEXIS_TOKENS`: token table for `StaticTokenVerifier`

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::utils::{default_database_path, parse_list};

/// Languages accepted when `LEXIS_SUPPORTED_LANGUAGES` is unset.
pub const DEFAULT_SUPPORTED_LANGUAGES: [&str; 8] = [
    "ENGLISH",
    "VIETNAMESE",
    "SPANISH",
    "FRENCH",
    "GERMAN",
    "JAPANESE",
    "KOREAN",
    "CHINESE",
];

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3:4b";
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to determine data directory; set LEXIS_DATABASE_PATH")]
    NoDataDir,

    #[error("{name} must be a positive number of seconds, got '{value}'")]
    InvalidTimeout { name: &'static str, value: String },

    #[error("LEXIS_SUPPORTED_LANGUAGES lists no languages")]
    NoLanguages,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub ollama_host: String,
    pub ollama_model: String,
    pub generation_timeout: Duration,
    pub supported_languages: Vec<String>,
    pub tokens: String,
}

impl AppConfig {
    /// Loads `.env` (if present) and reads the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for values that cannot be used.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, without touching `.env`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_path = match read("LEXIS_DATABASE_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_database_path().ok_or(ConfigError::NoDataDir)?,
        };

        let generation_timeout = match read("LEXIS_GENERATION_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidTimeout {
                        name: "LEXIS_GENERATION_TIMEOUT_SECS",
                        value,
                    });
                }
            },
            None => Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
        };

        let supported_languages = match read("LEXIS_SUPPORTED_LANGUAGES") {
            Some(list) => {
                let languages = parse_list(&list);
                if languages.is_empty() {
                    return Err(ConfigError::NoLanguages);
                }
                languages
            }
            None => DEFAULT_SUPPORTED_LANGUAGES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        };

        Ok(Self {
            database_path,
            ollama_host: read("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            ollama_model: read("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            generation_timeout,
            supported_languages,
            tokens: read("LEXIS_TOKENS").unwrap_or_default(),
        })
    }
}
