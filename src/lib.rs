pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod models;
pub mod ollama;
pub mod parser;
pub mod repository;
pub mod service;
pub mod stream;
pub mod telemetry;
pub mod utils;

pub use catalog::LanguageCatalog;
pub use config::AppConfig;
pub use db::Database;
pub use error::{ErrorPayload, PromptParseError, VocabularyError};
pub use models::{
    CatalogEntry, Category, CategoryId, DifficultyLevel, HistoryFilter, LessonGraph, LessonMarker,
    LessonRequest, Page, PageRequest, PromptId, VocabularyPrompt,
};
pub use repository::VocabularyRepository;
pub use service::{LessonStage, LessonStream, VocabularyService};
