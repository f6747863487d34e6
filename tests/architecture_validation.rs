//! Architecture Validation Integration Tests
//!
//! Confirms the library can be driven without the CLI: every collaborator is
//! built from types exported by the `lexis` crate and passed in explicitly,
//! and two services never share state.
//!
//! This file must NOT import anything from main.rs. CLI types (`Cli`,
//! `Commands`, the per-command argument structs) stay in the binary.

use std::sync::Arc;

use anyhow::Result;
use lexis::generator::PromptGenerator;
use lexis::ollama::{ChunkStream, OllamaClientTrait, OllamaError};
use lexis::{
    AppConfig, Database, LanguageCatalog, LessonRequest, PageRequest, VocabularyRepository,
    VocabularyService,
};

struct EchoBackend;

impl OllamaClientTrait for EchoBackend {
    fn generate_stream(&self, _model: &str, _prompt: &str) -> Result<ChunkStream, OllamaError> {
        Ok(Box::new(std::iter::once(Ok::<_, OllamaError>(
            r#"{"spanish":{"lesson":"hola","questions":[{"question":"¿?","options":["sí","no"],"answer":"sí"}]},"english":{"lesson":"hi","questions":[{"question":"?","options":["yes","no"],"answer":"yes"}]}}"#
                .to_string(),
        ))))
    }
}

fn create_test_service() -> Result<VocabularyService> {
    let config = AppConfig::from_lookup(|name| match name {
        "LEXIS_DATABASE_PATH" => Some(":memory:".to_string()),
        _ => None,
    })?;

    Ok(VocabularyService::new(
        PromptGenerator::new(Arc::new(EchoBackend), &config.ollama_model),
        VocabularyRepository::new(Database::in_memory()?),
        &config.supported_languages,
    ))
}

#[test]
fn service_instantiates_without_cli_context() -> Result<()> {
    let service = create_test_service()?;

    let conn = service.repository().database().connection();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE 'vocabulary_%'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(count, 6);
    Ok(())
}

#[test]
fn default_language_policy_comes_from_config() -> Result<()> {
    let service = create_test_service()?;

    for language in [
        "english",
        "Vietnamese",
        "SPANISH",
        "french",
        "German",
        "japanese",
        "korean",
        "chinese",
    ] {
        assert!(service.is_supported(language), "{language} should be supported");
    }
    assert!(!service.is_supported("latin"));
    Ok(())
}

#[test]
fn services_do_not_share_state() -> Result<()> {
    let first = create_test_service()?;
    let second = create_test_service()?;

    let request = LessonRequest::new("greetings", "spanish", "english")
        .num_questions(1)
        .num_answers(2);
    let items = first
        .generate_lesson("user-1", &request)?
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(items.len(), 2);

    assert_eq!(first.list_categories("user-1", PageRequest::default())?.total, 1);
    assert_eq!(second.list_categories("user-1", PageRequest::default())?.total, 0);
    Ok(())
}

#[test]
fn catalog_is_usable_on_its_own() -> Result<()> {
    let db = Database::in_memory()?;
    let catalog = LanguageCatalog::languages();

    let id = catalog.resolve_or_create(db.connection(), "korean")?;
    assert_eq!(catalog.find(db.connection(), "KOREAN")?, Some(id));
    Ok(())
}
