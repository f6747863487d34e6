use super::*;
use crate::Database;
use crate::models::{CategoryId, DifficultyLevel};
use crate::ollama::OllamaClientTrait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replays a fixed chunk script, optionally failing after `fail_after` chunks.
struct ScriptedClient {
    chunks: Vec<String>,
    fail_after: Option<usize>,
    refuse: bool,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            fail_after: None,
            refuse: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }
}

impl OllamaClientTrait for ScriptedClient {
    fn generate_stream(&self, _model: &str, _prompt: &str) -> Result<ChunkStream, OllamaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(OllamaError::Http { status: 503 });
        }

        let mut items: Vec<Result<String, OllamaError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(OllamaError::Api {
                message: "connection reset".to_string(),
            }));
        }
        Ok(Box::new(items.into_iter()))
    }
}

fn lesson_json(questions: usize, answers: usize) -> String {
    let branch = |prefix: &str| {
        let questions: Vec<_> = (0..questions)
            .map(|q| {
                let options: Vec<String> =
                    (0..answers).map(|a| format!("{prefix} {q}-{a}")).collect();
                json!({
                    "question": format!("{prefix} question {q}"),
                    "answer": options[0].clone(),
                    "options": options,
                })
            })
            .collect();
        json!({ "lesson": format!("{prefix} lesson"), "questions": questions })
    };
    json!({ "vietnamese": branch("vi"), "english": branch("en") }).to_string()
}

fn chunked(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn service_with(client: Arc<ScriptedClient>) -> VocabularyService {
    VocabularyService::new(
        PromptGenerator::new(client, "test-model"),
        VocabularyRepository::new(Database::in_memory().unwrap()),
        ["english", "vietnamese", "spanish"],
    )
}

fn request() -> LessonRequest {
    LessonRequest::new("football", "vietnamese", "english")
        .num_questions(2)
        .num_answers(3)
}

fn count(service: &VocabularyService, table: &str) -> i64 {
    service
        .repository()
        .database()
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap()
}

#[test]
fn chunks_pass_through_in_order_then_one_marker() {
    let chunks = chunked(&lesson_json(2, 3), 7);
    let service = service_with(Arc::new(ScriptedClient::new(chunks.clone())));

    let mut stream = service.generate_lesson("user-1", &request()).unwrap();
    assert_eq!(stream.stage(), LessonStage::Streaming);

    let items: Vec<String> = stream.by_ref().map(|item| item.unwrap()).collect();

    assert_eq!(items.len(), chunks.len() + 1);
    assert_eq!(&items[..chunks.len()], &chunks[..]);
    assert_eq!(
        items.last().unwrap(),
        r#"{"category_id":1,"learning_language":"vietnamese"}"#
    );
    assert_eq!(stream.stage(), LessonStage::Done);
    assert!(stream.next().is_none());
}

#[test]
fn completed_stream_persists_lesson() {
    let chunks = chunked(&lesson_json(2, 3), 11);
    let service = service_with(Arc::new(ScriptedClient::new(chunks)));

    let stream = service.generate_lesson("user-1", &request()).unwrap();
    assert!(stream.collect::<Result<Vec<_>, _>>().is_ok());

    assert_eq!(count(&service, "vocabulary_prompts"), 1);
    assert_eq!(count(&service, "vocabulary_questions"), 2);
    assert_eq!(count(&service, "vocabulary_answers"), 6);
}

#[test]
fn nothing_is_stored_before_stream_is_exhausted() {
    let chunks = chunked(&lesson_json(1, 2), 5);
    let service = service_with(Arc::new(ScriptedClient::new(chunks)));

    let mut stream = service.generate_lesson("user-1", &request()).unwrap();
    stream.next().unwrap().unwrap();

    assert_eq!(count(&service, "vocabulary_prompts"), 0);
    assert_eq!(count(&service, "categories"), 0);
}

#[test]
fn dropped_stream_stores_nothing() {
    let chunks = chunked(&lesson_json(1, 2), 5);
    let service = service_with(Arc::new(ScriptedClient::new(chunks)));

    {
        let mut stream = service.generate_lesson("user-1", &request()).unwrap();
        stream.next();
        stream.next();
    }

    assert_eq!(count(&service, "vocabulary_prompts"), 0);
}

#[test]
fn malformed_json_fails_after_chunks_and_stores_nothing() {
    let chunks = vec!["{\"vietnamese\": ".to_string(), "{\"lesson\": ".to_string()];
    let service = service_with(Arc::new(ScriptedClient::new(chunks)));

    let mut stream = service.generate_lesson("user-1", &request()).unwrap();
    let items: Vec<_> = stream.by_ref().collect();

    assert_eq!(items.len(), 3);
    assert!(items[0].is_ok());
    assert!(items[1].is_ok());
    let err = items[2].as_ref().unwrap_err();
    assert!(matches!(err, VocabularyError::PromptParse(_)));
    assert_eq!(err.code(), 10002);

    assert_eq!(stream.stage(), LessonStage::Failed);
    assert!(stream.next().is_none());
    assert_eq!(count(&service, "vocabulary_prompts"), 0);
    assert_eq!(count(&service, "categories"), 0);
}

#[test]
fn storage_failure_while_persisting_fails_stream_and_rolls_back() {
    let chunks = chunked(&lesson_json(2, 3), 11);
    let service = service_with(Arc::new(ScriptedClient::new(chunks.clone())));
    service
        .repository()
        .database()
        .connection()
        .execute_batch(
            "CREATE TRIGGER reject_answers BEFORE INSERT ON vocabulary_answers
             BEGIN SELECT RAISE(ABORT, 'answers rejected'); END;",
        )
        .unwrap();

    let mut stream = service.generate_lesson("user-1", &request()).unwrap();
    let items: Vec<_> = stream.by_ref().collect();

    assert_eq!(items.len(), chunks.len() + 1);
    for (item, chunk) in items.iter().zip(&chunks) {
        assert_eq!(item.as_ref().unwrap(), chunk);
    }
    let err = items.last().unwrap().as_ref().unwrap_err();
    assert!(matches!(err, VocabularyError::Storage(_)));
    assert_eq!(err.code(), 10000);

    assert_eq!(stream.stage(), LessonStage::Failed);
    assert!(stream.next().is_none());
    assert_eq!(count(&service, "vocabulary_prompts"), 0);
    assert_eq!(count(&service, "vocabulary_questions"), 0);
    assert_eq!(count(&service, "categories"), 0);
}

#[test]
fn inconsistent_branches_fail_with_parse_error() {
    let mut value: serde_json::Value = serde_json::from_str(&lesson_json(2, 3)).unwrap();
    value["english"]["questions"]
        .as_array_mut()
        .unwrap()
        .pop();
    let service = service_with(Arc::new(ScriptedClient::new(vec![value.to_string()])));

    let items: Vec<_> = service.generate_lesson("user-1", &request()).unwrap().collect();

    assert!(matches!(
        items.last().unwrap(),
        Err(VocabularyError::PromptParse(_))
    ));
    assert_eq!(count(&service, "vocabulary_prompts"), 0);
}

#[test]
fn backend_failure_mid_stream_ends_with_generation_error() {
    let chunks = chunked(&lesson_json(2, 3), 10);
    let service = service_with(Arc::new(ScriptedClient::new(chunks.clone()).failing_after(3)));

    let mut stream = service.generate_lesson("user-1", &request()).unwrap();
    let items: Vec<_> = stream.by_ref().collect();

    assert_eq!(items.len(), 4);
    for (item, chunk) in items.iter().zip(&chunks) {
        assert_eq!(item.as_ref().unwrap(), chunk);
    }
    assert!(matches!(items[3], Err(VocabularyError::Generation(_))));
    assert_eq!(stream.stage(), LessonStage::Failed);
    assert_eq!(count(&service, "vocabulary_prompts"), 0);
}

#[test]
fn empty_response_is_a_generation_failure() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));

    let items: Vec<_> = service.generate_lesson("user-1", &request()).unwrap().collect();

    assert_eq!(items.len(), 1);
    assert!(matches!(
        items[0],
        Err(VocabularyError::Generation(OllamaError::EmptyResponse))
    ));
}

#[test]
fn unreachable_backend_fails_before_streaming() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new()).refusing()));

    let result = service.generate_lesson("user-1", &request());

    assert!(matches!(result, Err(VocabularyError::Generation(_))));
}

#[test]
fn unsupported_language_is_rejected_without_calling_backend() {
    let client = Arc::new(ScriptedClient::new(Vec::new()));
    let service = service_with(client.clone());
    let request = LessonRequest::new("football", "klingon", "english");

    let result = service.generate_lesson("user-1", &request);

    match result {
        Err(err @ VocabularyError::LanguageNotSupported(_)) => {
            assert_eq!(err.to_string(), "KLINGON does not support yet!");
            assert_eq!(err.code(), 10003);
        }
        Err(other) => panic!("expected LanguageNotSupported, got {other:?}"),
        Ok(_) => panic!("expected LanguageNotSupported, got a stream"),
    }
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn supported_language_check_ignores_case() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    assert!(service.is_supported("Vietnamese"));
    assert!(service.is_supported(" SPANISH "));
    assert!(!service.is_supported("french"));
}

#[test]
fn invalid_request_is_rejected() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    let request = request().num_questions(0);

    assert!(matches!(
        service.generate_lesson("user-1", &request),
        Err(VocabularyError::InvalidRequest(_))
    ));
}

#[test]
fn finalize_lesson_persists_raw_text() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    let raw = format!("Here is your lesson:\n```json\n{}\n```", lesson_json(3, 2));

    let marker = service.finalize_lesson("user-1", &request(), &raw).unwrap();

    assert_eq!(marker.learning_language, "vietnamese");
    assert_eq!(count(&service, "vocabulary_questions"), 3);
}

#[test]
fn finalize_lesson_rejects_blank_text() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    let result = service.finalize_lesson("user-1", &request(), "  \n ");
    assert!(matches!(
        result,
        Err(VocabularyError::Generation(OllamaError::EmptyResponse))
    ));
}

#[test]
fn level_is_stored_with_lesson() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    let request = request().level(DifficultyLevel::parse("3").unwrap());

    let marker = service
        .finalize_lesson("user-1", &request, &lesson_json(2, 3))
        .unwrap();
    let filter = HistoryFilter {
        category_id: marker.category_id,
        learning_language: "vietnamese".to_string(),
    };
    let page = service
        .get_history_lessons("user-1", &filter, PageRequest::default())
        .unwrap();

    assert_eq!(page.items[0].difficulty_level, "ADVANCED");
}

#[test]
fn history_uses_the_same_language_policy() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    let filter = HistoryFilter {
        category_id: CategoryId::new(1),
        learning_language: "french".to_string(),
    };

    assert!(matches!(
        service.get_history_lessons("user-1", &filter, PageRequest::default()),
        Err(VocabularyError::LanguageNotSupported(lang)) if lang == "FRENCH"
    ));
}

#[test]
fn history_of_supported_but_unused_language_is_empty() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    let marker = service
        .finalize_lesson("user-1", &request(), &lesson_json(1, 2))
        .unwrap();
    let filter = HistoryFilter {
        category_id: marker.category_id,
        learning_language: "spanish".to_string(),
    };

    let page = service
        .get_history_lessons("user-1", &filter, PageRequest::default())
        .unwrap();
    assert!(page.items.is_empty());
}

#[test]
fn history_of_unknown_or_foreign_category_is_not_found() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    let marker = service
        .finalize_lesson("user-1", &request(), &lesson_json(1, 2))
        .unwrap();

    let foreign = HistoryFilter {
        category_id: marker.category_id,
        learning_language: "vietnamese".to_string(),
    };
    assert!(matches!(
        service.get_history_lessons("user-2", &foreign, PageRequest::default()),
        Err(VocabularyError::NotFound { entity: "category", .. })
    ));

    let missing = HistoryFilter {
        category_id: CategoryId::new(999),
        learning_language: "vietnamese".to_string(),
    };
    let err = service
        .get_history_lessons("user-1", &missing, PageRequest::default())
        .unwrap_err();
    assert_eq!(err.payload().code, 10004);
}

#[test]
fn catalog_listings_go_through_service() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    service
        .finalize_lesson(
            "user-1",
            &request().level(DifficultyLevel::parse("2").unwrap()),
            &lesson_json(1, 2),
        )
        .unwrap();

    let languages = service.list_languages(PageRequest::default()).unwrap();
    let names: Vec<&str> = languages.items.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["ENGLISH", "VIETNAMESE"]);

    let levels = service
        .list_difficulty_levels(PageRequest::default())
        .unwrap();
    assert_eq!(levels.items.len(), 1);
    assert_eq!(levels.items[0].name, "INTERMEDIATE");
}

#[test]
fn categories_and_invalidation_go_through_service() {
    let service = service_with(Arc::new(ScriptedClient::new(Vec::new())));
    let marker = service
        .finalize_lesson("user-1", &request(), &lesson_json(1, 2))
        .unwrap();

    let categories = service
        .list_categories("user-1", PageRequest::default())
        .unwrap();
    assert_eq!(categories.items.len(), 1);
    assert_eq!(categories.items[0].id, marker.category_id);

    let filter = HistoryFilter {
        category_id: marker.category_id,
        learning_language: "vietnamese".to_string(),
    };
    let prompt_id = service
        .get_history_lessons("user-1", &filter, PageRequest::default())
        .unwrap()
        .items[0]
        .id;

    assert!(matches!(
        service.invalidate_prompt("user-2", prompt_id),
        Err(VocabularyError::NotFound { .. })
    ));
    service.invalidate_prompt("user-1", prompt_id).unwrap();

    let page = service
        .get_history_lessons("user-1", &filter, PageRequest::default())
        .unwrap();
    assert!(page.items.is_empty());
}
