use std::collections::BTreeSet;

use tracing::{debug, error, info, instrument};

use crate::catalog::canonical_name;
use crate::error::VocabularyError;
use crate::generator::PromptGenerator;
use crate::models::{
    CatalogEntry, Category, HistoryFilter, LessonGraph, LessonMarker, LessonRequest, Page,
    PageRequest, PromptId, VocabularyPrompt,
};
use crate::ollama::{ChunkStream, OllamaError};
use crate::parser::{LessonParser, parse_response};
use crate::repository::VocabularyRepository;
use crate::stream::Buffered;

/// Service layer for generating, storing and browsing vocabulary lessons.
///
/// `VocabularyService` owns the generator and the repository and applies the
/// language policy shared by every operation: a language must be in the
/// configured supported set. It is UI-independent; the CLI is one caller.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use lexis::{Database, VocabularyRepository, VocabularyService};
/// use lexis::generator::PromptGenerator;
/// use lexis::ollama::OllamaClientBuilder;
///
/// # fn main() -> anyhow::Result<()> {
/// let client = Arc::new(OllamaClientBuilder::new().build()?);
/// let service = VocabularyService::new(
///     PromptGenerator::new(client, "gemma3:4b"),
///     VocabularyRepository::new(Database::in_memory()?),
///     ["english", "vietnamese"],
/// );
/// assert!(service.is_supported("Vietnamese"));
/// # Ok(())
/// # }
/// ```
pub struct VocabularyService {
    generator: PromptGenerator,
    repository: VocabularyRepository,
    supported_languages: BTreeSet<String>,
}

impl VocabularyService {
    /// Creates a service from its collaborators.
    ///
    /// Language names are canonicalised, so `"english"` and `"ENGLISH"` are
    /// the same entry.
    pub fn new<I, S>(
        generator: PromptGenerator,
        repository: VocabularyRepository,
        supported_languages: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            generator,
            repository,
            supported_languages: supported_languages
                .into_iter()
                .map(|name| canonical_name(name.as_ref()))
                .filter(|name| !name.is_empty())
                .collect(),
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repository(&self) -> &VocabularyRepository {
        &self.repository
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.supported_languages.contains(&canonical_name(language))
    }

    fn ensure_supported(&self, language: &str) -> Result<(), VocabularyError> {
        if self.is_supported(language) {
            Ok(())
        } else {
            Err(VocabularyError::LanguageNotSupported(canonical_name(language)))
        }
    }

    fn check_request(&self, request: &LessonRequest) -> Result<(), VocabularyError> {
        request.validate()?;
        self.ensure_supported(&request.learning_language)?;
        self.ensure_supported(&request.translated_language)
    }

    /// Starts generating a lesson for `user_id`.
    ///
    /// The request is validated and the backend stream opened before this
    /// returns, so those failures never reach the stream. The returned
    /// `LessonStream` yields every generated chunk as it arrives, then either
    /// the terminal marker chunk or exactly one error.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` / `InvalidLevel` for malformed requests
    /// - `LanguageNotSupported` when either language is outside the supported set
    /// - `Generation` when the backend cannot be reached
    #[instrument(
        skip(self, request),
        fields(
            category = %request.category,
            learning = %request.learning_language,
            translated = %request.translated_language,
        )
    )]
    pub fn generate_lesson(
        &self,
        user_id: &str,
        request: &LessonRequest,
    ) -> Result<LessonStream<'_>, VocabularyError> {
        self.check_request(request)?;

        let chunks = self.generator.generate(
            &request.category,
            &request.learning_language,
            &request.translated_language,
            request.num_questions,
            request.num_answers,
            &request.level,
        )?;
        info!(
            num_questions = request.num_questions,
            num_answers = request.num_answers,
            level = %request.level,
            "Lesson stream started"
        );

        Ok(LessonStream {
            service: self,
            user_id: user_id.to_string(),
            request: request.clone(),
            chunks: Buffered::new(chunks),
            stage: LessonStage::Streaming,
        })
    }

    /// Parses a complete backend response and persists it for `user_id`.
    ///
    /// This is the finalize stage of `generate_lesson`, usable on its own when
    /// the raw text was collected elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `Generation(EmptyResponse)` for blank text, `PromptParse` when
    /// the text does not describe a valid lesson, and `Storage` when the write
    /// fails.
    pub fn finalize_lesson(
        &self,
        user_id: &str,
        request: &LessonRequest,
        raw_text: &str,
    ) -> Result<LessonMarker, VocabularyError> {
        self.check_request(request)?;
        let graph = self.parse_lesson(request, raw_text)?;
        self.repository.create_with_category(&graph, user_id)
    }

    fn parse_lesson(
        &self,
        request: &LessonRequest,
        raw_text: &str,
    ) -> Result<LessonGraph, VocabularyError> {
        if raw_text.trim().is_empty() {
            return Err(OllamaError::EmptyResponse.into());
        }
        let value = parse_response(raw_text)?;
        let graph = LessonParser::parse(
            &request.category,
            &request.learning_language,
            &request.translated_language,
            &request.level,
            &value,
        )?;
        debug!(questions = graph.questions.len(), "Lesson parsed");
        Ok(graph)
    }

    /// Returns the user's stored lessons for one category and learning language.
    ///
    /// # Errors
    ///
    /// Returns `LanguageNotSupported` under the same policy as generation and
    /// `NotFound` when the category is missing or belongs to another user.
    #[instrument(skip(self, filter), fields(category_id = %filter.category_id))]
    pub fn get_history_lessons(
        &self,
        user_id: &str,
        filter: &HistoryFilter,
        page: PageRequest,
    ) -> Result<Page<VocabularyPrompt>, VocabularyError> {
        self.ensure_supported(&filter.learning_language)?;
        self.repository.get_category(filter.category_id, user_id)?;
        self.repository.get_history_questions(filter, user_id, page)
    }

    pub fn list_categories(
        &self,
        user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Category>, VocabularyError> {
        self.repository.list_categories(user_id, page)
    }

    /// Languages that stored lessons have used, alphabetically.
    pub fn list_languages(&self, page: PageRequest) -> Result<Page<CatalogEntry>, VocabularyError> {
        self.repository.list_languages(page)
    }

    /// Difficulty levels that stored lessons have used, newest first.
    pub fn list_difficulty_levels(
        &self,
        page: PageRequest,
    ) -> Result<Page<CatalogEntry>, VocabularyError> {
        self.repository.list_difficulty_levels(page)
    }

    /// Hides a stored lesson from history.
    pub fn invalidate_prompt(
        &self,
        user_id: &str,
        prompt_id: PromptId,
    ) -> Result<(), VocabularyError> {
        self.repository.invalidate_prompt(prompt_id, user_id)
    }
}

/// Where a `LessonStream` is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonStage {
    /// Forwarding backend chunks.
    Streaming,
    /// Backend finished; the buffered text is being parsed.
    Parsing,
    /// The parsed graph is being written.
    Persisting,
    /// Marker chunk delivered.
    Done,
    /// An error was delivered; nothing was stored.
    Failed,
}

/// Lesson text as it is generated, followed by one terminal item.
///
/// Each call to `next` pulls at most one chunk from the backend. When the
/// backend is exhausted, the next call parses and stores the lesson and
/// yields the marker chunk (`{"category_id":…,"learning_language":…}`). On
/// any failure the stream yields one `Err` and ends. Dropping the stream
/// before the end stores nothing.
pub struct LessonStream<'a> {
    service: &'a VocabularyService,
    user_id: String,
    request: LessonRequest,
    chunks: Buffered<ChunkStream>,
    stage: LessonStage,
}

impl LessonStream<'_> {
    pub fn stage(&self) -> LessonStage {
        self.stage
    }

    fn fail(&mut self, err: VocabularyError) -> Option<Result<String, VocabularyError>> {
        error!(
            stage = ?self.stage,
            code = err.code(),
            chunks = self.chunks.chunk_count(),
            error = %err,
            "Lesson generation failed"
        );
        self.stage = LessonStage::Failed;
        Some(Err(err))
    }

    fn finish(&mut self) -> Option<Result<String, VocabularyError>> {
        self.stage = LessonStage::Parsing;
        let raw = self.chunks.take_buffer();
        debug!(bytes = raw.len(), chunks = self.chunks.chunk_count(), "Stream exhausted");

        let graph = match self.service.parse_lesson(&self.request, &raw) {
            Ok(graph) => graph,
            Err(err) => return self.fail(err),
        };

        self.stage = LessonStage::Persisting;
        match self
            .service
            .repository
            .create_with_category(&graph, &self.user_id)
        {
            Ok(marker) => {
                self.stage = LessonStage::Done;
                Some(Ok(marker.to_chunk()))
            }
            Err(err) => self.fail(err),
        }
    }
}

impl Iterator for LessonStream<'_> {
    type Item = Result<String, VocabularyError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.stage {
            LessonStage::Streaming => match self.chunks.next() {
                Some(Ok(chunk)) => Some(Ok(chunk)),
                Some(Err(err)) => self.fail(err.into()),
                None => self.finish(),
            },
            LessonStage::Parsing
            | LessonStage::Persisting
            | LessonStage::Done
            | LessonStage::Failed => None,
        }
    }
}

#[cfg(test)]
#[path = "service/tests.rs"]
mod tests;
