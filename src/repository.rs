//! Persistence for generated lessons.
//!
//! `VocabularyRepository` owns the `Database` and is the only component that
//! touches the vocabulary tables. Writes for one lesson run in a single
//! transaction; reads load the whole nested graph with one batched query per
//! table.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::catalog::{LanguageCatalog, canonical_name};
use crate::error::VocabularyError;
use crate::models::{
    AnswerId, CatalogEntry, Category, CategoryId, HistoryFilter, LessonGraph, LessonMarker, Page,
    PageRequest, PromptId, QuestionId, Translation, VocabularyAnswer, VocabularyPrompt,
    VocabularyQuestion,
};
use crate::Database;

/// Repository for lesson graphs, categories and their history.
///
/// # Examples
///
/// ```
/// use lexis::{Database, VocabularyRepository, PageRequest};
///
/// # fn main() -> anyhow::Result<()> {
/// let repo = VocabularyRepository::new(Database::in_memory()?);
/// let categories = repo.list_categories("user-1", PageRequest::default())?;
/// assert!(categories.items.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct VocabularyRepository {
    db: Database,
}

impl VocabularyRepository {
    /// Creates a repository that takes ownership of the database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying database.
    ///
    /// Useful for testing or advanced operations that need direct database access.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Persists a complete lesson graph under the owner's category.
    ///
    /// The category is upserted on `(owner_user_id, name)`; both languages and
    /// the difficulty level are resolved or created; then the prompt, its
    /// questions, their answers and every translation row are inserted. All of
    /// it commits together or not at all.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::Storage` if any statement fails. The
    /// transaction is rolled back in that case and no rows remain.
    #[instrument(
        skip(self, graph),
        fields(questions = graph.questions.len(), answers = graph.answer_count())
    )]
    pub fn create_with_category(
        &self,
        graph: &LessonGraph,
        owner_user_id: &str,
    ) -> Result<LessonMarker, VocabularyError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        // Dropping `tx` without commit rolls everything back.
        let tx = self.db.connection().unchecked_transaction()?;

        let category_id: i64 = tx.query_row(
            "INSERT INTO categories (name, owner_user_id, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(owner_user_id, name) DO UPDATE SET name = excluded.name
             RETURNING id",
            (graph.category.trim(), owner_user_id, now),
            |row| row.get(0),
        )?;

        let languages = LanguageCatalog::languages();
        let learning_id = languages.resolve_or_create(&tx, &graph.learning_language)?;
        let translated_id = languages.resolve_or_create(&tx, &graph.translated_language)?;
        let level_id =
            LanguageCatalog::difficulty_levels().resolve_or_create(&tx, graph.level.as_str())?;

        tx.execute(
            "INSERT INTO vocabulary_prompts
                 (text, category_id, difficulty_level_id, language_id, is_valid, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
            (&graph.prompt, category_id, level_id, learning_id, now),
        )?;
        let prompt_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO vocabulary_prompt_translations (prompt_id, translated_language_id, text)
             VALUES (?1, ?2, ?3)",
            (prompt_id, translated_id, &graph.translation),
        )?;

        for question in &graph.questions {
            tx.execute(
                "INSERT INTO vocabulary_questions
                     (text, prompt_id, language_id, is_valid, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                (&question.text, prompt_id, learning_id, now),
            )?;
            let question_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO vocabulary_question_translations
                     (question_id, translated_language_id, text)
                 VALUES (?1, ?2, ?3)",
                (question_id, translated_id, &question.translation),
            )?;

            for answer in &question.answers {
                tx.execute(
                    "INSERT INTO vocabulary_answers
                         (text, question_id, is_correct, language_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    (&answer.text, question_id, answer.is_correct, learning_id, now),
                )?;
                let answer_id = tx.last_insert_rowid();
                tx.execute(
                    "INSERT INTO vocabulary_answer_translations
                         (answer_id, translated_language_id, text)
                     VALUES (?1, ?2, ?3)",
                    (answer_id, translated_id, &answer.translation),
                )?;
            }
        }

        tx.commit()?;
        info!(category_id, prompt_id, "Lesson persisted");

        Ok(LessonMarker {
            category_id: CategoryId::new(category_id),
            learning_language: graph.learning_language.clone(),
        })
    }

    /// Returns one page of the owner's valid lessons for a category and
    /// learning language, newest first, with every nested row loaded.
    ///
    /// A learning language that no lesson has used yet yields an empty page.
    #[instrument(skip(self, filter), fields(category_id = %filter.category_id))]
    pub fn get_history_questions(
        &self,
        filter: &HistoryFilter,
        owner_user_id: &str,
        page: PageRequest,
    ) -> Result<Page<VocabularyPrompt>, VocabularyError> {
        let conn = self.db.connection();
        let Some(language_id) = LanguageCatalog::languages().find(conn, &filter.learning_language)?
        else {
            debug!(
                language = %canonical_name(&filter.learning_language),
                "No lessons in language yet"
            );
            return Ok(Page::new(Vec::new(), 0, page));
        };

        let total: i64 = conn.query_row(
            "SELECT COUNT(*)
             FROM vocabulary_prompts p
             JOIN categories c ON c.id = p.category_id
             WHERE p.category_id = ?1 AND c.owner_user_id = ?2
               AND p.language_id = ?3 AND p.is_valid = 1",
            (filter.category_id.get(), owner_user_id, language_id),
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT p.id, p.text, p.category_id, l.name, d.name, p.is_valid,
                    p.created_at, p.updated_at
             FROM vocabulary_prompts p
             JOIN categories c ON c.id = p.category_id
             JOIN languages l ON l.id = p.language_id
             JOIN difficulty_levels d ON d.id = p.difficulty_level_id
             WHERE p.category_id = ?1 AND c.owner_user_id = ?2
               AND p.language_id = ?3 AND p.is_valid = 1
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?4 OFFSET ?5",
        )?;
        let rows = stmt.query_map(
            (
                filter.category_id.get(),
                owner_user_id,
                language_id,
                i64::from(page.size()),
                page.offset(),
            ),
            |row| {
                Ok(VocabularyPrompt {
                    id: PromptId::new(row.get(0)?),
                    text: row.get(1)?,
                    category_id: CategoryId::new(row.get(2)?),
                    language: row.get(3)?,
                    difficulty_level: row.get(4)?,
                    is_valid: row.get(5)?,
                    created_at: timestamp(row, 6)?,
                    updated_at: timestamp(row, 7)?,
                    translations: Vec::new(),
                    questions: Vec::new(),
                })
            },
        )?;
        let mut prompts = rows.collect::<Result<Vec<_>, _>>()?;

        load_prompt_graph(conn, &mut prompts)?;
        debug!(returned = prompts.len(), total, "History page loaded");

        Ok(Page::new(prompts, u64::try_from(total).unwrap_or(0), page))
    }

    /// Lists the owner's categories by name.
    pub fn list_categories(
        &self,
        owner_user_id: &str,
        page: PageRequest,
    ) -> Result<Page<Category>, VocabularyError> {
        let conn = self.db.connection();
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM categories WHERE owner_user_id = ?1",
            [owner_user_id],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, name, owner_user_id, created_at
             FROM categories
             WHERE owner_user_id = ?1
             ORDER BY name, id
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            (owner_user_id, i64::from(page.size()), page.offset()),
            category_from_row,
        )?;
        let categories = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(categories, u64::try_from(total).unwrap_or(0), page))
    }

    /// Loads one category, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::NotFound` when the category does not exist or
    /// belongs to another user.
    pub fn get_category(
        &self,
        id: CategoryId,
        owner_user_id: &str,
    ) -> Result<Category, VocabularyError> {
        self.db
            .connection()
            .query_row(
                "SELECT id, name, owner_user_id, created_at
                 FROM categories
                 WHERE id = ?1 AND owner_user_id = ?2",
                (id.get(), owner_user_id),
                category_from_row,
            )
            .optional()?
            .ok_or(VocabularyError::NotFound {
                entity: "category",
                id: id.get(),
            })
    }

    /// Marks a lesson invalid so history queries stop returning it.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError::NotFound` when the prompt does not exist or
    /// its category belongs to another user.
    #[instrument(skip(self))]
    pub fn invalidate_prompt(
        &self,
        prompt_id: PromptId,
        owner_user_id: &str,
    ) -> Result<(), VocabularyError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let changed = self.db.connection().execute(
            "UPDATE vocabulary_prompts
             SET is_valid = 0, updated_at = ?1
             WHERE id = ?2
               AND category_id IN (SELECT id FROM categories WHERE owner_user_id = ?3)",
            (now, prompt_id.get(), owner_user_id),
        )?;

        if changed == 0 {
            return Err(VocabularyError::NotFound {
                entity: "prompt",
                id: prompt_id.get(),
            });
        }
        info!("Prompt invalidated");
        Ok(())
    }

    /// Lists the language catalog alphabetically.
    pub fn list_languages(&self, page: PageRequest) -> Result<Page<CatalogEntry>, VocabularyError> {
        LanguageCatalog::languages().list(self.db.connection(), page)
    }

    /// Lists the difficulty-level catalog, newest first.
    pub fn list_difficulty_levels(
        &self,
        page: PageRequest,
    ) -> Result<Page<CatalogEntry>, VocabularyError> {
        LanguageCatalog::difficulty_levels().list(self.db.connection(), page)
    }
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let seconds: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(seconds).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: CategoryId::new(row.get(0)?),
        name: row.get(1)?,
        owner_user_id: row.get(2)?,
        created_at: timestamp(row, 3)?,
    })
}

/// `?, ?, ?` with one placeholder per id.
fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Translation rows for one child table, keyed by parent id.
///
/// `table` and `parent_column` are fixed identifiers from this module, never
/// caller input.
fn load_translations(
    conn: &Connection,
    table: &str,
    parent_column: &str,
    parent_ids: &[i64],
) -> Result<HashMap<i64, Vec<Translation>>, VocabularyError> {
    let mut by_parent: HashMap<i64, Vec<Translation>> = HashMap::new();
    if parent_ids.is_empty() {
        return Ok(by_parent);
    }

    let query = format!(
        "SELECT t.id, t.{parent_column}, l.name, t.text
         FROM {table} t
         JOIN languages l ON l.id = t.translated_language_id
         WHERE t.{parent_column} IN ({})
         ORDER BY t.id",
        placeholders(parent_ids.len())
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(parent_ids), |row| {
        Ok((
            row.get::<_, i64>(1)?,
            Translation {
                id: row.get(0)?,
                language: row.get(2)?,
                text: row.get(3)?,
            },
        ))
    })?;

    for row in rows {
        let (parent_id, translation) = row?;
        by_parent.entry(parent_id).or_default().push(translation);
    }
    Ok(by_parent)
}

/// Fills translations, questions, answers and their translations for a page
/// of prompts. Runs five queries regardless of page size.
fn load_prompt_graph(
    conn: &Connection,
    prompts: &mut [VocabularyPrompt],
) -> Result<(), VocabularyError> {
    if prompts.is_empty() {
        return Ok(());
    }

    let prompt_ids: Vec<i64> = prompts.iter().map(|p| p.id.get()).collect();
    let mut prompt_translations = load_translations(
        conn,
        "vocabulary_prompt_translations",
        "prompt_id",
        &prompt_ids,
    )?;

    let query = format!(
        "SELECT id, prompt_id, text
         FROM vocabulary_questions
         WHERE is_valid = 1 AND prompt_id IN ({})
         ORDER BY id",
        placeholders(prompt_ids.len())
    );
    let mut stmt = conn.prepare(&query)?;
    let question_rows = stmt
        .query_map(rusqlite::params_from_iter(&prompt_ids), |row| {
            Ok((
                row.get::<_, i64>(1)?,
                VocabularyQuestion {
                    id: QuestionId::new(row.get(0)?),
                    text: row.get(2)?,
                    translations: Vec::new(),
                    answers: Vec::new(),
                },
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let question_ids: Vec<i64> = question_rows.iter().map(|(_, q)| q.id.get()).collect();
    let mut question_translations = load_translations(
        conn,
        "vocabulary_question_translations",
        "question_id",
        &question_ids,
    )?;

    let mut answers_by_question: HashMap<i64, Vec<VocabularyAnswer>> = HashMap::new();
    if !question_ids.is_empty() {
        let query = format!(
            "SELECT id, question_id, text, is_correct
             FROM vocabulary_answers
             WHERE question_id IN ({})
             ORDER BY id",
            placeholders(question_ids.len())
        );
        let mut stmt = conn.prepare(&query)?;
        let answer_rows = stmt
            .query_map(rusqlite::params_from_iter(&question_ids), |row| {
                Ok((
                    row.get::<_, i64>(1)?,
                    VocabularyAnswer {
                        id: AnswerId::new(row.get(0)?),
                        text: row.get(2)?,
                        is_correct: row.get(3)?,
                        translations: Vec::new(),
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let answer_ids: Vec<i64> = answer_rows.iter().map(|(_, a)| a.id.get()).collect();
        let mut answer_translations = load_translations(
            conn,
            "vocabulary_answer_translations",
            "answer_id",
            &answer_ids,
        )?;

        for (question_id, mut answer) in answer_rows {
            answer.translations = answer_translations
                .remove(&answer.id.get())
                .unwrap_or_default();
            answers_by_question.entry(question_id).or_default().push(answer);
        }
    }

    let mut questions_by_prompt: HashMap<i64, Vec<VocabularyQuestion>> = HashMap::new();
    for (prompt_id, mut question) in question_rows {
        question.translations = question_translations
            .remove(&question.id.get())
            .unwrap_or_default();
        question.answers = answers_by_question
            .remove(&question.id.get())
            .unwrap_or_default();
        questions_by_prompt.entry(prompt_id).or_default().push(question);
    }

    for prompt in prompts.iter_mut() {
        prompt.translations = prompt_translations
            .remove(&prompt.id.get())
            .unwrap_or_default();
        prompt.questions = questions_by_prompt
            .remove(&prompt.id.get())
            .unwrap_or_default();
    }
    Ok(())
}
