mod catalog_entry;
mod category;
mod history;
mod ids;
mod lesson;
mod level;
mod page;
mod request;

pub use catalog_entry::CatalogEntry;
pub use category::Category;
pub use history::{Translation, VocabularyAnswer, VocabularyPrompt, VocabularyQuestion};
pub use ids::{AnswerId, CategoryId, PromptId, QuestionId};
pub use lesson::{AnswerDraft, LessonGraph, LessonMarker, QuestionDraft};
pub use level::DifficultyLevel;
pub use page::{MAX_PAGE_SIZE, Page, PageRequest};
pub use request::{
    DEFAULT_NUM_ANSWERS, DEFAULT_NUM_QUESTIONS, HistoryFilter, LessonRequest, MAX_NUM_ANSWERS,
    MAX_NUM_QUESTIONS, MIN_NUM_ANSWERS,
};
