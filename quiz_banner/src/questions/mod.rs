//! Questions: each principal's flashcard deck.

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{QuestionError, QuestionResult};
pub use manager::QuestionManager;
pub use models::{
    DEFAULT_DURATION_SECS, INITIAL_PERFORMANCE_SCORE, NewQuestion, Question, QuestionId,
    QuestionPatch,
};
