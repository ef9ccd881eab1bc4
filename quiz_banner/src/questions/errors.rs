//! Question store error types.

use crate::{
    db::StoreError,
    tier::{Feature, Tier},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuestionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Absent, or owned by another principal
    #[error("Question not found")]
    NotFound,

    #[error("Template not found")]
    TemplateNotFound,

    #[error("Question limit reached: {current} of {limit} on the {tier} tier")]
    QuotaExceeded {
        current: usize,
        limit: usize,
        tier: Tier,
    },

    #[error("{feature} is not available on the {tier} tier")]
    FeatureLocked { feature: Feature, tier: Tier },

    #[error("{0}")]
    Validation(String),
}

impl QuestionError {
    pub fn client_message(&self) -> String {
        match self {
            QuestionError::Store(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type QuestionResult<T> = Result<T, QuestionError>;
