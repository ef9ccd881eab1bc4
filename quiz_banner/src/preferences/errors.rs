//! Preferences error types.

use crate::{
    db::StoreError,
    tier::{Feature, Tier},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{feature} is not available on the {tier} tier")]
    FeatureLocked { feature: Feature, tier: Tier },

    #[error("{0}")]
    Validation(String),
}

impl PreferencesError {
    pub fn client_message(&self) -> String {
        match self {
            PreferencesError::Store(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type PreferencesResult<T> = Result<T, PreferencesError>;
