//! Identity resolution errors.

use crate::db::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Neither a usable bearer token nor a guest ID was supplied
    #[error("Authentication or guest ID required")]
    MissingPrincipal,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid guest ID: {0}")]
    InvalidGuestId(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl IdentityError {
    pub fn client_message(&self) -> String {
        match self {
            IdentityError::Store(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type IdentityResult<T> = Result<T, IdentityError>;
