//! Subscription lifecycle error types.

use crate::{db::StoreError, identity::PrincipalRef};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Principal not found: {0}")]
    PrincipalNotFound(PrincipalRef),

    /// The guest's premium already moved to another account
    #[error("Guest {guest_id} is already linked to another account")]
    GuestAlreadyLinked { guest_id: String },
}

impl SubscriptionError {
    pub fn client_message(&self) -> String {
        match self {
            SubscriptionError::Store(_) => "Internal server error".to_string(),
            SubscriptionError::PrincipalNotFound(_) => "Account not found".to_string(),
            SubscriptionError::GuestAlreadyLinked { .. } => self.to_string(),
        }
    }
}

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;
