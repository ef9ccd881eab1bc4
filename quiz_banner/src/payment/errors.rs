//! Payment error types.

use crate::{db::StoreError, subscription::SubscriptionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    /// No provider secret key configured
    #[error("Payment provider is not configured")]
    NotConfigured,

    /// Provider answered with an error
    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The payment intent has not succeeded (yet)
    #[error("Payment not completed (status: {0})")]
    PaymentIncomplete(String),

    /// The payment intent was created for another principal
    #[error("Payment belongs to another account")]
    PrincipalMismatch,

    /// Event carries no metadata or provider ID we can map to a principal
    #[error("No principal found for event {0}")]
    UnresolvedPrincipal(String),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl PaymentError {
    pub fn client_message(&self) -> String {
        match self {
            PaymentError::Provider(_) | PaymentError::Http(_) => {
                "Payment provider unavailable".to_string()
            }
            PaymentError::Store(_) => "Internal server error".to_string(),
            PaymentError::Subscription(e) => e.client_message(),
            _ => self.to_string(),
        }
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;
