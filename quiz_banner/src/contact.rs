//! Contact form submissions, stored and forwarded to support.

use crate::{
    clock::Clock,
    db::{ContactRepository, StoreError},
    mail::{Email, Mailer},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 100;
const MAX_MESSAGE_LEN: usize = 5000;

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Validation(String),
}

impl ContactError {
    pub fn client_message(&self) -> String {
        match self {
            ContactError::Store(_) => "Internal server error".to_string(),
            ContactError::Validation(msg) => msg.clone(),
        }
    }
}

/// A stored contact message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Contact form body
#[derive(Debug, Clone, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactRequest {
    fn validate(&self) -> Result<(), ContactError> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(ContactError::Validation(format!(
                "name must be 1-{MAX_NAME_LEN} characters"
            )));
        }
        if !crate::auth::is_valid_email(self.email.trim()) {
            return Err(ContactError::Validation("invalid email".to_string()));
        }
        let message = self.message.trim();
        if message.is_empty() || message.chars().count() > MAX_MESSAGE_LEN {
            return Err(ContactError::Validation(format!(
                "message must be 1-{MAX_MESSAGE_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ContactManager {
    store: Arc<dyn ContactRepository>,
    clock: Arc<dyn Clock>,
    mailer: Arc<dyn Mailer>,
    support_email: String,
}

impl ContactManager {
    pub fn new(
        store: Arc<dyn ContactRepository>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
        support_email: String,
    ) -> Self {
        Self {
            store,
            clock,
            mailer,
            support_email,
        }
    }

    /// Store the message, then forward it to support.
    ///
    /// A delivery failure is logged; the stored message is not lost.
    pub async fn submit(&self, request: ContactRequest) -> Result<ContactMessage, ContactError> {
        request.validate()?;

        let message = ContactMessage {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            email: request.email.trim().to_lowercase(),
            message: request.message.trim().to_string(),
            created_at: self.clock.now(),
        };
        self.store.insert_contact(&message).await?;

        let email = Email::new(
            &self.support_email,
            format!("Contact form: {}", message.name),
            format!("From: {} <{}>\n\n{}", message.name, message.email, message.message),
        );
        if let Err(e) = self.mailer.send(email).await {
            log::warn!("Failed to forward contact message {}: {}", message.id, e);
        }

        Ok(message)
    }
}
