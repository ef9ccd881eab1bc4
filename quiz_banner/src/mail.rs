//! Outbound mail interface.
//!
//! Delivery itself is external. [`LogMailer`] only logs, [`Outbox`] keeps
//! messages in memory so callers can inspect them.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Mail delivery failure
#[derive(Debug, Error)]
#[error("Mail delivery failed: {0}")]
pub struct MailError(pub String);

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        log::info!("Mail to {}: {}", email.to, email.subject);
        log::debug!("Mail body: {}", email.body);
        Ok(())
    }
}

/// Collects messages in memory
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<Email>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Most recent message addressed to `to`
    pub fn last_to(&self, to: &str) -> Option<Email> {
        self.sent().into_iter().rev().find(|e| e.to == to)
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outbox_keeps_order() {
        let outbox = Outbox::new();
        outbox.send(Email::new("a@x.io", "one", "1")).await.unwrap();
        outbox.send(Email::new("a@x.io", "two", "2")).await.unwrap();

        assert_eq!(outbox.sent().len(), 2);
        assert_eq!(outbox.last_to("a@x.io").unwrap().subject, "two");
        assert!(outbox.last_to("b@x.io").is_none());
    }
}
