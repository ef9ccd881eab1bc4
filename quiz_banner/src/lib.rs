//! # QuizBanner
//!
//! Backend core of a flashcard application. Principals (registered users or
//! anonymous guests) keep a deck of question/answer pairs that the client shows
//! as scrolling banners. How many questions a principal may keep, and whether
//! bulk import and custom palettes are available, depends on its tier.
//!
//! ## Architecture
//!
//! - [`identity`]: turns a bearer token or guest ID into a principal and its
//!   entitled tier
//! - [`questions`], [`preferences`], [`study`]: tenant-scoped resources keyed by
//!   the principal's owner key
//! - [`tier`]: quotas and feature gates
//! - [`subscription`]: the premium state machine, guest linking and the daily sweep
//! - [`payment`]: provider events mapped onto subscription transitions, with an
//!   idempotency ledger
//! - [`auth`]: registration, login, password reset and magic links
//! - [`db`]: repository traits with PostgreSQL and in-memory implementations
//!
//! [`Services`] wires every manager over one store:
//!
//! ```
//! use std::sync::Arc;
//! use quiz_banner::{
//!     Services, auth::AuthSettings, clock::SystemClock, db::MemoryStore, mail::LogMailer,
//! };
//!
//! let services = Services::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(SystemClock),
//!     AuthSettings::new("a-development-secret-of-32-bytes!", "dev-pepper-value"),
//!     Arc::new(LogMailer),
//!     "support@example.com".to_string(),
//!     None,
//! );
//! assert!(!services.payments.is_configured());
//! ```

/// Registration, login, tokens.
pub mod auth;

/// Time source.
pub mod clock;

/// Contact form.
pub mod contact;

/// Persistence.
pub mod db;

/// Principals and their resolution.
pub mod identity;

/// Outbound mail.
pub mod mail;

/// Payment provider events and the idempotency ledger.
pub mod payment;

pub mod preferences;
pub mod questions;
pub mod services;
pub mod study;

/// Subscription lifecycle and daily sweep.
pub mod subscription;

pub mod templates;

/// Tier quotas and feature gates.
pub mod tier;

pub use identity::{Identity, Principal, PrincipalRef};
pub use services::Services;
pub use tier::{Feature, Tier, TierLimits};
