//! Repository trait definitions for testability and dependency injection.
//!
//! Managers only see these traits. [`super::PgStore`] implements them over
//! PostgreSQL and [`super::MemoryStore`] keeps everything in process memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use crate::auth::{AuthToken, TokenKind};
use crate::contact::ContactMessage;
use crate::identity::{GuestAccount, Principal, PrincipalRef, UserAccount};
use crate::payment::PaymentEventRecord;
use crate::preferences::Preferences;
use crate::questions::Question;
use crate::study::StudySession;
use crate::subscription::{ReminderCandidate, SubscriptionState};
use crate::templates::Template;

/// Registered users and their credentials
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; a taken email yields `StoreError::Conflict`
    async fn create_user(&self, user: &UserAccount, password_hash: &str) -> StoreResult<()>;

    /// Find user and password hash by (lowercased) email
    async fn find_credentials(&self, email: &str) -> StoreResult<Option<(UserAccount, String)>>;

    async fn find_user_by_id(&self, user_id: &str) -> StoreResult<Option<UserAccount>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<UserAccount>>;

    async fn update_password(&self, user_id: &str, password_hash: &str) -> StoreResult<()>;

    async fn update_last_login(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Single-use password reset and magic-link tokens
#[async_trait]
pub trait AuthTokenRepository: Send + Sync {
    async fn store_token(&self, token: &AuthToken) -> StoreResult<()>;

    /// Mark a valid, unused, unexpired token as used and return it
    async fn consume_token(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<AuthToken>>;
}

/// Subscription state of users and guests
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn load_principal(&self, principal: &PrincipalRef) -> StoreResult<Option<Principal>>;

    /// Overwrite the embedded subscription fields
    async fn save_subscription(
        &self,
        principal: &PrincipalRef,
        state: &SubscriptionState,
    ) -> StoreResult<()>;

    /// Insert a guest record unless one exists
    async fn insert_guest(&self, guest: &GuestAccount) -> StoreResult<()>;

    /// Most recently created guest record carrying this email
    async fn find_guest_by_email(&self, email: &str) -> StoreResult<Option<GuestAccount>>;

    async fn set_guest_link(&self, guest_id: &str, user_id: &str) -> StoreResult<()>;

    async fn find_by_provider_subscription(
        &self,
        subscription_id: &str,
    ) -> StoreResult<Option<PrincipalRef>>;

    async fn find_by_provider_customer(
        &self,
        customer_id: &str,
    ) -> StoreResult<Option<PrincipalRef>>;

    /// Principals still marked active or cancelled whose term ended before `now`
    async fn list_lapsed(&self, now: DateTime<Utc>) -> StoreResult<Vec<PrincipalRef>>;

    /// Active principals whose term ends in `(now, until]`
    async fn list_expiring(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<ReminderCandidate>>;
}

/// Tenant-scoped questions; every call is filtered by owner key
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// All questions of an owner by `order`, then creation time
    async fn list_questions(&self, owner: &str) -> StoreResult<Vec<Question>>;

    async fn find_question(&self, id: &str, owner: &str) -> StoreResult<Option<Question>>;

    async fn count_questions(&self, owner: &str) -> StoreResult<i64>;

    async fn max_order(&self, owner: &str) -> StoreResult<Option<i32>>;

    async fn insert_questions(&self, questions: &[Question]) -> StoreResult<()>;

    /// Persist every field of an existing question; `false` if not found for its owner
    async fn update_question(&self, question: &Question) -> StoreResult<bool>;

    async fn delete_question(&self, id: &str, owner: &str) -> StoreResult<bool>;

    async fn delete_all_questions(&self, owner: &str) -> StoreResult<u64>;

    async fn set_question_order(&self, id: &str, owner: &str, order: i32) -> StoreResult<bool>;
}

/// One preferences row per owner
#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    async fn find_preferences(&self, owner: &str) -> StoreResult<Option<Preferences>>;

    async fn upsert_preferences(&self, preferences: &Preferences) -> StoreResult<()>;
}

/// Shared question templates
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn list_templates(&self, category: Option<&str>) -> StoreResult<Vec<Template>>;

    async fn find_template(&self, id: &str) -> StoreResult<Option<Template>>;

    async fn insert_template(&self, template: &Template) -> StoreResult<()>;

    async fn delete_template(&self, id: &str) -> StoreResult<bool>;
}

/// Append-only study session log
#[async_trait]
pub trait StudySessionRepository: Send + Sync {
    async fn insert_session(&self, session: &StudySession) -> StoreResult<()>;

    /// Newest first
    async fn list_sessions(&self, owner: &str) -> StoreResult<Vec<StudySession>>;
}

/// Idempotency ledger for provider events
#[async_trait]
pub trait PaymentEventRepository: Send + Sync {
    /// Record an event ID; `false` when it was already present
    async fn record_event(&self, record: &PaymentEventRecord) -> StoreResult<bool>;

    /// Remove a recorded event so a failed application can be retried
    async fn forget_event(&self, event_id: &str) -> StoreResult<()>;
}

/// Contact form submissions
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn insert_contact(&self, message: &ContactMessage) -> StoreResult<()>;
}

/// Liveness probe of the backing store
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}

/// Every repository a complete backend provides
pub trait Store:
    UserRepository
    + AuthTokenRepository
    + AccountRepository
    + QuestionRepository
    + PreferencesRepository
    + TemplateRepository
    + StudySessionRepository
    + PaymentEventRepository
    + ContactRepository
    + StoreHealth
    + 'static
{
}

impl<T> Store for T where
    T: UserRepository
        + AuthTokenRepository
        + AccountRepository
        + QuestionRepository
        + PreferencesRepository
        + TemplateRepository
        + StudySessionRepository
        + PaymentEventRepository
        + ContactRepository
        + StoreHealth
        + 'static
{
}
