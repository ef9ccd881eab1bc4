//! Subscription lifecycle: the premium state machine shared by users and guests.
//!
//! ```text
//!            activate               cancel
//!   none ──────────────► active ─────────────► cancelled
//!                         ▲  │                    │
//!              activate   │  │ expire / lapse     │ lapse
//!                         │  ▼                    ▼
//!                        expired ◄────────────────┘
//! ```
//!
//! Cancelled principals keep premium access until `expires_at`. Expiry happens
//! lazily when a principal is resolved and eagerly in the daily [`sweep`].

pub mod errors;
pub mod manager;
pub mod models;
pub mod sweep;

pub use errors::{SubscriptionError, SubscriptionResult};
pub use manager::SubscriptionManager;
pub use models::{
    ProviderRefs, RENEWAL_WINDOW_DAYS, ReminderCandidate, SUBSCRIPTION_TERM_MONTHS,
    SubscriptionInfo, SubscriptionState, SubscriptionStatus, days_until, term_end,
};
pub use sweep::{
    LoggingObserver, SweepHandle, SweepObserver, SweepReport, SweepScheduler, next_midnight,
    run_once,
};
