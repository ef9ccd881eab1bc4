//! Payment event intake.
//!
//! Provider events (webhooks or a confirmed payment intent) are mapped to
//! subscription transitions. Every event is recorded in an idempotency ledger
//! before it is applied, so provider retries never grant a second term.

pub mod errors;
pub mod intake;
pub mod models;
pub mod stripe;
pub mod webhook;

pub use errors::{PaymentError, PaymentResult};
pub use intake::{PaymentIntake, transition_for};
pub use models::{
    Confirmation, EventKind, EventOutcome, PaymentEvent, PaymentEventPayload, PaymentEventRecord,
    PaymentIntent, Transition,
};
pub use stripe::{PaymentProvider, StripeClient, StripeConfig};
pub use webhook::{SIGNATURE_TOLERANCE_SECS, parse_stripe_event, signature_header, verify_signature};
