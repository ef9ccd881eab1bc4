//! Payment event and provider data models.

use crate::{
    identity::PrincipalRef,
    subscription::{SubscriptionInfo, SubscriptionState},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Inbound payment event types the lifecycle reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PaymentSucceeded,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
}

impl EventKind {
    /// Map a Stripe event type string; unknown types yield `None`
    pub fn from_stripe(event_type: &str) -> Option<Self> {
        match event_type {
            "payment_intent.succeeded" => Some(EventKind::PaymentSucceeded),
            "customer.subscription.updated" => Some(EventKind::SubscriptionUpdated),
            "customer.subscription.deleted" => Some(EventKind::SubscriptionDeleted),
            "invoice.payment_succeeded" | "invoice.paid" => {
                Some(EventKind::InvoicePaymentSucceeded)
            }
            "invoice.payment_failed" => Some(EventKind::InvoicePaymentFailed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PaymentSucceeded => "payment_succeeded",
            EventKind::SubscriptionUpdated => "subscription_updated",
            EventKind::SubscriptionDeleted => "subscription_deleted",
            EventKind::InvoicePaymentSucceeded => "invoice_payment_succeeded",
            EventKind::InvoicePaymentFailed => "invoice_payment_failed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider data carried by an event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEventPayload {
    pub user_id: Option<String>,
    pub guest_id: Option<String>,
    pub email: Option<String>,
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub payment_intent_id: Option<String>,
    /// Provider-side status, e.g. `active` or `past_due` for subscriptions
    pub provider_status: Option<String>,
}

/// One payment event as handed over by the provider integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    /// Provider event ID, the idempotency key
    pub id: String,
    pub kind: EventKind,
    pub payload: PaymentEventPayload,
}

impl PaymentEvent {
    /// Ledger key: successful payment intents are keyed by intent so the
    /// webhook and the client confirmation count once between them
    pub fn idempotency_key(&self) -> String {
        match (&self.kind, &self.payload.payment_intent_id) {
            (EventKind::PaymentSucceeded, Some(intent_id)) => format!("pi:{intent_id}"),
            _ => self.id.clone(),
        }
    }
}

/// Lifecycle transition triggered by an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Activate,
    Cancel,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Activate => write!(f, "activate"),
            Transition::Cancel => write!(f, "cancel"),
        }
    }
}

/// What happened to an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied {
        principal: PrincipalRef,
        transition: Transition,
        state: SubscriptionState,
    },
    /// The event ID was already processed
    Duplicate,
}

impl EventOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EventOutcome::Applied { .. } => "applied",
            EventOutcome::Duplicate => "duplicate",
        }
    }
}

/// Result of confirming a payment intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// `Duplicate` when the webhook or an earlier confirmation got there first
    pub outcome: EventOutcome,
    pub info: SubscriptionInfo,
}

/// Idempotency ledger row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEventRecord {
    pub event_id: String,
    pub kind: EventKind,
    pub principal: String,
    pub processed_at: DateTime<Utc>,
}

/// Provider payment intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub customer_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }

    /// Principal recorded in the intent metadata at creation
    pub fn principal(&self) -> Option<PrincipalRef> {
        if let Some(user_id) = self.metadata.get("userId") {
            return Some(PrincipalRef::User(user_id.clone()));
        }
        self.metadata
            .get("guestId")
            .map(|guest_id| PrincipalRef::Guest(guest_id.clone()))
    }
}
