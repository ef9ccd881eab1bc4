//! Principal types: the acting identity of a request.

use crate::{subscription::SubscriptionState, tier::Tier};
use chrono::{DateTime, Utc};
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registered user ID
pub type UserId = String;

/// Client-generated anonymous guest ID
pub type GuestId = String;

/// Key identifying a principal without loading it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PrincipalRef {
    User(UserId),
    Guest(GuestId),
}

impl PrincipalRef {
    /// String stored on tenant-scoped rows (questions, preferences, sessions)
    pub fn owner_key(&self) -> &str {
        match self {
            PrincipalRef::User(id) | PrincipalRef::Guest(id) => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PrincipalRef::User(_) => "user",
            PrincipalRef::Guest(_) => "guest",
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, PrincipalRef::Guest(_))
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.owner_key())
    }
}

/// Capabilities shared by both principal variants
#[enum_dispatch]
pub trait Account {
    fn principal_ref(&self) -> PrincipalRef;
    fn email(&self) -> Option<&str>;
    fn subscription(&self) -> &SubscriptionState;
    fn subscription_mut(&mut self) -> &mut SubscriptionState;

    /// Cached tier; use [`SubscriptionState::effective_tier`] for entitlement
    fn tier(&self) -> Tier {
        self.subscription().tier
    }
}

/// Registered account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub subscription: SubscriptionState,
}

impl Account for UserAccount {
    fn principal_ref(&self) -> PrincipalRef {
        PrincipalRef::User(self.id.clone())
    }

    fn email(&self) -> Option<&str> {
        Some(&self.email)
    }

    fn subscription(&self) -> &SubscriptionState {
        &self.subscription
    }

    fn subscription_mut(&mut self) -> &mut SubscriptionState {
        &mut self.subscription
    }
}

/// Anonymous premium record keyed by guest ID
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestAccount {
    pub guest_id: GuestId,
    pub email: Option<String>,
    pub linked_user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub subscription: SubscriptionState,
}

impl GuestAccount {
    pub fn new(guest_id: GuestId, email: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            guest_id,
            email,
            linked_user_id: None,
            created_at: now,
            subscription: SubscriptionState::default(),
        }
    }
}

impl Account for GuestAccount {
    fn principal_ref(&self) -> PrincipalRef {
        PrincipalRef::Guest(self.guest_id.clone())
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    fn subscription(&self) -> &SubscriptionState {
        &self.subscription
    }

    fn subscription_mut(&mut self) -> &mut SubscriptionState {
        &mut self.subscription
    }
}

/// A loaded principal of either kind
#[enum_dispatch(Account)]
#[derive(Debug, Clone, PartialEq)]
pub enum Principal {
    User(UserAccount),
    Guest(GuestAccount),
}

/// Result of identity resolution for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub principal: PrincipalRef,
    pub tier: Tier,
}

impl Identity {
    pub fn owner_key(&self) -> &str {
        self.principal.owner_key()
    }
}
