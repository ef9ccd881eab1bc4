//! Subscription data models and the pure state transitions.

use crate::{identity::PrincipalRef, tier::Tier};
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Length of a premium term granted by any activation
pub const SUBSCRIPTION_TERM_MONTHS: u32 = 12;

/// Window before expiry in which renewal reminders are sent
pub const RENEWAL_WINDOW_DAYS: i64 = 7;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::None => "none",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SubscriptionStatus::None),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" | "canceled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(format!("unknown subscription status '{other}'")),
        }
    }
}

/// Payment provider linkage carried by an activation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRefs {
    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub payment_intent_id: Option<String>,
}

/// Subscription fields embedded in both user and guest records.
///
/// `tier` is a cached field; entitlement is always decided by
/// [`SubscriptionState::is_entitled`] against the current time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionState {
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub provider_customer_id: Option<String>,
    pub provider_payment_intent_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub upgraded_at: Option<DateTime<Utc>>,
}

impl SubscriptionState {
    /// Grant a fresh premium term starting at `now`.
    ///
    /// Reactivating an expired subscription is the same transition as the first one.
    pub fn activate(&mut self, now: DateTime<Utc>, refs: &ProviderRefs) {
        self.tier = Tier::Premium;
        self.status = SubscriptionStatus::Active;
        self.expires_at = Some(term_end(now));
        if refs.subscription_id.is_some() {
            self.provider_subscription_id = refs.subscription_id.clone();
        }
        if refs.customer_id.is_some() {
            self.provider_customer_id = refs.customer_id.clone();
        }
        if refs.payment_intent_id.is_some() {
            self.provider_payment_intent_id = refs.payment_intent_id.clone();
        }
        self.last_payment_date = Some(now);
        if self.upgraded_at.is_none() {
            self.upgraded_at = Some(now);
        }
    }

    /// Mark as cancelled; access continues until `expires_at`.
    ///
    /// Returns `false` (and changes nothing) unless the subscription is active.
    pub fn cancel(&mut self) -> bool {
        if self.status != SubscriptionStatus::Active {
            return false;
        }
        self.status = SubscriptionStatus::Cancelled;
        true
    }

    /// Drop to the free tier
    pub fn expire(&mut self) {
        self.tier = Tier::Free;
        self.status = SubscriptionStatus::Expired;
    }

    /// Whether premium access is currently granted
    pub fn is_entitled(&self, now: DateTime<Utc>) -> bool {
        matches!(
            self.status,
            SubscriptionStatus::Active | SubscriptionStatus::Cancelled
        ) && self.expires_at.is_some_and(|exp| exp > now)
    }

    /// Whether the cached fields still claim premium after the term ran out
    pub fn needs_expiry(&self, now: DateTime<Utc>) -> bool {
        let claims_premium = self.tier == Tier::Premium
            || matches!(
                self.status,
                SubscriptionStatus::Active | SubscriptionStatus::Cancelled
            );
        claims_premium && !self.is_entitled(now)
    }

    /// Tier the principal is entitled to right now
    pub fn effective_tier(&self, now: DateTime<Utc>) -> Tier {
        if self.is_entitled(now) {
            Tier::Premium
        } else {
            Tier::Free
        }
    }

    /// Snapshot of the subscription as seen at `now`
    pub fn info(&self, now: DateTime<Utc>) -> SubscriptionInfo {
        let days_until_expiry = self.expires_at.map(|exp| days_until(exp, now));
        SubscriptionInfo {
            is_active: self.status == SubscriptionStatus::Active
                && self.expires_at.is_some_and(|exp| exp > now),
            is_entitled: self.is_entitled(now),
            expires_at: self.expires_at,
            days_until_expiry,
            status: self.status,
            needs_renewal: days_until_expiry
                .is_some_and(|days| days > 0 && days <= RENEWAL_WINDOW_DAYS),
            tier: self.effective_tier(now),
        }
    }

    /// Carry a guest's premium state over to this account.
    ///
    /// Only an entitled guest contributes, and the later expiry wins so a
    /// user is never shortened. Returns whether anything changed.
    pub fn absorb_guest(&mut self, guest: &SubscriptionState, now: DateTime<Utc>) -> bool {
        if !guest.is_entitled(now) {
            return false;
        }

        let mut changed = false;
        let own_expiry = self.expires_at.filter(|_| self.is_entitled(now));
        if guest.expires_at > own_expiry {
            self.expires_at = guest.expires_at;
            self.status = guest.status;
            if guest.provider_payment_intent_id.is_some() {
                self.provider_payment_intent_id = guest.provider_payment_intent_id.clone();
            }
            changed = true;
        }
        if self.tier != Tier::Premium {
            self.tier = Tier::Premium;
            changed = true;
        }
        if self.upgraded_at.is_none() {
            self.upgraded_at = Some(now);
            changed = true;
        }
        changed
    }
}

/// Read model answering "is this principal premium right now"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub is_active: bool,
    pub is_entitled: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub status: SubscriptionStatus,
    pub needs_renewal: bool,
    pub tier: Tier,
}

/// Principal whose active subscription ends inside the renewal window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderCandidate {
    pub principal: PrincipalRef,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// End of a term starting at `start`
pub fn term_end(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(SUBSCRIPTION_TERM_MONTHS))
        .unwrap_or(start + Duration::days(365))
}

/// Whole days until `expires_at`, rounded up
pub fn days_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (expires_at - now).num_milliseconds();
    let days = millis / MILLIS_PER_DAY;
    if millis % MILLIS_PER_DAY > 0 {
        days + 1
    } else {
        days
    }
}
