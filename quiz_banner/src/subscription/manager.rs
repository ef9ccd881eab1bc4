//! Subscription lifecycle manager.

use super::{
    errors::{SubscriptionError, SubscriptionResult},
    models::{ProviderRefs, ReminderCandidate, SubscriptionInfo, SubscriptionState},
};
use crate::{
    clock::Clock,
    db::AccountRepository,
    identity::{Account, GuestAccount, Principal, PrincipalRef},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Subscription lifecycle manager
///
/// Every transition loads the principal, applies the pure transition from
/// [`SubscriptionState`] and writes the embedded fields back. Concurrent
/// transitions on one principal are last-write-wins.
#[derive(Clone)]
pub struct SubscriptionManager {
    accounts: Arc<dyn AccountRepository>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionManager {
    pub fn new(accounts: Arc<dyn AccountRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { accounts, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Grant a fresh premium term.
    ///
    /// A guest without a record gets one created first.
    pub async fn activate(
        &self,
        principal: &PrincipalRef,
        refs: &ProviderRefs,
    ) -> SubscriptionResult<SubscriptionState> {
        let now = self.clock.now();
        let mut account = match self.accounts.load_principal(principal).await? {
            Some(account) => account,
            None => self.create_guest(principal, None, now).await?,
        };

        account.subscription_mut().activate(now, refs);
        self.accounts
            .save_subscription(principal, account.subscription())
            .await?;

        log::info!(
            "Activated premium for {} until {:?}",
            principal,
            account.subscription().expires_at
        );
        Ok(account.subscription().clone())
    }

    /// Make sure a guest record exists, recording `email` on creation
    pub async fn ensure_guest(
        &self,
        guest_id: &str,
        email: Option<String>,
    ) -> SubscriptionResult<()> {
        let principal = PrincipalRef::Guest(guest_id.to_string());
        if self.accounts.load_principal(&principal).await?.is_none() {
            self.create_guest(&principal, email, self.clock.now()).await?;
        }
        Ok(())
    }

    /// Stop renewal; access continues until `expires_at`.
    ///
    /// Cancelling a subscription that is not active changes nothing, and a
    /// guest without a record has nothing to cancel.
    pub async fn cancel(&self, principal: &PrincipalRef) -> SubscriptionResult<SubscriptionState> {
        let mut account = match self.accounts.load_principal(principal).await? {
            Some(account) => account,
            None if principal.is_guest() => return Ok(SubscriptionState::default()),
            None => return Err(SubscriptionError::PrincipalNotFound(principal.clone())),
        };

        if account.subscription_mut().cancel() {
            self.accounts
                .save_subscription(principal, account.subscription())
                .await?;
            log::info!("Cancelled subscription of {}", principal);
        } else {
            log::debug!(
                "Cancel ignored for {} in status {}",
                principal,
                account.subscription().status
            );
        }
        Ok(account.subscription().clone())
    }

    /// Drop to the free tier. Idempotent.
    pub async fn expire(&self, principal: &PrincipalRef) -> SubscriptionResult<SubscriptionState> {
        let mut account = self.load(principal).await?;
        account.subscription_mut().expire();
        self.accounts
            .save_subscription(principal, account.subscription())
            .await?;

        log::info!("Expired subscription of {}", principal);
        Ok(account.subscription().clone())
    }

    /// Current state, lazily expiring a premium principal whose term ran out.
    ///
    /// Unknown guests are free; unknown users are an error.
    pub async fn refresh(&self, principal: &PrincipalRef) -> SubscriptionResult<SubscriptionState> {
        let Some(mut account) = self.accounts.load_principal(principal).await? else {
            return match principal {
                PrincipalRef::Guest(_) => Ok(SubscriptionState::default()),
                PrincipalRef::User(_) => {
                    Err(SubscriptionError::PrincipalNotFound(principal.clone()))
                }
            };
        };

        let now = self.clock.now();
        if account.subscription().needs_expiry(now) {
            account.subscription_mut().expire();
            self.accounts
                .save_subscription(principal, account.subscription())
                .await?;
            log::info!("Lazily expired subscription of {}", principal);
        }
        Ok(account.subscription().clone())
    }

    pub async fn check_status(&self, principal: &PrincipalRef) -> SubscriptionResult<SubscriptionInfo> {
        let state = self.refresh(principal).await?;
        Ok(state.info(self.clock.now()))
    }

    /// Move a guest's premium onto a registered account.
    ///
    /// One-way and idempotent. The user keeps whichever expiry is later.
    pub async fn link_guest_to_user(
        &self,
        guest_id: &str,
        user_id: &str,
    ) -> SubscriptionResult<SubscriptionState> {
        let guest_ref = PrincipalRef::Guest(guest_id.to_string());
        let user_ref = PrincipalRef::User(user_id.to_string());

        let guest = match self.load(&guest_ref).await? {
            Principal::Guest(guest) => guest,
            Principal::User(_) => {
                return Err(SubscriptionError::PrincipalNotFound(guest_ref));
            }
        };
        if guest
            .linked_user_id
            .as_deref()
            .is_some_and(|linked| linked != user_id)
        {
            return Err(SubscriptionError::GuestAlreadyLinked {
                guest_id: guest_id.to_string(),
            });
        }

        let mut user = self.load(&user_ref).await?;
        let now = self.clock.now();
        if user.subscription_mut().absorb_guest(&guest.subscription, now) {
            self.accounts
                .save_subscription(&user_ref, user.subscription())
                .await?;
            log::info!("Carried premium of guest {} over to user {}", guest_id, user_id);
        }
        if guest.linked_user_id.is_none() {
            self.accounts.set_guest_link(guest_id, user_id).await?;
        }
        Ok(user.subscription().clone())
    }

    /// Principals with an active or cancelled term that ended before now
    pub async fn lapsed(&self) -> SubscriptionResult<Vec<PrincipalRef>> {
        Ok(self.accounts.list_lapsed(self.clock.now()).await?)
    }

    /// Active principals whose term ends within `window`
    pub async fn expiring_within(
        &self,
        window: chrono::Duration,
    ) -> SubscriptionResult<Vec<ReminderCandidate>> {
        let now = self.clock.now();
        Ok(self.accounts.list_expiring(now, now + window).await?)
    }

    async fn load(&self, principal: &PrincipalRef) -> SubscriptionResult<Principal> {
        self.accounts
            .load_principal(principal)
            .await?
            .ok_or_else(|| SubscriptionError::PrincipalNotFound(principal.clone()))
    }

    async fn create_guest(
        &self,
        principal: &PrincipalRef,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> SubscriptionResult<Principal> {
        let PrincipalRef::Guest(guest_id) = principal else {
            return Err(SubscriptionError::PrincipalNotFound(principal.clone()));
        };

        let guest = GuestAccount::new(guest_id.clone(), email, now);
        self.accounts.insert_guest(&guest).await?;
        log::debug!("Created guest record {}", guest_id);
        Ok(guest.into())
    }
}
