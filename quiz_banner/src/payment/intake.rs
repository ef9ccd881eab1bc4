//! Payment event intake: provider events in, lifecycle transitions out.

use super::{
    errors::{PaymentError, PaymentResult},
    models::{
        Confirmation, EventKind, EventOutcome, PaymentEvent, PaymentEventPayload, PaymentEventRecord,
        PaymentIntent, Transition,
    },
    stripe::PaymentProvider,
};
use crate::{
    db::{AccountRepository, PaymentEventRepository},
    identity::PrincipalRef,
    subscription::{ProviderRefs, SubscriptionError, SubscriptionManager},
};
use std::sync::Arc;

/// Provider subscription statuses that keep premium running
const LIVE_PROVIDER_STATUSES: [&str; 2] = ["active", "trialing"];

/// Transition an event maps to
pub fn transition_for(kind: EventKind, provider_status: Option<&str>) -> Transition {
    match kind {
        EventKind::PaymentSucceeded | EventKind::InvoicePaymentSucceeded => Transition::Activate,
        EventKind::SubscriptionUpdated => {
            if provider_status.is_some_and(|s| LIVE_PROVIDER_STATUSES.contains(&s)) {
                Transition::Activate
            } else {
                Transition::Cancel
            }
        }
        EventKind::SubscriptionDeleted | EventKind::InvoicePaymentFailed => Transition::Cancel,
    }
}

#[derive(Clone)]
pub struct PaymentIntake {
    ledger: Arc<dyn PaymentEventRepository>,
    accounts: Arc<dyn AccountRepository>,
    subscriptions: SubscriptionManager,
    provider: Option<Arc<dyn PaymentProvider>>,
}

impl PaymentIntake {
    pub fn new<S>(
        store: Arc<S>,
        subscriptions: SubscriptionManager,
        provider: Option<Arc<dyn PaymentProvider>>,
    ) -> Self
    where
        S: PaymentEventRepository + AccountRepository + 'static,
    {
        Self {
            ledger: store.clone(),
            accounts: store,
            subscriptions,
            provider,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Apply one provider event.
    ///
    /// Each idempotency key is applied at most once; a repeat returns
    /// [`EventOutcome::Duplicate`]. If applying fails the key is released so
    /// the provider's retry can succeed.
    ///
    /// Events naming no known principal fail with
    /// [`PaymentError::UnresolvedPrincipal`]. Only an activation may create a
    /// guest record.
    pub async fn on_payment_event(&self, event: PaymentEvent) -> PaymentResult<EventOutcome> {
        let transition = transition_for(event.kind, event.payload.provider_status.as_deref());
        let principal = self
            .resolve_principal(&event.payload, transition)
            .await?
            .ok_or_else(|| PaymentError::UnresolvedPrincipal(event.id.clone()))?;

        let key = event.idempotency_key();
        let record = PaymentEventRecord {
            event_id: key.clone(),
            kind: event.kind,
            principal: principal.to_string(),
            processed_at: self.subscriptions.now(),
        };
        if !self.ledger.record_event(&record).await? {
            log::info!("Skipping duplicate payment event {} ({})", key, event.kind);
            return Ok(EventOutcome::Duplicate);
        }

        match self.apply(&principal, transition, &event.payload).await {
            Ok(outcome) => {
                log::info!(
                    "Payment event {} ({}) applied: {} {}",
                    event.id,
                    event.kind,
                    transition,
                    principal
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Err(release) = self.ledger.forget_event(&key).await {
                    log::error!("Failed to release payment event {}: {}", key, release);
                }
                match e {
                    // Deleted between resolution and apply
                    PaymentError::Subscription(SubscriptionError::PrincipalNotFound(_)) => {
                        Err(PaymentError::UnresolvedPrincipal(event.id))
                    }
                    e => Err(e),
                }
            }
        }
    }

    /// Create a provider payment for one premium term
    pub async fn create_payment_intent(
        &self,
        principal: &PrincipalRef,
        email: Option<&str>,
    ) -> PaymentResult<PaymentIntent> {
        let provider = self.provider.as_ref().ok_or(PaymentError::NotConfigured)?;
        provider.create_payment_intent(principal, email).await
    }

    /// Activate premium after the client reports a finished payment.
    ///
    /// The intent is re-read from the provider; the client's word is not trusted.
    pub async fn confirm_payment_intent(
        &self,
        principal: &PrincipalRef,
        payment_intent_id: &str,
    ) -> PaymentResult<Confirmation> {
        let provider = self.provider.as_ref().ok_or(PaymentError::NotConfigured)?;
        let intent = provider.retrieve_payment_intent(payment_intent_id).await?;

        if !intent.succeeded() {
            return Err(PaymentError::PaymentIncomplete(intent.status));
        }
        if intent.principal().is_some_and(|owner| &owner != principal) {
            log::warn!(
                "Payment intent {} confirmed by {} but created for another principal",
                intent.id,
                principal
            );
            return Err(PaymentError::PrincipalMismatch);
        }

        let (user_id, guest_id) = match principal {
            PrincipalRef::User(id) => (Some(id.clone()), None),
            PrincipalRef::Guest(id) => (None, Some(id.clone())),
        };
        let event = PaymentEvent {
            id: format!("pi:{}", intent.id),
            kind: EventKind::PaymentSucceeded,
            payload: PaymentEventPayload {
                user_id,
                guest_id,
                email: intent.metadata.get("email").cloned(),
                customer_id: intent.customer_id.clone(),
                payment_intent_id: Some(intent.id.clone()),
                ..Default::default()
            },
        };
        let outcome = self.on_payment_event(event).await?;
        log::debug!("Confirmation of {} was {}", intent.id, outcome.label());

        let info = self.subscriptions.check_status(principal).await?;
        Ok(Confirmation { outcome, info })
    }

    async fn apply(
        &self,
        principal: &PrincipalRef,
        transition: Transition,
        payload: &PaymentEventPayload,
    ) -> PaymentResult<EventOutcome> {
        let state = match transition {
            Transition::Activate => {
                if let PrincipalRef::Guest(guest_id) = principal {
                    self.subscriptions
                        .ensure_guest(guest_id, payload.email.clone())
                        .await?;
                }
                let refs = ProviderRefs {
                    subscription_id: payload.subscription_id.clone(),
                    customer_id: payload.customer_id.clone(),
                    payment_intent_id: payload.payment_intent_id.clone(),
                };
                self.subscriptions.activate(principal, &refs).await?
            }
            Transition::Cancel => self.subscriptions.cancel(principal).await?,
        };

        Ok(EventOutcome::Applied {
            principal: principal.clone(),
            transition,
            state,
        })
    }

    /// Metadata first, then stored provider subscription ID, then customer ID.
    ///
    /// A metadata principal counts only if it has a record, except a guest
    /// about to be activated.
    async fn resolve_principal(
        &self,
        payload: &PaymentEventPayload,
        transition: Transition,
    ) -> PaymentResult<Option<PrincipalRef>> {
        if let Some(user_id) = &payload.user_id {
            let user = PrincipalRef::User(user_id.clone());
            if self.accounts.load_principal(&user).await?.is_some() {
                return Ok(Some(user));
            }
            log::warn!("Payment event names unknown user {}", user_id);
        } else if let Some(guest_id) = &payload.guest_id {
            let guest = PrincipalRef::Guest(guest_id.clone());
            if transition == Transition::Activate
                || self.accounts.load_principal(&guest).await?.is_some()
            {
                return Ok(Some(guest));
            }
            log::warn!("Payment event cancels unknown guest {}", guest_id);
        }
        if let Some(subscription_id) = &payload.subscription_id {
            if let Some(principal) = self
                .accounts
                .find_by_provider_subscription(subscription_id)
                .await?
            {
                return Ok(Some(principal));
            }
        }
        if let Some(customer_id) = &payload.customer_id {
            return Ok(self.accounts.find_by_provider_customer(customer_id).await?);
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        db::MemoryStore,
        subscription::SubscriptionStatus,
        tier::Tier,
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;

    struct FakeProvider {
        status: String,
        metadata: HashMap<String, String>,
    }

    #[async_trait]
    impl PaymentProvider for FakeProvider {
        async fn create_payment_intent(
            &self,
            _principal: &PrincipalRef,
            _email: Option<&str>,
        ) -> PaymentResult<PaymentIntent> {
            self.retrieve_payment_intent("pi_fake").await
        }

        async fn retrieve_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent> {
            Ok(PaymentIntent {
                id: id.to_string(),
                client_secret: Some("secret".to_string()),
                amount: 999,
                currency: "usd".to_string(),
                status: self.status.clone(),
                customer_id: Some("cus_1".to_string()),
                metadata: self.metadata.clone(),
            })
        }
    }

    fn setup(provider: Option<FakeProvider>) -> (PaymentIntake, SubscriptionManager, ManualClock) {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 8, 1, 9, 0, 0).unwrap());
        let subscriptions = SubscriptionManager::new(store.clone(), Arc::new(clock.clone()));
        let provider = provider.map(|p| Arc::new(p) as Arc<dyn PaymentProvider>);
        let intake = PaymentIntake::new(store, subscriptions.clone(), provider);
        (intake, subscriptions, clock)
    }

    fn guest_paid(event_id: &str, guest: &str) -> PaymentEvent {
        PaymentEvent {
            id: event_id.to_string(),
            kind: EventKind::PaymentSucceeded,
            payload: PaymentEventPayload {
                guest_id: Some(guest.to_string()),
                payment_intent_id: Some(format!("pi_{event_id}")),
                customer_id: Some("cus_1".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_transition_mapping() {
        assert_eq!(transition_for(EventKind::PaymentSucceeded, None), Transition::Activate);
        assert_eq!(
            transition_for(EventKind::SubscriptionUpdated, Some("trialing")),
            Transition::Activate
        );
        assert_eq!(
            transition_for(EventKind::SubscriptionUpdated, Some("past_due")),
            Transition::Cancel
        );
        assert_eq!(transition_for(EventKind::InvoicePaymentFailed, None), Transition::Cancel);
    }

    #[tokio::test]
    async fn test_duplicate_event_does_not_extend_term() {
        let (intake, subscriptions, clock) = setup(None);
        let event = guest_paid("evt_1", "guest_a");

        let first = intake.on_payment_event(event.clone()).await.unwrap();
        let EventOutcome::Applied { state, .. } = first else {
            panic!("first delivery must apply");
        };
        let expires_at = state.expires_at;

        clock.advance(Duration::days(1));
        assert_eq!(intake.on_payment_event(event).await.unwrap(), EventOutcome::Duplicate);

        let guest = PrincipalRef::Guest("guest_a".to_string());
        assert_eq!(subscriptions.refresh(&guest).await.unwrap().expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_cancel_resolved_by_subscription_id() {
        let (intake, subscriptions, _) = setup(None);
        let mut activation = guest_paid("evt_1", "guest_b");
        activation.payload.subscription_id = Some("sub_9".to_string());
        intake.on_payment_event(activation).await.unwrap();

        let deleted = PaymentEvent {
            id: "evt_2".to_string(),
            kind: EventKind::SubscriptionDeleted,
            payload: PaymentEventPayload {
                subscription_id: Some("sub_9".to_string()),
                ..Default::default()
            },
        };
        intake.on_payment_event(deleted).await.unwrap();

        let state = subscriptions
            .refresh(&PrincipalRef::Guest("guest_b".to_string()))
            .await
            .unwrap();
        assert_eq!(state.status, SubscriptionStatus::Cancelled);
        assert_eq!(state.tier, Tier::Premium);
    }

    #[tokio::test]
    async fn test_unresolved_principal() {
        let (intake, _, _) = setup(None);
        let event = PaymentEvent {
            id: "evt_x".to_string(),
            kind: EventKind::InvoicePaymentFailed,
            payload: PaymentEventPayload {
                customer_id: Some("cus_unknown".to_string()),
                ..Default::default()
            },
        };
        assert!(matches!(
            intake.on_payment_event(event).await,
            Err(PaymentError::UnresolvedPrincipal(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_metadata_principal_is_unresolved() {
        let (intake, subscriptions, _) = setup(None);
        let for_missing_user = PaymentEvent {
            id: "evt_u".to_string(),
            kind: EventKind::PaymentSucceeded,
            payload: PaymentEventPayload {
                user_id: Some("missing_user".to_string()),
                ..Default::default()
            },
        };
        assert!(matches!(
            intake.on_payment_event(for_missing_user.clone()).await,
            Err(PaymentError::UnresolvedPrincipal(_))
        ));
        // Not recorded, so a retry is unresolved again rather than a duplicate
        assert!(matches!(
            intake.on_payment_event(for_missing_user).await,
            Err(PaymentError::UnresolvedPrincipal(_))
        ));

        let cancel_unknown_guest = PaymentEvent {
            id: "evt_g".to_string(),
            kind: EventKind::SubscriptionDeleted,
            payload: PaymentEventPayload {
                guest_id: Some("never_seen".to_string()),
                ..Default::default()
            },
        };
        assert!(matches!(
            intake.on_payment_event(cancel_unknown_guest).await,
            Err(PaymentError::UnresolvedPrincipal(_))
        ));

        // Activation still creates the guest
        let outcome = intake
            .on_payment_event(guest_paid("evt_n", "never_seen"))
            .await
            .unwrap();
        assert_eq!(outcome.label(), "applied");
        let guest = PrincipalRef::Guest("never_seen".to_string());
        assert!(subscriptions.check_status(&guest).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_confirm_and_webhook_count_once() {
        let mut metadata = HashMap::new();
        metadata.insert("guestId".to_string(), "guest_c".to_string());
        let (intake, subscriptions, clock) = setup(Some(FakeProvider {
            status: "succeeded".to_string(),
            metadata,
        }));
        let guest = PrincipalRef::Guest("guest_c".to_string());

        let confirmed = intake.confirm_payment_intent(&guest, "pi_42").await.unwrap();
        assert_eq!(confirmed.outcome.label(), "applied");
        assert!(confirmed.info.is_active);
        let expires_at = confirmed.info.expires_at;

        let again = intake.confirm_payment_intent(&guest, "pi_42").await.unwrap();
        assert_eq!(again.outcome, EventOutcome::Duplicate);
        assert_eq!(again.info.expires_at, expires_at);

        clock.advance(Duration::hours(1));
        let webhook = PaymentEvent {
            id: "evt_from_stripe".to_string(),
            kind: EventKind::PaymentSucceeded,
            payload: PaymentEventPayload {
                guest_id: Some("guest_c".to_string()),
                payment_intent_id: Some("pi_42".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(intake.on_payment_event(webhook).await.unwrap(), EventOutcome::Duplicate);
        assert_eq!(subscriptions.check_status(&guest).await.unwrap().expires_at, expires_at);
    }

    #[tokio::test]
    async fn test_confirm_rejects_incomplete_and_foreign_intents() {
        let (intake, _, _) = setup(Some(FakeProvider {
            status: "requires_payment_method".to_string(),
            metadata: HashMap::new(),
        }));
        let guest = PrincipalRef::Guest("guest_d".to_string());
        assert!(matches!(
            intake.confirm_payment_intent(&guest, "pi_1").await,
            Err(PaymentError::PaymentIncomplete(_))
        ));

        let mut metadata = HashMap::new();
        metadata.insert("userId".to_string(), "someone_else".to_string());
        let (intake, _, _) = setup(Some(FakeProvider {
            status: "succeeded".to_string(),
            metadata,
        }));
        assert!(matches!(
            intake.confirm_payment_intent(&guest, "pi_1").await,
            Err(PaymentError::PrincipalMismatch)
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let (intake, _, _) = setup(None);
        let guest = PrincipalRef::Guest("guest_e".to_string());
        assert!(!intake.is_configured());
        assert!(matches!(
            intake.create_payment_intent(&guest, None).await,
            Err(PaymentError::NotConfigured)
        ));
    }
}
