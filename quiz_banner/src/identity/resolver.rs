//! Identity resolution: credentials in, principal and entitled tier out.

use super::{
    errors::{IdentityError, IdentityResult},
    principal::{Identity, PrincipalRef},
};
use crate::{
    auth::AuthManager,
    db::UserRepository,
    subscription::{SubscriptionError, SubscriptionManager},
};
use std::sync::Arc;

const MAX_GUEST_ID_LEN: usize = 128;

/// Raw credentials extracted from a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub bearer: Option<String>,
    pub guest_id: Option<String>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer: Some(token.into()),
            guest_id: None,
        }
    }

    pub fn guest(guest_id: impl Into<String>) -> Self {
        Self {
            bearer: None,
            guest_id: Some(guest_id.into()),
        }
    }

    /// Fill in a guest ID found later (e.g. in a request body) when none was given
    pub fn or_guest(mut self, guest_id: Option<String>) -> Self {
        if self.guest_id.is_none() {
            self.guest_id = guest_id;
        }
        self
    }
}

/// Whether an endpoint demands a registered user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    Required,
    Optional,
}

/// Check a client-generated guest ID: 1-128 chars of `[A-Za-z0-9_-]`
pub fn validate_guest_id(guest_id: &str) -> IdentityResult<()> {
    let valid = !guest_id.is_empty()
        && guest_id.len() <= MAX_GUEST_ID_LEN
        && guest_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(IdentityError::InvalidGuestId(
            "expected 1-128 characters of letters, digits, '_' or '-'".to_string(),
        ))
    }
}

/// Turns request credentials into an [`Identity`].
///
/// A valid bearer token wins over a guest ID. The tier is always the
/// entitled tier at resolution time, never the one embedded in the token.
#[derive(Clone)]
pub struct IdentityResolver {
    auth: AuthManager,
    subscriptions: SubscriptionManager,
    users: Arc<dyn UserRepository>,
}

impl IdentityResolver {
    pub fn new(
        auth: AuthManager,
        subscriptions: SubscriptionManager,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            auth,
            subscriptions,
            users,
        }
    }

    pub async fn resolve(
        &self,
        credentials: &Credentials,
        requirement: AuthRequirement,
    ) -> IdentityResult<Identity> {
        let user_id = match credentials.bearer.as_deref() {
            Some(token) => match self.auth.verify_access_token(token) {
                Ok(claims) => Some(claims.sub),
                Err(e) if requirement == AuthRequirement::Required => {
                    log::debug!("Rejected bearer token: {}", e);
                    return Err(IdentityError::Unauthorized);
                }
                Err(e) => {
                    log::debug!("Ignoring invalid bearer token: {}", e);
                    None
                }
            },
            None if requirement == AuthRequirement::Required => {
                return Err(IdentityError::Unauthorized);
            }
            None => None,
        };

        if let Some(user_id) = user_id {
            return self.identity_for(PrincipalRef::User(user_id)).await;
        }

        let guest_id = credentials
            .guest_id
            .as_deref()
            .ok_or(IdentityError::MissingPrincipal)?;
        validate_guest_id(guest_id)?;

        if self.users.find_user_by_id(guest_id).await?.is_some() {
            log::warn!("Guest ID matching a registered user was rejected");
            return Err(IdentityError::Unauthorized);
        }

        self.identity_for(PrincipalRef::Guest(guest_id.to_string()))
            .await
    }

    async fn identity_for(&self, principal: PrincipalRef) -> IdentityResult<Identity> {
        let state = match self.subscriptions.refresh(&principal).await {
            Ok(state) => state,
            Err(SubscriptionError::Store(e)) => return Err(e.into()),
            // Token for a deleted user
            Err(_) => return Err(IdentityError::Unauthorized),
        };

        Ok(Identity {
            tier: state.effective_tier(self.subscriptions.now()),
            principal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{AuthSettings, RegisterRequest},
        clock::ManualClock,
        db::{AccountRepository, MemoryStore},
        identity::Account,
        mail::LogMailer,
        subscription::{ProviderRefs, SubscriptionStatus},
        tier::Tier,
    };
    use chrono::{Duration, TimeZone, Utc};

    struct Harness {
        resolver: IdentityResolver,
        auth: AuthManager,
        subscriptions: SubscriptionManager,
        store: Arc<MemoryStore>,
        clock: ManualClock,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap());
        let auth = AuthManager::new(
            store.clone(),
            Arc::new(clock.clone()),
            Arc::new(LogMailer),
            AuthSettings::new("resolver_test_secret_long_enough_!!", "resolver_pepper_"),
        );
        let subscriptions = SubscriptionManager::new(store.clone(), Arc::new(clock.clone()));
        let resolver = IdentityResolver::new(auth.clone(), subscriptions.clone(), store.clone());
        Harness {
            resolver,
            auth,
            subscriptions,
            store,
            clock,
        }
    }

    async fn register(h: &Harness) -> (String, String) {
        let session = h
            .auth
            .register(RegisterRequest {
                email: "reader@example.com".to_string(),
                password: "banner2025".to_string(),
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap();
        (session.user.id, session.token)
    }

    #[tokio::test]
    async fn test_bearer_wins_over_guest() {
        let h = harness();
        let (user_id, token) = register(&h).await;

        let credentials = Credentials::bearer(token).or_guest(Some("guest_1".to_string()));
        let identity = h
            .resolver
            .resolve(&credentials, AuthRequirement::Optional)
            .await
            .unwrap();
        assert_eq!(identity.principal, PrincipalRef::User(user_id));
        assert_eq!(identity.tier, Tier::Free);
    }

    #[tokio::test]
    async fn test_invalid_token_optional_falls_back_to_guest() {
        let h = harness();
        let credentials = Credentials::bearer("not-a-jwt").or_guest(Some("guest_1".to_string()));
        let identity = h
            .resolver
            .resolve(&credentials, AuthRequirement::Optional)
            .await
            .unwrap();
        assert_eq!(identity.principal, PrincipalRef::Guest("guest_1".to_string()));

        let bare = Credentials::bearer("not-a-jwt");
        assert!(matches!(
            h.resolver.resolve(&bare, AuthRequirement::Optional).await,
            Err(IdentityError::MissingPrincipal)
        ));
    }

    #[tokio::test]
    async fn test_required_rejects_guest_and_bad_token() {
        let h = harness();
        assert!(matches!(
            h.resolver
                .resolve(&Credentials::guest("guest_1"), AuthRequirement::Required)
                .await,
            Err(IdentityError::Unauthorized)
        ));
        assert!(matches!(
            h.resolver
                .resolve(&Credentials::bearer("bad"), AuthRequirement::Required)
                .await,
            Err(IdentityError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_no_credentials_is_missing_principal() {
        let h = harness();
        assert!(matches!(
            h.resolver
                .resolve(&Credentials::default(), AuthRequirement::Optional)
                .await,
            Err(IdentityError::MissingPrincipal)
        ));
    }

    #[tokio::test]
    async fn test_malformed_guest_id() {
        let h = harness();
        let too_long = "x".repeat(129);
        for bad in ["", "has space", "semi;colon", too_long.as_str()] {
            assert!(matches!(
                h.resolver
                    .resolve(&Credentials::guest(bad), AuthRequirement::Optional)
                    .await,
                Err(IdentityError::InvalidGuestId(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_guest_id_equal_to_user_id_rejected() {
        let h = harness();
        let (user_id, _) = register(&h).await;
        assert!(matches!(
            h.resolver
                .resolve(&Credentials::guest(user_id), AuthRequirement::Optional)
                .await,
            Err(IdentityError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_premium_guest_and_lazy_expiry() {
        let h = harness();
        let guest = PrincipalRef::Guest("guest_paid".to_string());
        h.subscriptions
            .activate(&guest, &ProviderRefs::default())
            .await
            .unwrap();

        let credentials = Credentials::guest("guest_paid");
        let identity = h
            .resolver
            .resolve(&credentials, AuthRequirement::Optional)
            .await
            .unwrap();
        assert_eq!(identity.tier, Tier::Premium);

        h.clock.advance(Duration::days(400));
        let identity = h
            .resolver
            .resolve(&credentials, AuthRequirement::Optional)
            .await
            .unwrap();
        assert_eq!(identity.tier, Tier::Free);

        let stored = h.store.load_principal(&guest).await.unwrap().unwrap();
        assert_eq!(stored.subscription().status, SubscriptionStatus::Expired);
    }

    #[tokio::test]
    async fn test_token_tier_claim_is_not_trusted() {
        let h = harness();
        let (user_id, token) = register(&h).await;
        let user = PrincipalRef::User(user_id);
        h.subscriptions
            .activate(&user, &ProviderRefs::default())
            .await
            .unwrap();

        // Token was issued while free; entitlement is read fresh
        let identity = h
            .resolver
            .resolve(&Credentials::bearer(token), AuthRequirement::Required)
            .await
            .unwrap();
        assert_eq!(identity.tier, Tier::Premium);
    }
}
