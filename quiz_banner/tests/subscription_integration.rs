//! Integration tests for the subscription lifecycle.
//!
//! Covers status arithmetic, expiry idempotence, guest linking and the
//! resolver's view of lapsed subscriptions, all over the in-memory store.

use chrono::{DateTime, Duration, TimeZone, Utc};
use quiz_banner::{
    Services, Tier,
    auth::{AuthSettings, RegisterRequest},
    clock::{Clock, ManualClock},
    db::{AccountRepository, MemoryStore, UserRepository},
    identity::{AuthRequirement, Credentials, GuestAccount, PrincipalRef, UserAccount},
    mail::Outbox,
    subscription::{SubscriptionError, SubscriptionState, SubscriptionStatus, run_once},
};
use std::sync::Arc;

struct TestContext {
    services: Services,
    store: Arc<MemoryStore>,
    clock: ManualClock,
    outbox: Outbox,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

fn setup() -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new(now());
    let outbox = Outbox::new();
    let services = Services::new(
        store.clone(),
        Arc::new(clock.clone()),
        AuthSettings::new("integration_secret_that_is_long_enough", "integration_pepper"),
        Arc::new(outbox.clone()),
        "support@quizbanner.test".to_string(),
        None,
    );
    TestContext {
        services,
        store,
        clock,
        outbox,
    }
}

async fn seed_user(ctx: &TestContext, id: &str, state: SubscriptionState) -> PrincipalRef {
    let user = UserAccount {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        first_name: None,
        last_name: None,
        created_at: now(),
        last_login: None,
        subscription: state,
    };
    ctx.store.create_user(&user, "unused").await.unwrap();
    PrincipalRef::User(id.to_string())
}

async fn seed_guest(ctx: &TestContext, id: &str, state: SubscriptionState) -> PrincipalRef {
    let mut guest = GuestAccount::new(id.to_string(), Some(format!("{id}@example.com")), now());
    guest.subscription = state;
    ctx.store.insert_guest(&guest).await.unwrap();
    PrincipalRef::Guest(id.to_string())
}

fn premium(status: SubscriptionStatus, expires_at: DateTime<Utc>) -> SubscriptionState {
    SubscriptionState {
        tier: Tier::Premium,
        status,
        expires_at: Some(expires_at),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_status_three_days_before_expiry() {
    let ctx = setup();
    let user = seed_user(
        &ctx,
        "u3",
        premium(SubscriptionStatus::Active, now() + Duration::days(3)),
    )
    .await;

    let info = ctx.services.subscriptions.check_status(&user).await.unwrap();
    assert!(info.is_active);
    assert!(info.needs_renewal);
    assert_eq!(info.days_until_expiry, Some(3));
}

#[tokio::test]
async fn test_lapsed_active_reports_inactive_then_expires() {
    let ctx = setup();
    let guest = seed_guest(
        &ctx,
        "lapsed",
        premium(SubscriptionStatus::Active, now() - Duration::days(1)),
    )
    .await;

    let stored = ctx.store.load_principal(&guest).await.unwrap().unwrap();
    let info = match stored {
        quiz_banner::Principal::Guest(g) => g.subscription.info(ctx.clock.now()),
        quiz_banner::Principal::User(_) => unreachable!(),
    };
    assert!(!info.is_active);

    let state = ctx.services.subscriptions.expire(&guest).await.unwrap();
    assert_eq!(state.tier, Tier::Free);
    assert_eq!(state.status, SubscriptionStatus::Expired);
}

#[tokio::test]
async fn test_expire_is_idempotent() {
    let ctx = setup();
    let user = seed_user(
        &ctx,
        "u1",
        premium(SubscriptionStatus::Active, now() + Duration::days(30)),
    )
    .await;

    let once = ctx.services.subscriptions.expire(&user).await.unwrap();
    let twice = ctx.services.subscriptions.expire(&user).await.unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice.tier, Tier::Free);
    assert_eq!(twice.status, SubscriptionStatus::Expired);
}

#[tokio::test]
async fn test_cancel_without_subscription_is_a_no_op() {
    let ctx = setup();
    let subscriptions = &ctx.services.subscriptions;

    let unknown_guest = PrincipalRef::Guest("never_paid".to_string());
    let state = subscriptions.cancel(&unknown_guest).await.unwrap();
    assert_eq!(state, SubscriptionState::default());
    assert!(ctx.store.load_principal(&unknown_guest).await.unwrap().is_none());

    let free_user = seed_user(&ctx, "u_free", SubscriptionState::default()).await;
    let state = subscriptions.cancel(&free_user).await.unwrap();
    assert_eq!(state.status, SubscriptionStatus::None);

    let missing_user = PrincipalRef::User("missing".to_string());
    assert!(matches!(
        subscriptions.cancel(&missing_user).await,
        Err(SubscriptionError::PrincipalNotFound(_))
    ));
}

#[tokio::test]
async fn test_guest_link_carries_expiry() {
    let ctx = setup();
    let expires_at = now() + Duration::days(10);
    seed_guest(&ctx, "g1", premium(SubscriptionStatus::Active, expires_at)).await;
    let user = seed_user(&ctx, "user-42", SubscriptionState::default()).await;

    let state = ctx
        .services
        .subscriptions
        .link_guest_to_user("g1", "user-42")
        .await
        .unwrap();
    assert_eq!(state.tier, Tier::Premium);
    assert_eq!(state.expires_at, Some(expires_at));

    let again = ctx
        .services
        .subscriptions
        .link_guest_to_user("g1", "user-42")
        .await
        .unwrap();
    assert_eq!(again, state);
    assert_eq!(ctx.services.subscriptions.refresh(&user).await.unwrap(), state);
}

#[tokio::test]
async fn test_link_keeps_later_user_expiry() {
    let ctx = setup();
    seed_guest(
        &ctx,
        "g2",
        premium(SubscriptionStatus::Active, now() + Duration::days(10)),
    )
    .await;
    let user_expiry = now() + Duration::days(200);
    seed_user(&ctx, "u2", premium(SubscriptionStatus::Active, user_expiry)).await;

    let state = ctx
        .services
        .subscriptions
        .link_guest_to_user("g2", "u2")
        .await
        .unwrap();
    assert_eq!(state.expires_at, Some(user_expiry));
}

#[tokio::test]
async fn test_guest_cannot_be_linked_twice() {
    let ctx = setup();
    seed_guest(
        &ctx,
        "g3",
        premium(SubscriptionStatus::Active, now() + Duration::days(10)),
    )
    .await;
    seed_user(&ctx, "first", SubscriptionState::default()).await;
    seed_user(&ctx, "second", SubscriptionState::default()).await;

    let subs = &ctx.services.subscriptions;
    subs.link_guest_to_user("g3", "first").await.unwrap();
    assert!(matches!(
        subs.link_guest_to_user("g3", "second").await,
        Err(SubscriptionError::GuestAlreadyLinked { .. })
    ));
    assert!(matches!(
        subs.link_guest_to_user("unknown", "first").await,
        Err(SubscriptionError::PrincipalNotFound(_))
    ));
}

#[tokio::test]
async fn test_resolver_sees_lapse_without_sweep() {
    let ctx = setup();
    let session = ctx
        .services
        .auth
        .register(RegisterRequest {
            email: "paid@example.com".to_string(),
            password: "quizzes4ever".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
        })
        .await
        .unwrap();
    let user = PrincipalRef::User(session.user.id.clone());
    ctx.services
        .subscriptions
        .activate(&user, &Default::default())
        .await
        .unwrap();

    let credentials = Credentials::bearer(session.token.clone());
    let identity = ctx
        .services
        .identity
        .resolve(&credentials, AuthRequirement::Required)
        .await
        .unwrap();
    assert_eq!(identity.tier, Tier::Premium);

    // Past the 12 month term; the access token was refreshed meanwhile
    ctx.clock.advance(Duration::days(370));
    let fresh = ctx
        .services
        .auth
        .login(quiz_banner::auth::LoginRequest {
            email: "paid@example.com".to_string(),
            password: "quizzes4ever".to_string(),
        })
        .await
        .unwrap();
    let identity = ctx
        .services
        .identity
        .resolve(&Credentials::bearer(fresh.token), AuthRequirement::Required)
        .await
        .unwrap();
    assert_eq!(identity.tier, Tier::Free);
}

#[tokio::test]
async fn test_sweep_expires_and_reminds_through_services() {
    let ctx = setup();
    seed_guest(
        &ctx,
        "old",
        premium(SubscriptionStatus::Cancelled, now() - Duration::hours(2)),
    )
    .await;
    seed_user(
        &ctx,
        "renewing",
        premium(SubscriptionStatus::Active, now() + Duration::days(1)),
    )
    .await;

    let report = run_once(&ctx.services.subscriptions, ctx.services.mailer.as_ref())
        .await
        .unwrap();
    assert_eq!(report.expired, vec![PrincipalRef::Guest("old".to_string())]);
    assert_eq!(report.reminders_sent, 1);
    assert!(ctx.outbox.last_to("renewing@example.com").is_some());
}
