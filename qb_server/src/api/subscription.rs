//! Subscription and guest premium endpoints.
//!
//! Payment intents are created through the configured provider; confirmation
//! re-reads the intent server-side before any term is granted.

use super::{
    AppState,
    error::ApiError,
    middleware::{AuthUser, CurrentIdentity, GuestBody, RequestCredentials},
};
use crate::{logging, metrics};
use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use quiz_banner::{
    PrincipalRef, TierLimits,
    identity::{AuthRequirement, Credentials},
    payment::{EventOutcome, PaymentError},
    subscription::{SubscriptionInfo, SubscriptionStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub info: SubscriptionInfo,
    pub limits: TierLimits,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateIntentRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkGuestRequest {
    pub guest_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestPremiumResponse {
    pub is_premium: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
}

/// `GET /api/subscription/status`
pub async fn status(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<StatusResponse>, ApiError> {
    let info = state
        .services
        .subscriptions
        .check_status(&identity.principal)
        .await?;
    Ok(Json(StatusResponse {
        limits: TierLimits::for_tier(identity.tier),
        info,
    }))
}

/// `POST /api/subscription/create-payment-intent`
pub async fn create_payment_intent(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Json(request): Json<GuestBody<CreateIntentRequest>>,
) -> Result<Json<CreateIntentResponse>, ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;

    let email = match &identity.principal {
        PrincipalRef::User(user_id) => Some(state.services.auth.me(user_id).await?.email),
        PrincipalRef::Guest(_) => request.body.email,
    };

    let intent = state
        .services
        .payments
        .create_payment_intent(&identity.principal, email.as_deref())
        .await?;
    tracing::info!(
        principal = %identity.principal,
        payment_intent_id = %intent.id,
        "Payment intent created"
    );

    Ok(Json(CreateIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        amount: intent.amount,
        currency: intent.currency,
    }))
}

/// `POST /api/subscription/confirm-payment`
pub async fn confirm_payment(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Json(request): Json<GuestBody<ConfirmPaymentRequest>>,
) -> Result<Json<SubscriptionInfo>, ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;
    let principal = identity.principal;

    let confirmation = state
        .services
        .payments
        .confirm_payment_intent(&principal, &request.body.payment_intent_id)
        .await
        .inspect_err(|e| {
            if matches!(e, PaymentError::PrincipalMismatch) {
                logging::log_security_event(
                    "payment_principal_mismatch",
                    Some(&principal.to_string()),
                    "Payment intent confirmed by another principal",
                );
            }
        })?;

    if let EventOutcome::Applied { transition, .. } = &confirmation.outcome {
        let transition = transition.to_string();
        logging::log_subscription_event(&principal.to_string(), &transition, "confirm_payment");
        metrics::subscription_transitions_total(&transition);
    }
    Ok(Json(confirmation.info))
}

/// `POST /api/subscription/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<SubscriptionInfo>, ApiError> {
    let subscriptions = &state.services.subscriptions;
    let before = subscriptions.check_status(&identity.principal).await?;
    let after = subscriptions.cancel(&identity.principal).await?;

    if before.status != after.status {
        logging::log_subscription_event(&identity.principal.to_string(), "cancel", "api");
        metrics::subscription_transitions_total("cancel");
    }
    Ok(Json(after.info(subscriptions.now())))
}

/// `GET /api/guest/premium/{guest_id}`
pub async fn guest_premium(
    State(state): State<AppState>,
    Path(guest_id): Path<String>,
) -> Result<Json<GuestPremiumResponse>, ApiError> {
    let identity = state
        .services
        .identity
        .resolve(&Credentials::guest(guest_id), AuthRequirement::Optional)
        .await?;
    let info = state
        .services
        .subscriptions
        .check_status(&identity.principal)
        .await?;

    let known = info.status != SubscriptionStatus::None;
    Ok(Json(GuestPremiumResponse {
        is_premium: info.is_entitled,
        expires_at: info.expires_at,
        status: known.then_some(info.status),
    }))
}

/// `POST /api/guest/link`: move a guest's premium onto the signed-in user
pub async fn link_guest(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<LinkGuestRequest>,
) -> Result<Json<SubscriptionInfo>, ApiError> {
    quiz_banner::identity::validate_guest_id(&request.guest_id)?;
    let subscriptions = &state.services.subscriptions;
    let linked = subscriptions
        .link_guest_to_user(&request.guest_id, &user.user_id)
        .await?;

    logging::log_subscription_event(
        &user.identity.principal.to_string(),
        "link",
        &format!("guest:{}", request.guest_id),
    );
    metrics::subscription_transitions_total("link");
    Ok(Json(linked.info(subscriptions.now())))
}
