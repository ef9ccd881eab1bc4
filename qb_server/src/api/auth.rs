//! Authentication endpoints.
//!
//! Registration and login return `{user, token}`. Password reset and magic
//! links mail a single-use token; the request endpoints answer the same way
//! whether or not the email is known.

use super::{AppState, error::ApiError, middleware::AuthUser};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use quiz_banner::{
    auth::{AuthSession, LoginRequest, MagicLinkOutcome, RegisterRequest},
    identity::UserAccount,
    subscription::SubscriptionInfo,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserAccount,
    pub subscription: SubscriptionInfo,
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthSession>), ApiError> {
    let session = state.services.auth.register(request).await?;
    tracing::info!(user_id = %session.user.id, "User registered");
    Ok((StatusCode::CREATED, Json(session)))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    match state.services.auth.login(request).await {
        Ok(session) => Ok(Json(session)),
        Err(e) => {
            crate::logging::log_security_event("login_failed", None, &e.to_string());
            Err(e.into())
        }
    }
}

/// `GET /api/auth/me`
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let account = user.account(&state).await?;
    let subscription = state
        .services
        .subscriptions
        .check_status(&user.identity.principal)
        .await?;
    Ok(Json(MeResponse {
        user: account,
        subscription,
    }))
}

/// `POST /api/auth/forgot-password`
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.auth.forgot_password(&request.email).await?;
    Ok(Json(json!({
        "message": "If that email is registered, a reset link has been sent"
    })))
}

/// `POST /api/auth/reset-password`
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .auth
        .reset_password(&request.token, &request.password)
        .await?;
    Ok(Json(json!({ "message": "Password updated" })))
}

/// `POST /api/auth/magic-link`
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(request): Json<EmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.auth.request_magic_link(&request.email).await?;
    Ok(Json(json!({
        "message": "If that email is known, a sign-in link has been sent"
    })))
}

/// `POST /api/auth/magic-link/verify`
pub async fn verify_magic_link(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<MagicLinkOutcome>, ApiError> {
    match state.services.auth.verify_magic_link(&request.token).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            crate::logging::log_security_event("magic_link_rejected", None, &e.to_string());
            Err(e.into())
        }
    }
}
