//! Preferences endpoints.

use super::{
    AppState,
    error::ApiError,
    middleware::{CurrentIdentity, GuestBody, RequestCredentials},
};
use axum::{Json, extract::State};
use quiz_banner::{
    identity::AuthRequirement,
    preferences::{Preferences, PreferencesPatch},
};

/// `GET /api/preferences`; first read persists the defaults
pub async fn get_preferences(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Preferences>, ApiError> {
    let preferences = state
        .services
        .preferences
        .get_or_create_default(identity.owner_key())
        .await?;
    Ok(Json(preferences))
}

/// `PATCH /api/preferences`
pub async fn update_preferences(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Json(request): Json<GuestBody<PreferencesPatch>>,
) -> Result<Json<Preferences>, ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;
    let preferences = state
        .services
        .preferences
        .update(identity.owner_key(), identity.tier, request.body)
        .await?;
    Ok(Json(preferences))
}
