//! Study session endpoints.

use super::{
    AppState,
    error::ApiError,
    middleware::{CurrentIdentity, GuestBody, RequestCredentials},
};
use axum::{Json, extract::State, http::StatusCode};
use quiz_banner::{
    identity::AuthRequirement,
    study::{NewStudySession, StudySession, StudySummary},
};

/// `GET /api/study-sessions`, newest first
pub async fn list_sessions(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<StudySession>>, ApiError> {
    Ok(Json(state.services.study.list(identity.owner_key()).await?))
}

/// `POST /api/study-sessions`
pub async fn record_session(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Json(request): Json<GuestBody<NewStudySession>>,
) -> Result<(StatusCode, Json<StudySession>), ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;
    let session = state
        .services
        .study
        .record(identity.owner_key(), request.body)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /api/study-sessions/summary`
pub async fn summary(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<StudySummary>, ApiError> {
    Ok(Json(state.services.study.summary(identity.owner_key()).await?))
}
