//! Question deck endpoints.
//!
//! Every route is scoped to the resolved principal; rows of other principals
//! answer 404 exactly like absent ones.

use super::{
    AppState,
    error::ApiError,
    middleware::{CurrentIdentity, GuestBody, RequestCredentials},
};
use crate::metrics;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use quiz_banner::{
    identity::AuthRequirement,
    questions::{NewQuestion, Question, QuestionError, QuestionPatch},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub question_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub correct: bool,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub questions: Vec<NewQuestion>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: usize,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub questions: Vec<Question>,
}

/// Count quota rejections before handing the error on
pub(super) fn observe(err: QuestionError) -> ApiError {
    if let QuestionError::QuotaExceeded { tier, .. } = &err {
        metrics::quota_rejections_total(tier.as_str());
    }
    err.into()
}

/// `GET /api/questions`
pub async fn list_questions(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<Question>>, ApiError> {
    let questions = state.services.questions.list(identity.owner_key()).await?;
    Ok(Json(questions))
}

/// `POST /api/questions`
pub async fn create_question(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Json(request): Json<GuestBody<NewQuestion>>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;
    let question = state
        .services
        .questions
        .create(identity.owner_key(), identity.tier, request.body)
        .await
        .map_err(observe)?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// `DELETE /api/questions`
pub async fn delete_all_questions(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state
        .services
        .questions
        .delete_all(identity.owner_key())
        .await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// `GET /api/questions/{id}`
pub async fn get_question(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<Json<Question>, ApiError> {
    let question = state
        .services
        .questions
        .get(&id, identity.owner_key())
        .await?;
    Ok(Json(question))
}

/// `PATCH /api/questions/{id}`
pub async fn update_question(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Path(id): Path<String>,
    Json(request): Json<GuestBody<QuestionPatch>>,
) -> Result<Json<Question>, ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;
    let question = state
        .services
        .questions
        .update(&id, identity.owner_key(), request.body)
        .await?;
    Ok(Json(question))
}

/// `DELETE /api/questions/{id}`; deleting an absent question succeeds
pub async fn delete_question(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state
        .services
        .questions
        .delete(&id, identity.owner_key())
        .await?;
    Ok(Json(DeletedResponse {
        deleted: u64::from(deleted),
    }))
}

/// `POST /api/questions/reorder`
pub async fn reorder_questions(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Json(request): Json<GuestBody<ReorderRequest>>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;
    let updated = state
        .services
        .questions
        .reorder(identity.owner_key(), &request.body.question_ids)
        .await?;
    Ok(Json(UpdatedResponse { updated }))
}

/// `POST /api/questions/{id}/review`
pub async fn review_question(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Path(id): Path<String>,
    Json(request): Json<GuestBody<ReviewRequest>>,
) -> Result<Json<Question>, ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;
    let question = state
        .services
        .questions
        .record_review(&id, identity.owner_key(), request.body.correct)
        .await?;
    Ok(Json(question))
}

/// `POST /api/questions/import`
pub async fn import_questions(
    State(state): State<AppState>,
    credentials: RequestCredentials,
    Json(request): Json<GuestBody<ImportRequest>>,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    let identity = credentials
        .resolve(&state, request.guest_id, AuthRequirement::Optional)
        .await?;
    let questions = state
        .services
        .questions
        .import(identity.owner_key(), identity.tier, request.body.questions)
        .await
        .map_err(observe)?;
    Ok((
        StatusCode::CREATED,
        Json(ImportResponse {
            imported: questions.len(),
            questions,
        }),
    ))
}

/// `GET /api/questions/categories`
pub async fn list_categories(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<String>>, ApiError> {
    let categories = state
        .services
        .questions
        .categories(identity.owner_key())
        .await?;
    Ok(Json(categories))
}

