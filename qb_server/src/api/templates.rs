//! Shared template endpoints.

use super::{
    AppState,
    error::ApiError,
    middleware::{AuthUser, CurrentIdentity},
    questions::{ImportResponse, observe},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use quiz_banner::templates::{NewTemplate, Template};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TemplateFilter {
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TemplateDeleted {
    pub deleted: bool,
}

/// `GET /api/templates?category=...`
pub async fn list_templates(
    State(state): State<AppState>,
    Query(filter): Query<TemplateFilter>,
) -> Result<Json<Vec<Template>>, ApiError> {
    let templates = state
        .services
        .templates
        .list(filter.category.as_deref())
        .await?;
    Ok(Json(templates))
}

/// `GET /api/templates/{id}`
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Template>, ApiError> {
    Ok(Json(state.services.templates.get(&id).await?))
}

/// `POST /api/templates` (registered users only)
pub async fn create_template(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<NewTemplate>,
) -> Result<(StatusCode, Json<Template>), ApiError> {
    let template = state.services.templates.create(request).await?;
    tracing::info!(template_id = %template.id, user_id = %user.user_id, "Template created");
    Ok((StatusCode::CREATED, Json(template)))
}

/// `DELETE /api/templates/{id}` (registered users only)
pub async fn delete_template(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<TemplateDeleted>, ApiError> {
    let deleted = state.services.templates.delete(&id).await?;
    if deleted {
        tracing::info!(template_id = %id, user_id = %user.user_id, "Template deleted");
    }
    Ok(Json(TemplateDeleted { deleted }))
}

/// `POST /api/templates/{id}/apply`: copy the items into the caller's deck
pub async fn apply_template(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(template_id): Path<String>,
) -> Result<(StatusCode, Json<ImportResponse>), ApiError> {
    let questions = state
        .services
        .questions
        .apply_template(identity.owner_key(), identity.tier, &template_id)
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
