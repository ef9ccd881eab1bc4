//! Contact form endpoint.

use super::{AppState, error::ApiError};
use axum::{Json, extract::State, http::StatusCode};
use quiz_banner::contact::{ContactMessage, ContactRequest};

/// `POST /api/contact`
pub async fn submit(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<(StatusCode, Json<ContactMessage>), ApiError> {
    let message = state.services.contact.submit(request).await?;
    tracing::info!(message_id = %message.id, "Contact message received");
    Ok((StatusCode::CREATED, Json(message)))
}
