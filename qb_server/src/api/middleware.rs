//! Principal extraction for handlers.
//!
//! Credentials come from the `Authorization: Bearer <token>` header, the
//! `X-Guest-Id` header or a `guestId` query parameter. Handlers taking a JSON
//! body may also accept `guestId` in the body through [`GuestBody`].
//!
//! ```rust,no_run
//! use axum::Json;
//! use qb_server::api::middleware::CurrentIdentity;
//!
//! async fn whoami(CurrentIdentity(identity): CurrentIdentity) -> Json<String> {
//!     Json(identity.principal.to_string())
//! }
//! # let _ = whoami;
//! ```

use super::{AppState, error::ApiError};
use axum::{
    extract::{FromRequestParts, Query},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use quiz_banner::{
    Identity, PrincipalRef,
    identity::{AuthRequirement, Credentials, UserAccount},
};
use serde::Deserialize;
use std::convert::Infallible;

/// Header carrying an anonymous guest ID
pub const GUEST_ID_HEADER: &str = "x-guest-id";

#[derive(Debug, Deserialize)]
struct GuestQuery {
    #[serde(rename = "guestId")]
    guest_id: Option<String>,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn guest_id(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(GUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    from_header.or_else(|| {
        Query::<GuestQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.guest_id)
            .filter(|value| !value.is_empty())
    })
}

/// Raw credentials of the request, not yet resolved
#[derive(Debug, Clone)]
pub struct RequestCredentials(pub Credentials);

impl RequestCredentials {
    /// Resolve with an optional guest ID taken from the body
    pub async fn resolve(
        self,
        state: &AppState,
        body_guest_id: Option<String>,
        requirement: AuthRequirement,
    ) -> Result<Identity, ApiError> {
        let credentials = self.0.or_guest(body_guest_id);
        Ok(state.services.identity.resolve(&credentials, requirement).await?)
    }
}

impl<S> FromRequestParts<S> for RequestCredentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestCredentials(Credentials {
            bearer: bearer_token(&parts.headers),
            guest_id: guest_id(parts),
        }))
    }
}

/// A registered user or a guest; a bearer token is optional
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(credentials) = RequestCredentials::from_request_parts(parts, state).await;
        let identity = credentials
            .resolve(state, None, AuthRequirement::Optional)
            .await?;
        Ok(CurrentIdentity(identity))
    }
}

/// A registered user with a valid bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub identity: Identity,
}

impl AuthUser {
    pub async fn account(&self, state: &AppState) -> Result<UserAccount, ApiError> {
        Ok(state.services.auth.me(&self.user_id).await?)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credentials = Credentials {
            bearer: bearer_token(&parts.headers),
            guest_id: None,
        };
        let identity = state
            .services
            .identity
            .resolve(&credentials, AuthRequirement::Required)
            .await?;

        match &identity.principal {
            PrincipalRef::User(user_id) => Ok(AuthUser {
                user_id: user_id.clone(),
                identity,
            }),
            PrincipalRef::Guest(_) => Err(ApiError::unauthorized()),
        }
    }
}

/// JSON body that may carry the caller's guest ID next to its payload
#[derive(Debug, Deserialize)]
pub struct GuestBody<T> {
    #[serde(rename = "guestId", default)]
    pub guest_id: Option<String>,
    #[serde(flatten)]
    pub body: T,
}
