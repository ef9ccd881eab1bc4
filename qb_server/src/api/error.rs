//! Mapping of service errors onto HTTP responses.
//!
//! Every handler returns `Result<_, ApiError>`. The body is always
//! `{"error": "<message>", ...context}`; messages come from each error's
//! `client_message()` so store, JWT and provider details never reach clients.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quiz_banner::{
    auth::AuthError,
    contact::ContactError,
    identity::IdentityError,
    payment::PaymentError,
    preferences::PreferencesError,
    questions::QuestionError,
    study::StudyError,
    subscription::SubscriptionError,
    templates::TemplateError,
    tier::{Feature, Tier},
};
use serde_json::{Map, Value, json};

/// Error response of the REST API
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    context: Map<String, Value>,
    /// Server-side cause, logged for 5xx responses only
    cause: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            context: Map::new(),
            cause: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    fn internal(message: String, cause: String) -> Self {
        Self {
            cause: Some(cause),
            ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }

    /// Attach an extra field to the response body
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    fn quota_exceeded(current: usize, limit: usize, tier: Tier) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            format!("Question limit reached for the {tier} tier"),
        )
        .with("code", "QUOTA_EXCEEDED")
        .with("current", current)
        .with("limit", limit)
        .with("tier", tier.as_str())
    }

    fn feature_locked(feature: Feature, tier: Tier) -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            format!("{feature} is not available on the {tier} tier"),
        )
        .with("code", "FEATURE_LOCKED")
        .with("feature", feature.to_string())
        .with("tier", tier.as_str())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                cause = self.cause.as_deref().unwrap_or(""),
                "Request failed: {}",
                self.message
            );
        }

        let mut body = self.context;
        body.insert("error".to_string(), json!(self.message));
        (self.status, Json(Value::Object(body))).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::MissingPrincipal | IdentityError::InvalidGuestId(_) => {
                Self::bad_request(err.client_message())
            }
            IdentityError::Unauthorized => Self::unauthorized(),
            IdentityError::Store(_) => Self::internal(err.client_message(), err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::Jwt(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidEmail | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
            AuthError::Store(_) | AuthError::HashingFailed => {
                return Self::internal(err.client_message(), err.to_string());
            }
        };
        Self::new(status, err.client_message())
    }
}

impl From<QuestionError> for ApiError {
    fn from(err: QuestionError) -> Self {
        match err {
            QuestionError::NotFound | QuestionError::TemplateNotFound => {
                Self::not_found(err.client_message())
            }
            QuestionError::QuotaExceeded {
                current,
                limit,
                tier,
            } => Self::quota_exceeded(current, limit, tier),
            QuestionError::FeatureLocked { feature, tier } => Self::feature_locked(feature, tier),
            QuestionError::Validation(msg) => Self::bad_request(msg),
            QuestionError::Store(_) => Self::internal(err.client_message(), err.to_string()),
        }
    }
}

impl From<PreferencesError> for ApiError {
    fn from(err: PreferencesError) -> Self {
        match err {
            PreferencesError::FeatureLocked { feature, tier } => Self::feature_locked(feature, tier),
            PreferencesError::Validation(msg) => Self::bad_request(msg),
            PreferencesError::Store(_) => Self::internal(err.client_message(), err.to_string()),
        }
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::PrincipalNotFound(_) => Self::not_found(err.client_message()),
            SubscriptionError::GuestAlreadyLinked { .. } => {
                Self::new(StatusCode::CONFLICT, err.client_message())
            }
            SubscriptionError::Store(_) => Self::internal(err.client_message(), err.to_string()),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Subscription(inner) => inner.into(),
            PaymentError::InvalidSignature
            | PaymentError::InvalidPayload(_)
            | PaymentError::PaymentIncomplete(_)
            | PaymentError::UnresolvedPrincipal(_) => Self::bad_request(err.client_message()),
            PaymentError::PrincipalMismatch => {
                Self::new(StatusCode::FORBIDDEN, err.client_message())
            }
            PaymentError::NotConfigured => {
                Self::internal(err.client_message(), "missing STRIPE_SECRET_KEY".to_string())
            }
            PaymentError::Provider(_) | PaymentError::Http(_) | PaymentError::Store(_) => {
                Self::internal(err.client_message(), err.to_string())
            }
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::NotFound => Self::not_found(err.client_message()),
            TemplateError::Validation(msg) => Self::bad_request(msg),
            TemplateError::Store(_) => Self::internal(err.client_message(), err.to_string()),
        }
    }
}

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        match err {
            StudyError::Validation(msg) => Self::bad_request(msg),
            StudyError::Store(_) => Self::internal(err.client_message(), err.to_string()),
        }
    }
}

impl From<ContactError> for ApiError {
    fn from(err: ContactError) -> Self {
        match err {
            ContactError::Validation(msg) => Self::bad_request(msg),
            ContactError::Store(_) => Self::internal(err.client_message(), err.to_string()),
        }
    }
}
