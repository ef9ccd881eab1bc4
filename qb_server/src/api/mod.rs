//! REST API of the QuizBanner backend.
//!
//! # Principals
//!
//! Resource routes act for the principal resolved from the request: a bearer
//! token when valid, otherwise a guest ID from the `X-Guest-Id` header, the
//! `guestId` query parameter or a `guestId` body field. See [`middleware`].
//!
//! # Endpoints
//!
//! ```text
//! GET    /api/health
//! POST   /api/auth/register                  POST /api/auth/login
//! GET    /api/auth/me                        (bearer)
//! POST   /api/auth/forgot-password           POST /api/auth/reset-password
//! POST   /api/auth/magic-link                POST /api/auth/magic-link/verify
//! GET    /api/questions                      POST /api/questions
//! DELETE /api/questions
//! GET    /api/questions/{id}                 PATCH/DELETE /api/questions/{id}
//! POST   /api/questions/{id}/review          POST /api/questions/reorder
//! POST   /api/questions/import               GET  /api/questions/categories
//! GET    /api/preferences                    PATCH /api/preferences
//! GET    /api/templates                      POST /api/templates (bearer)
//! GET    /api/templates/{id}                 DELETE /api/templates/{id} (bearer)
//! POST   /api/templates/{id}/apply
//! GET    /api/study-sessions                 POST /api/study-sessions
//! GET    /api/study-sessions/summary
//! GET    /api/subscription/status            POST /api/subscription/cancel
//! POST   /api/subscription/create-payment-intent
//! POST   /api/subscription/confirm-payment
//! GET    /api/guest/premium/{guestId}        POST /api/guest/link (bearer)
//! POST   /api/stripe/webhook
//! POST   /api/contact
//! ```
//!
//! # CORS
//!
//! CORS is permissive; the frontend is served from another origin.

pub mod auth;
pub mod contact;
pub mod error;
pub mod middleware;
pub mod preferences;
pub mod questions;
pub mod request_id;
pub mod study;
pub mod subscription;
pub mod templates;
pub mod webhook;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use quiz_banner::Services;
use serde_json::json;
use tower_http::cors::CorsLayer;

/// Application state shared by all handlers.
///
/// Cloning is cheap; every service holds its dependencies behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    /// Stripe endpoint secret; unsigned webhooks are accepted when unset
    pub webhook_secret: Option<String>,
    pub environment: String,
}

/// Build the router with every endpoint and the shared middleware
///
/// ```rust,no_run
/// # use qb_server::api::{create_router, AppState};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let state: AppState = unimplemented!();
/// let app = create_router(state);
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/magic-link", post(auth::request_magic_link))
        .route("/magic-link/verify", post(auth::verify_magic_link));

    let question_routes = Router::new()
        .route(
            "/",
            get(questions::list_questions)
                .post(questions::create_question)
                .delete(questions::delete_all_questions),
        )
        .route("/reorder", post(questions::reorder_questions))
        .route("/import", post(questions::import_questions))
        .route("/categories", get(questions::list_categories))
        .route(
            "/{id}",
            get(questions::get_question)
                .patch(questions::update_question)
                .delete(questions::delete_question),
        )
        .route("/{id}/review", post(questions::review_question));

    let template_routes = Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/{id}",
            get(templates::get_template).delete(templates::delete_template),
        )
        .route("/{id}/apply", post(templates::apply_template));

    let subscription_routes = Router::new()
        .route("/status", get(subscription::status))
        .route(
            "/create-payment-intent",
            post(subscription::create_payment_intent),
        )
        .route("/confirm-payment", post(subscription::confirm_payment))
        .route("/cancel", post(subscription::cancel));

    let api = Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .nest("/questions", question_routes)
        .route(
            "/preferences",
            get(preferences::get_preferences).patch(preferences::update_preferences),
        )
        .nest("/templates", template_routes)
        .route(
            "/study-sessions",
            get(study::list_sessions).post(study::record_session),
        )
        .route("/study-sessions/summary", get(study::summary))
        .nest("/subscription", subscription_routes)
        .route("/guest/premium/{guest_id}", get(subscription::guest_premium))
        .route("/guest/link", post(subscription::link_guest))
        .route("/stripe/webhook", post(webhook::stripe_webhook))
        .route("/contact", post(contact::submit));

    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn(request_id::tag_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check for monitoring and load balancers.
///
/// Answers `503 Service Unavailable` when the store does not respond.
///
/// ```bash
/// curl http://localhost:5000/api/health
/// # {"status":"healthy","timestamp":"2025-11-22T10:30:00+00:00","environment":"development","database":true}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.services.health.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            false
        }
    };

    let status_code = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if database { "healthy" } else { "unhealthy" },
        "timestamp": state.services.subscriptions.now().to_rfc3339(),
        "environment": state.environment,
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    });

    (status_code, Json(response))
}
