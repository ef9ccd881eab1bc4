//! Stripe webhook endpoint.
//!
//! The body is taken raw so the signature can be checked over the exact
//! bytes the provider signed. Events that cannot be mapped to a principal are
//! acknowledged with 200 so the provider stops retrying them; store failures
//! answer 500 so it retries.

use super::{AppState, error::ApiError, request_id::RequestId};
use crate::{logging, metrics};
use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use quiz_banner::payment::{EventOutcome, PaymentError, parse_stripe_event, verify_signature};
use serde::Serialize;

/// Header carrying the provider signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    /// `applied`, `duplicate`, `ignored` or `unresolved`
    pub outcome: &'static str,
}

impl WebhookAck {
    fn new(outcome: &'static str) -> Json<Self> {
        Json(Self {
            received: true,
            outcome,
        })
    }
}

/// `POST /api/stripe/webhook`
pub async fn stripe_webhook(
    State(state): State<AppState>,
    request_id: RequestId,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    match &state.webhook_secret {
        Some(secret) => {
            let header = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(PaymentError::InvalidSignature)?;
            let now = state.services.subscriptions.now();
            if let Err(e) = verify_signature(secret, header, &body, now) {
                logging::log_security_event(
                    "invalid_webhook_signature",
                    None,
                    &format!("request {}: {}", request_id.as_str(), e),
                );
                return Err(e.into());
            }
        }
        None => {
            tracing::warn!(
                request_id = %request_id.as_str(),
                "STRIPE_WEBHOOK_SECRET not set; accepting unsigned webhook"
            );
        }
    }

    let Some(event) = parse_stripe_event(&body)? else {
        return Ok(WebhookAck::new("ignored"));
    };
    let kind = event.kind;
    let event_id = event.id.clone();

    match state.services.payments.on_payment_event(event).await {
        Ok(outcome) => {
            metrics::payment_events_total(kind.as_str(), outcome.label());
            if let EventOutcome::Applied {
                principal,
                transition,
                ..
            } = &outcome
            {
                let transition = transition.to_string();
                logging::log_subscription_event(&principal.to_string(), &transition, "webhook");
                metrics::subscription_transitions_total(&transition);
            }
            Ok(WebhookAck::new(outcome.label()))
        }
        Err(PaymentError::UnresolvedPrincipal(_)) => {
            tracing::warn!(
                request_id = %request_id.as_str(),
                event_id = %event_id,
                kind = %kind,
                "Payment event without a known principal acknowledged"
            );
            metrics::payment_events_total(kind.as_str(), "unresolved");
            Ok(WebhookAck::new("unresolved"))
        }
        Err(e) => {
            metrics::payment_events_total(kind.as_str(), "failed");
            Err(e.into())
        }
    }
}
