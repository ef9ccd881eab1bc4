//! Stripe webhook authentication and event parsing.

use super::{
    errors::{PaymentError, PaymentResult},
    models::{EventKind, PaymentEvent, PaymentEventPayload},
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a signed webhook, in seconds
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header (`t=<ts>,v1=<hex>[,v1=<hex>...]`).
///
/// The signed payload is `"<ts>.<body>"` under HMAC-SHA256 with the endpoint
/// secret. Any matching `v1` entry is accepted.
pub fn verify_signature(
    secret: &str,
    header: &str,
    body: &[u8],
    now: DateTime<Utc>,
) -> PaymentResult<()> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(PaymentError::InvalidSignature)?;
    if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        log::warn!("Webhook timestamp {} outside tolerance", timestamp);
        return Err(PaymentError::InvalidSignature);
    }

    let expected = sign(secret, timestamp, body)?;
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig).is_ok_and(|provided| bool::from(expected.ct_eq(&provided[..])))
    });
    if matched {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

/// Header value signing `body` at `timestamp`, as the provider would send it
pub fn signature_header(secret: &str, timestamp: i64, body: &[u8]) -> PaymentResult<String> {
    Ok(format!("t={timestamp},v1={}", hex::encode(sign(secret, timestamp, body)?)))
}

fn sign(secret: &str, timestamp: i64, body: &[u8]) -> PaymentResult<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| PaymentError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: Value,
}

/// Parse a webhook body into a [`PaymentEvent`].
///
/// Event types the lifecycle does not react to yield `Ok(None)`.
pub fn parse_stripe_event(body: &[u8]) -> PaymentResult<Option<PaymentEvent>> {
    let event: StripeEvent =
        serde_json::from_slice(body).map_err(|e| PaymentError::InvalidPayload(e.to_string()))?;

    let Some(kind) = EventKind::from_stripe(&event.event_type) else {
        log::debug!("Ignoring Stripe event type {}", event.event_type);
        return Ok(None);
    };

    let obj = &event.data.object;
    let mut payload = PaymentEventPayload {
        customer_id: get_str(obj, "customer"),
        ..Default::default()
    };
    match kind {
        EventKind::PaymentSucceeded => {
            payload.payment_intent_id = get_str(obj, "id");
        }
        EventKind::SubscriptionUpdated | EventKind::SubscriptionDeleted => {
            payload.subscription_id = get_str(obj, "id");
            payload.provider_status = get_str(obj, "status");
        }
        EventKind::InvoicePaymentSucceeded | EventKind::InvoicePaymentFailed => {
            payload.subscription_id = get_str(obj, "subscription");
            payload.payment_intent_id = get_str(obj, "payment_intent");
        }
    }

    let metadata = [
        obj.get("metadata"),
        obj.get("subscription_details").and_then(|d| d.get("metadata")),
    ];
    let meta = |key: &str| {
        metadata
            .iter()
            .flatten()
            .find_map(|m| get_str(m, key))
            .filter(|v| !v.is_empty())
    };
    payload.user_id = meta("userId");
    payload.guest_id = meta("guestId");
    payload.email = meta("email")
        .or_else(|| get_str(obj, "receipt_email"))
        .or_else(|| get_str(obj, "customer_email"));

    Ok(Some(PaymentEvent {
        id: event.id,
        kind,
        payload,
    }))
}

fn get_str(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "whsec_test";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"id":"evt_1"}"#;
        let header = signature_header(SECRET, now().timestamp(), body).unwrap();
        assert!(verify_signature(SECRET, &header, body, now()).is_ok());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = signature_header(SECRET, now().timestamp(), b"original").unwrap();
        assert!(matches!(
            verify_signature(SECRET, &header, b"tampered", now()),
            Err(PaymentError::InvalidSignature)
        ));
    }

    #[test]
    fn test_stale_or_malformed_header_rejected() {
        let body = b"{}";
        let stale = signature_header(SECRET, now().timestamp() - 301, body).unwrap();
        assert!(verify_signature(SECRET, &stale, body, now()).is_err());
        assert!(verify_signature(SECRET, "v1=abcd", body, now()).is_err());
        assert!(verify_signature(SECRET, "t=1,v1=zz", body, now()).is_err());
    }

    #[test]
    fn test_one_matching_signature_is_enough() {
        let body = b"{}";
        let valid = signature_header(SECRET, now().timestamp(), body).unwrap();
        let header = format!("{valid},v1={}", "00".repeat(32));
        assert!(verify_signature(SECRET, &header, body, now()).is_ok());
    }

    #[test]
    fn test_parse_payment_intent_succeeded() {
        let body = br#"{
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": {"object": {
                "id": "pi_1",
                "customer": "cus_1",
                "receipt_email": "kim@example.com",
                "metadata": {"guestId": "guest_7"}
            }}
        }"#;
        let event = parse_stripe_event(body).unwrap().unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.kind, EventKind::PaymentSucceeded);
        assert_eq!(event.payload.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(event.payload.guest_id.as_deref(), Some("guest_7"));
        assert_eq!(event.payload.email.as_deref(), Some("kim@example.com"));
        assert_eq!(event.payload.customer_id.as_deref(), Some("cus_1"));
    }

    #[test]
    fn test_parse_subscription_and_invoice() {
        let body = br#"{"id": "evt_2", "type": "customer.subscription.updated",
            "data": {"object": {"id": "sub_1", "status": "past_due", "customer": "cus_1"}}}"#;
        let event = parse_stripe_event(body).unwrap().unwrap();
        assert_eq!(event.payload.subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(event.payload.provider_status.as_deref(), Some("past_due"));

        let body = br#"{"id": "evt_3", "type": "invoice.payment_failed",
            "data": {"object": {"subscription": "sub_1",
                "subscription_details": {"metadata": {"userId": "u1"}}}}}"#;
        let event = parse_stripe_event(body).unwrap().unwrap();
        assert_eq!(event.kind, EventKind::InvoicePaymentFailed);
        assert_eq!(event.payload.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn test_unknown_type_ignored_and_garbage_rejected() {
        let body = br#"{"id": "evt_4", "type": "charge.refunded", "data": {"object": {}}}"#;
        assert!(parse_stripe_event(body).unwrap().is_none());
        assert!(matches!(
            parse_stripe_event(b"not json"),
            Err(PaymentError::InvalidPayload(_))
        ));
    }
}
