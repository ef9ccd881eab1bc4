//! Payment provider interface and the Stripe REST client.

use super::{
    errors::{PaymentError, PaymentResult},
    models::PaymentIntent,
};
use crate::identity::PrincipalRef;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// One-time premium purchases at the payment provider
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Start a payment for `principal`; its key is stored in the intent metadata
    async fn create_payment_intent(
        &self,
        principal: &PrincipalRef,
        email: Option<&str>,
    ) -> PaymentResult<PaymentIntent>;

    async fn retrieve_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent>;
}

/// Stripe connection settings
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    /// Price of one premium term in the smallest currency unit
    pub amount: i64,
    pub currency: String,
    pub api_base: String,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, amount: i64, currency: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            amount,
            currency: currency.into(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }
}

/// [`PaymentProvider`] over the Stripe REST API
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Deserialize)]
struct StripePaymentIntent {
    id: String,
    client_secret: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    customer: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl From<StripePaymentIntent> for PaymentIntent {
    fn from(intent: StripePaymentIntent) -> Self {
        PaymentIntent {
            id: intent.id,
            client_secret: intent.client_secret,
            amount: intent.amount,
            currency: intent.currency,
            status: intent.status,
            customer_id: intent.customer,
            metadata: intent.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    async fn read_intent(response: reqwest::Response) -> PaymentResult<PaymentIntent> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Provider(format!("{status}: {message}")));
        }

        let intent: StripePaymentIntent = response.json().await?;
        Ok(intent.into())
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_payment_intent(
        &self,
        principal: &PrincipalRef,
        email: Option<&str>,
    ) -> PaymentResult<PaymentIntent> {
        let principal_key = match principal {
            PrincipalRef::User(_) => "metadata[userId]",
            PrincipalRef::Guest(_) => "metadata[guestId]",
        };
        let mut form = vec![
            ("amount", self.config.amount.to_string()),
            ("currency", self.config.currency.clone()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("metadata[product]", "premium".to_string()),
            (principal_key, principal.owner_key().to_string()),
        ];
        if let Some(email) = email {
            form.push(("receipt_email", email.to_string()));
            form.push(("metadata[email]", email.to_string()));
        }

        let response = self
            .http
            .post(format!("{}/payment_intents", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await?;

        let intent = Self::read_intent(response).await?;
        log::info!("Created payment intent {} for {}", intent.id, principal);
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PaymentError::InvalidPayload("malformed payment intent id".to_string()));
        }

        let response = self
            .http
            .get(format!("{}/payment_intents/{id}", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await?;

        Self::read_intent(response).await
    }
}
