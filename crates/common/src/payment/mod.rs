//! Payment processor abstraction
//!
//! Provides a unified interface over the card payment provider. The core
//! only needs two signals: a client secret for a created charge, and the
//! webhook confirmation that a charge succeeded or failed. A failed or
//! abandoned charge never rolls back the draft order it was created for.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// A created charge awaiting client-side confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeIntent {
    /// Provider-side intent id (stored as the transaction reference)
    pub intent_id: String,

    /// Secret handed to the client to complete the charge
    pub client_secret: String,
}

/// Trait for card charge creation
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Create a charge for an order; returns the client secret
    async fn create_charge(
        &self,
        amount_cents: i64,
        currency: &str,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<ChargeIntent>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Stripe payment intent client
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
    max_retries: u32,
}

#[derive(Deserialize)]
struct StripeIntentResponse {
    id: String,
    client_secret: String,
}

impl StripeClient {
    /// Create a new Stripe client
    pub fn new(secret_key: String, base_url: Option<String>, timeout_secs: u64, max_retries: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            secret_key,
            base_url: base_url.unwrap_or_else(|| "https://api.stripe.com/v1".to_string()),
            max_retries,
        }
    }

    /// Make request with retry
    async fn request_with_retry(&self, params: &[(String, String)]) -> Result<StripeIntentResponse> {
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                // Exponential backoff
                let delay = Duration::from_millis(100 * (2_u64.pow(attempt)));
                tokio::time::sleep(delay).await;
            }

            match self.make_request(params).await {
                Ok(intent) => return Ok(intent),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %e,
                        "Charge creation failed, retrying"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AppError::PaymentFailed {
            message: "Unknown error after retries".to_string(),
        }))
    }

    async fn make_request(&self, params: &[(String, String)]) -> Result<StripeIntentResponse> {
        let url = format!("{}/payment_intents", self.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::PaymentFailed {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentFailed {
                message: format!("Provider error {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| AppError::PaymentFailed {
            message: format!("Failed to parse response: {}", e),
        })
    }
}

#[async_trait]
impl PaymentProcessor for StripeClient {
    async fn create_charge(
        &self,
        amount_cents: i64,
        currency: &str,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<ChargeIntent> {
        let params = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("metadata[user_id]".to_string(), user_id.to_string()),
            ("metadata[order_id]".to_string(), order_id.to_string()),
        ];

        let intent = self.request_with_retry(&params).await?;

        tracing::info!(
            intent_id = %intent.id,
            order_id = %order_id,
            amount_cents,
            "Charge created"
        );

        Ok(ChargeIntent {
            intent_id: intent.id,
            client_secret: intent.client_secret,
        })
    }

    fn provider_name(&self) -> &str {
        "stripe"
    }
}

/// Placeholder processor used when no provider is configured
///
/// Every charge attempt fails; balance payments remain available.
pub struct UnconfiguredPayments;

#[async_trait]
impl PaymentProcessor for UnconfiguredPayments {
    async fn create_charge(
        &self,
        _amount_cents: i64,
        _currency: &str,
        _user_id: Uuid,
        _order_id: Uuid,
    ) -> Result<ChargeIntent> {
        Err(AppError::PaymentFailed {
            message: "No payment processor configured".to_string(),
        })
    }

    fn provider_name(&self) -> &str {
        "unconfigured"
    }
}

/// Webhook event payloads sent by the provider
pub mod webhook {
    use super::*;

    /// Intent status confirming a successful charge
    pub const INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

    /// Intent status for a failed charge
    pub const INTENT_FAILED: &str = "payment_intent.payment_failed";

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct WebhookEvent {
        #[serde(rename = "type")]
        pub event_type: String,
        pub data: WebhookData,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct WebhookData {
        pub object: PaymentIntentObject,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PaymentIntentObject {
        pub id: String,
        #[serde(default)]
        pub metadata: HashMap<String, String>,
    }

    impl WebhookEvent {
        /// Extract the order id carried in the intent metadata
        pub fn order_id(&self) -> Option<Uuid> {
            self.data
                .object
                .metadata
                .get("order_id")
                .and_then(|s| Uuid::parse_str(s).ok())
        }

        /// Whether this event confirms a successful charge
        pub fn is_success(&self) -> bool {
            self.event_type == INTENT_SUCCEEDED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_event_parsing() {
        let order_id = Uuid::new_v4();
        let json = format!(
            r#"{{
                "type": "payment_intent.succeeded",
                "data": {{
                    "object": {{
                        "id": "pi_123",
                        "metadata": {{"order_id": "{}", "user_id": "abc"}}
                    }}
                }}
            }}"#,
            order_id
        );

        let event: webhook::WebhookEvent = serde_json::from_str(&json).unwrap();
        assert!(event.is_success());
        assert_eq!(event.order_id(), Some(order_id));
    }

    #[test]
    fn test_webhook_event_without_order_id() {
        let json = r#"{
            "type": "payment_intent.payment_failed",
            "data": {"object": {"id": "pi_456"}}
        }"#;

        let event: webhook::WebhookEvent = serde_json::from_str(json).unwrap();
        assert!(!event.is_success());
        assert_eq!(event.order_id(), None);
    }

    #[tokio::test]
    async fn test_unconfigured_processor_rejects_charges() {
        let processor = UnconfiguredPayments;
        let result = processor
            .create_charge(1000, "usd", Uuid::new_v4(), Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(AppError::PaymentFailed { .. })));
    }
}
