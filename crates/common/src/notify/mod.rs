//! Fire-and-forget notifier boundary
//!
//! Informs other system parts (admin dashboards, downstream consumers) that
//! an order event occurred. The core never blocks on or retries delivery;
//! failures are logged and dropped. Implementations are injected into the
//! order builder rather than reached through a process-wide handle.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Order event payload pushed to listeners
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub collection_id: Uuid,
    pub volume: i64,
    pub price_cents: i64,
}

/// Trait for order event notification
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A new draft order was created
    async fn order_created(&self, event: &OrderEvent);

    /// An order was paid and its leads recorded
    async fn order_paid(&self, event: &OrderEvent);
}

/// Notifier that POSTs events to a webhook URL
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    event: &'a str,
    #[serde(flatten)]
    order: &'a OrderEvent,
}

impl WebhookNotifier {
    /// Create a new webhook notifier
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, url }
    }

    async fn post(&self, event_name: &str, event: &OrderEvent) {
        let payload = WebhookPayload {
            event: event_name,
            order: event,
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(
                    status = response.status().as_u16(),
                    event = event_name,
                    order_id = %event.order_id,
                    "Notifier endpoint returned an error, dropping event"
                );
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    event = event_name,
                    order_id = %event.order_id,
                    "Notifier delivery failed, dropping event"
                );
            }
            Ok(_) => {}
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn order_created(&self, event: &OrderEvent) {
        self.post("order.created", event).await;
    }

    async fn order_paid(&self, event: &OrderEvent) {
        self.post("order.paid", event).await;
    }
}

/// Notifier that discards all events
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn order_created(&self, _event: &OrderEvent) {}

    async fn order_paid(&self, _event: &OrderEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = OrderEvent {
            order_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            collection_id: Uuid::new_v4(),
            volume: 100,
            price_cents: 110_000,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["volume"], 100);
        assert_eq!(json["price_cents"], 110_000);
    }

    #[tokio::test]
    async fn test_noop_notifier() {
        let notifier = NoopNotifier;
        let event = OrderEvent {
            order_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            collection_id: Uuid::new_v4(),
            volume: 1,
            price_cents: 100,
        };

        // Must not panic or block
        notifier.order_created(&event).await;
        notifier.order_paid(&event).await;
    }
}
