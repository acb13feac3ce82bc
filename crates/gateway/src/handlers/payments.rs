//! Payment provider webhook handler
//!
//! The webhook is the authoritative success signal for card charges: a
//! succeeded intent finalizes its order (ledger entries, unpaid -> paid
//! flip). Finalization is idempotent, so provider retries are harmless.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;
use leadforge_common::{
    db::models::PaymentMethod,
    errors::{AppError, Result},
    payment::webhook::WebhookEvent,
};

#[derive(Serialize)]
pub struct WebhookResponse {
    pub received: bool,
}

/// Handle a payment provider event
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> Result<(StatusCode, Json<WebhookResponse>)> {
    // Shared-secret check when configured; requests without it are rejected
    if let Some(ref secret) = state.config.payment.stripe_webhook_secret {
        let provided = headers
            .get("x-webhook-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if provided != secret {
            return Err(AppError::Unauthorized {
                message: "Invalid webhook secret".to_string(),
            });
        }
    }

    let intent_id = event.data.object.id.clone();

    if !event.is_success() {
        tracing::info!(
            event_type = %event.event_type,
            intent_id = %intent_id,
            "Ignoring non-success payment event; draft order remains payable"
        );
        return Ok((StatusCode::OK, Json(WebhookResponse { received: true })));
    }

    let Some(order_id) = event.order_id() else {
        tracing::warn!(
            intent_id = %intent_id,
            "Succeeded intent carries no order id, nothing to finalize"
        );
        return Ok((StatusCode::OK, Json(WebhookResponse { received: true })));
    };

    let builder = state.order_builder();
    builder
        .finalize_paid(order_id, PaymentMethod::Card, Some(intent_id))
        .await?;

    Ok((StatusCode::OK, Json(WebhookResponse { received: true })))
}
