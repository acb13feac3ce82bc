//! Order handlers
//!
//! Creating an order runs the full build pipeline and commits a draft:
//! an unpaid order plus its ready delivery file. Payment is a separate
//! step, either debiting the wallet balance immediately or creating a card
//! charge whose webhook confirmation finalizes the order.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use leadforge_common::{
    auth::AuthContext,
    db::models::Order,
    errors::{AppError, Result},
    DEFAULT_PAGE_SIZE,
};
use leadforge_fulfillment::{BuildRequest, Selection};

/// Request to build and create an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub collection_id: Uuid,

    #[serde(default)]
    pub selection: Selection,

    /// Requested row count
    pub volume: u64,

    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
}

/// Request to pay an order
#[derive(Debug, Deserialize)]
pub struct PayOrderRequest {
    /// balance | card
    pub method: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub volume: i64,
    pub price_cents: i64,
    pub status: String,
    pub payment_method: Option<String>,
    pub created_at: String,
    pub paid_at: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileResponse>,
}

#[derive(Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub title: String,
    pub file_type: String,
    pub collection_id: Uuid,
    pub unit_price_cents: i64,
    pub volume: i64,
    pub columns: Vec<String>,
    pub status: String,
    pub storage_path: String,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Response when a card charge was created for an order
#[derive(Serialize)]
pub struct PayOrderResponse {
    pub order_id: Uuid,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u64>,
}

fn order_response(order: Order, files: Vec<leadforge_common::db::models::DeliveryFile>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        volume: order.volume,
        price_cents: order.price_cents,
        status: order.status,
        payment_method: order.payment_method,
        created_at: order.created_at.to_rfc3339(),
        paid_at: order.paid_at.map(|dt| dt.to_rfc3339()),
        files: files
            .into_iter()
            .map(|f| FileResponse {
                id: f.id,
                title: f.title.clone(),
                file_type: f.file_type.clone(),
                collection_id: f.collection_id,
                unit_price_cents: f.unit_price_cents,
                volume: f.volume,
                columns: f.included_columns(),
                status: f.status.clone(),
                storage_path: f.storage_path,
            })
            .collect(),
    }
}

/// Build and create a draft order
pub async fn create_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let builder = state.order_builder();
    let outcome = builder
        .build(BuildRequest {
            collection_id: request.collection_id,
            user_id: auth.user_id,
            selection: request.selection,
            volume: request.volume,
            title: request.title,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(order_response(outcome.order, vec![outcome.file])),
    ))
}

/// Get an order by ID
pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>> {
    let repo = state.repository();

    let order = repo
        .find_order_by_id(order_id)
        .await?
        .ok_or_else(|| AppError::OrderNotFound {
            id: order_id.to_string(),
        })?;

    if order.user_id != auth.user_id && !auth.has_scope("admin") {
        return Err(AppError::Forbidden {
            message: "Order belongs to another user".to_string(),
        });
    }

    let files = repo.files_for_order(order_id).await?;

    Ok(Json(order_response(order, files)))
}

/// List the caller's orders
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageParams>,
) -> Result<Json<OrderListResponse>> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let repo = state.repository();

    let (orders, total) = repo.list_orders(auth.user_id, page.offset, limit).await?;

    let orders = orders
        .into_iter()
        .map(|o| order_response(o, Vec::new()))
        .collect();

    Ok(Json(OrderListResponse {
        orders,
        total,
        offset: page.offset,
        limit,
    }))
}

/// Pay an order from balance, or create a card charge for it
pub async fn pay_order(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(order_id): Path<Uuid>,
    Json(request): Json<PayOrderRequest>,
) -> Result<Json<PayOrderResponse>> {
    match request.method.as_str() {
        "balance" => {
            let builder = state.order_builder();
            let order = builder.pay_with_balance(order_id, auth.user_id).await?;

            Ok(Json(PayOrderResponse {
                order_id: order.id,
                status: order.status,
                client_secret: None,
            }))
        }
        "card" => {
            let repo = state.repository();
            let order = repo
                .find_order_by_id(order_id)
                .await?
                .ok_or_else(|| AppError::OrderNotFound {
                    id: order_id.to_string(),
                })?;

            if order.user_id != auth.user_id {
                return Err(AppError::Forbidden {
                    message: "Order belongs to another user".to_string(),
                });
            }

            if order.is_paid() {
                return Err(AppError::Conflict {
                    message: format!("Order {} is already paid", order_id),
                });
            }

            let intent = state
                .payments
                .create_charge(
                    order.price_cents,
                    &state.config.payment.currency,
                    auth.user_id,
                    order_id,
                )
                .await?;

            tracing::info!(
                order_id = %order_id,
                intent_id = %intent.intent_id,
                "Card charge created, awaiting webhook confirmation"
            );

            Ok(Json(PayOrderResponse {
                order_id,
                status: order.status,
                client_secret: Some(intent.client_secret),
            }))
        }
        other => Err(AppError::Validation {
            message: format!("Unknown payment method '{}'", other),
            field: Some("method".to_string()),
        }),
    }
}
