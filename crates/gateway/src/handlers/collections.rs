//! Collection catalog handlers

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
    errors::{AppError, Result},
    DEFAULT_PAGE_SIZE, MAX_ORDER_VOLUME,
};
use leadforge_fulfillment::{catalog, pricing, selection, ColumnDef, Selection};

/// Request to create a new collection
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCollectionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 10000))]
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub countries: Vec<String>,

    pub product_type: String,

    /// Base per-row fee in cents
    pub fee_cents: i64,

    /// Per-row discount in cents
    #[serde(default)]
    pub discount_cents: i64,

    pub columns: Vec<ColumnDef>,

    /// Field names forming the stable lead identifier
    pub natural_key: Vec<String>,
}

/// Response for a collection
#[derive(Serialize)]
pub struct CollectionResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub countries: serde_json::Value,
    pub product_type: String,
    pub fee_cents: i64,
    pub discount_cents: i64,
    pub status: String,
    pub featured: bool,
    pub columns: Vec<ColumnView>,
    pub created_at: String,
}

/// Client-facing view of a column: source mappings stay internal
#[derive(Serialize)]
pub struct ColumnView {
    pub id: u32,
    pub name: String,
    pub data_type: leadforge_fulfillment::DataType,
    pub required: bool,
    pub extra_fee_cents: Option<i64>,
    pub step: String,
}

#[derive(Serialize)]
pub struct CollectionListResponse {
    pub collections: Vec<CollectionResponse>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Serialize)]
pub struct LeadCountResponse {
    pub collection_id: Uuid,
    pub total_leads: u64,
}

/// Request for a price preview
#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    #[serde(default)]
    pub selection: Selection,
    pub volume: u64,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    pub collection_id: Uuid,
    pub unit_price_cents: i64,
    pub volume: u64,
    pub total_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u64>,
}

fn collection_response(collection: leadforge_common::db::models::Collection) -> Result<CollectionResponse> {
    let columns = catalog::decode_columns(&collection.columns)?;

    Ok(CollectionResponse {
        id: collection.id,
        title: collection.title,
        description: collection.description,
        countries: collection.countries,
        product_type: collection.product_type,
        fee_cents: collection.fee_cents,
        discount_cents: collection.discount_cents,
        status: collection.status,
        featured: collection.featured,
        columns: columns
            .into_iter()
            .filter(|c| c.visible)
            .map(|c| ColumnView {
                id: c.id,
                name: c.name,
                data_type: c.data_type,
                required: c.required,
                extra_fee_cents: c.extra_fee_cents,
                step: c.step,
            })
            .collect(),
        created_at: collection.created_at.to_rfc3339(),
    })
}

/// List active collections
pub async fn list_collections(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(page): Query<PageParams>,
) -> Result<Json<CollectionListResponse>> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let repo = state.repository();

    let (collections, total) = repo.list_collections(page.offset, limit).await?;

    let collections = collections
        .into_iter()
        .map(collection_response)
        .collect::<Result<Vec<_>>>()?;

    Ok(Json(CollectionListResponse {
        collections,
        total,
        offset: page.offset,
        limit,
    }))
}

/// Get a collection by ID
pub async fn get_collection(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<CollectionResponse>> {
    let repo = state.repository();

    let collection = repo
        .find_collection_by_id(collection_id)
        .await?
        .ok_or_else(|| AppError::CollectionNotFound {
            id: collection_id.to_string(),
        })?;

    Ok(Json(collection_response(collection)?))
}

/// Create a new collection (admin)
///
/// Column definitions are validated here, at creation time: merged sources
/// without a natural key are a configuration the order builder refuses to
/// discover mid-build, so they are rejected up front.
pub async fn create_collection(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<CollectionResponse>)> {
    auth.require_admin()?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    if request.fee_cents < 0 || request.discount_cents < 0 {
        return Err(AppError::Validation {
            message: "Fees must not be negative".to_string(),
            field: Some("fee_cents".to_string()),
        });
    }

    // Lead identity is derived from the natural key; without one, nothing
    // from this collection could ever be delivered or deduplicated
    if request.natural_key.is_empty() || request.natural_key.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::Validation {
            message: "Collection must declare non-empty natural key fields".to_string(),
            field: Some("natural_key".to_string()),
        });
    }

    catalog::validate_columns(&request.columns, &request.natural_key)?;

    let repo = state.repository();
    let collection = repo
        .create_collection(
            request.title,
            request.description,
            serde_json::json!(request.countries),
            request.product_type.into(),
            request.fee_cents,
            request.discount_cents,
            serde_json::to_value(&request.columns)?,
            serde_json::json!(request.natural_key),
        )
        .await?;

    tracing::info!(
        collection_id = %collection.id,
        admin = %auth.user_id,
        "Collection created"
    );

    Ok((StatusCode::CREATED, Json(collection_response(collection)?)))
}

/// Total available leads for a collection
pub async fn collection_leads(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(collection_id): Path<Uuid>,
) -> Result<Json<LeadCountResponse>> {
    let total_leads = state.aggregator().total_leads(collection_id).await?;

    Ok(Json(LeadCountResponse {
        collection_id,
        total_leads,
    }))
}

/// Price preview for a selection and requested volume
///
/// No rows are scanned and nothing is persisted; the final bill is always
/// recomputed on the delivered volume at build time.
pub async fn quote_collection(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(collection_id): Path<Uuid>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>> {
    if request.volume == 0 || request.volume > MAX_ORDER_VOLUME {
        return Err(AppError::InvalidSelection {
            message: format!("Volume must be between 1 and {}", MAX_ORDER_VOLUME),
        });
    }

    let repo = state.repository();
    let collection = repo
        .find_collection_by_id(collection_id)
        .await?
        .ok_or_else(|| AppError::CollectionNotFound {
            id: collection_id.to_string(),
        })?;

    let columns = catalog::decode_columns(&collection.columns)?;
    let selected = selection::validate_selection(&columns, &request.selection)?;

    let quote = pricing::quote(
        collection.fee_cents,
        collection.discount_cents,
        &selected,
        request.volume,
    );

    Ok(Json(QuoteResponse {
        collection_id,
        unit_price_cents: quote.unit_price_cents,
        volume: quote.volume,
        total_cents: quote.total_cents,
    }))
}
