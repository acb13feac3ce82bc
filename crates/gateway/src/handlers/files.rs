//! Delivery file handlers
//!
//! Metadata and download for delivered artifacts. The extract bytes are
//! served only once the owning order is paid; before that the file exists
//! as a draft attached to its unpaid order.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use leadforge_common::{
    auth::AuthContext,
    db::models::{DeliveryFile, FileStatus},
    errors::{AppError, Result},
};

#[derive(Serialize)]
pub struct DeliveryFileResponse {
    pub id: Uuid,
    pub title: String,
    pub file_type: String,
    pub collection_id: Uuid,
    pub order_id: Uuid,
    pub unit_price_cents: i64,
    pub volume: i64,
    pub columns: Vec<String>,
    pub status: String,
    pub created_at: String,
}

fn file_response(file: DeliveryFile) -> DeliveryFileResponse {
    DeliveryFileResponse {
        id: file.id,
        title: file.title.clone(),
        file_type: file.file_type.clone(),
        collection_id: file.collection_id,
        order_id: file.order_id,
        unit_price_cents: file.unit_price_cents,
        volume: file.volume,
        columns: file.included_columns(),
        status: file.status.clone(),
        created_at: file.created_at.to_rfc3339(),
    }
}

async fn load_owned_file(
    state: &AppState,
    auth: &AuthContext,
    file_id: Uuid,
) -> Result<DeliveryFile> {
    let repo = state.repository();

    let file = repo
        .find_file_by_id(file_id)
        .await?
        .ok_or_else(|| AppError::FileNotFound {
            id: file_id.to_string(),
        })?;

    if file.user_id != auth.user_id && !auth.has_scope("admin") {
        return Err(AppError::Forbidden {
            message: "File belongs to another user".to_string(),
        });
    }

    Ok(file)
}

/// Get a delivery file's metadata
pub async fn get_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(file_id): Path<Uuid>,
) -> Result<Json<DeliveryFileResponse>> {
    let file = load_owned_file(&state, &auth, file_id).await?;
    Ok(Json(file_response(file)))
}

/// Download a delivery file's extract
pub async fn download_file(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let file = load_owned_file(&state, &auth, file_id).await?;

    let repo = state.repository();
    let order = repo
        .find_order_by_id(file.order_id)
        .await?
        .ok_or_else(|| AppError::OrderNotFound {
            id: file.order_id.to_string(),
        })?;

    if !order.is_paid() {
        return Err(AppError::PaymentFailed {
            message: "Order must be paid before download".to_string(),
        });
    }

    if file.file_status() != FileStatus::Ready {
        return Err(AppError::Conflict {
            message: format!("File {} is still being generated", file_id),
        });
    }

    let bytes = tokio::fs::read(&file.storage_path)
        .await
        .map_err(|e| AppError::Storage {
            message: format!("Failed to read extract: {}", e),
        })?;

    let disposition = format!("attachment; filename=\"{}.csv\"", file.id);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
