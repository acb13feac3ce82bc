//! Data table handlers
//!
//! Dataset import and table store management. Import and delete are admin
//! operations; deleting a table degrades the collections referencing it to
//! zero availability on that mapping rather than breaking them.

use axum::{
    extract::{Path, State},
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
};
use leadforge_fulfillment::Delimiter;
use leadforge_ingestion::DatasetImporter;

/// Request to import a dataset
#[derive(Debug, Deserialize, Validate)]
pub struct ImportTableRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    /// comma | tab | semicolon | pipe
    pub delimiter: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub source_file: Option<String>,

    /// Raw delimited content; the first record is the header
    #[validate(length(min = 1))]
    pub content: String,
}

/// Request to re-import a table's rows
#[derive(Debug, Deserialize, Validate)]
pub struct ReimportTableRequest {
    #[validate(length(min = 1))]
    pub content: String,
}

/// Response for a data table
#[derive(Serialize)]
pub struct TableResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub columns: Vec<String>,
    pub leads: i64,
    pub tags: serde_json::Value,
    pub source_file: Option<String>,
    pub delimiter: String,
    pub created_at: String,
}

fn table_response(table: leadforge_common::db::models::DataTable) -> TableResponse {
    TableResponse {
        id: table.id,
        owner_id: table.owner_id,
        name: table.name.clone(),
        columns: table.column_names(),
        leads: table.leads,
        tags: table.tags,
        source_file: table.source_file,
        delimiter: table.delimiter,
        created_at: table.created_at.to_rfc3339(),
    }
}

/// Import a dataset and create its table (admin)
pub async fn import_table(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<ImportTableRequest>,
) -> Result<(StatusCode, Json<TableResponse>)> {
    auth.require_admin()?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let delimiter = Delimiter::parse(&request.delimiter)?;
    let importer = DatasetImporter::new(state.repository());

    let table = importer
        .import(
            auth.user_id,
            request.name,
            delimiter,
            request.tags,
            request.source_file,
            &request.content,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(table_response(table))))
}

/// Get a table by ID
pub async fn get_table(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(table_id): Path<Uuid>,
) -> Result<Json<TableResponse>> {
    let repo = state.repository();

    let table = repo
        .find_table_by_id(table_id)
        .await?
        .ok_or_else(|| AppError::TableNotFound {
            id: table_id.to_string(),
        })?;

    Ok(Json(table_response(table)))
}

/// Replace a table's rows from fresh content (admin)
pub async fn reimport_table(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(table_id): Path<Uuid>,
    Json(request): Json<ReimportTableRequest>,
) -> Result<Json<TableResponse>> {
    auth.require_admin()?;

    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let importer = DatasetImporter::new(state.repository());
    let table = importer.reimport(table_id, &request.content).await?;

    Ok(Json(table_response(table)))
}

/// Delete a table and its rows (admin)
///
/// Collections referencing the table keep their column mappings; lead
/// aggregation and order builds treat the dangling references as zero
/// availability.
pub async fn delete_table(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(table_id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require_admin()?;

    let repo = state.repository();
    let deleted = repo.delete_table(table_id).await?;

    if !deleted {
        return Err(AppError::TableNotFound {
            id: table_id.to_string(),
        });
    }

    tracing::info!(table_id = %table_id, admin = %auth.user_id, "Table deleted");

    Ok(StatusCode::NO_CONTENT)
}
