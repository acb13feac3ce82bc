//! Wallet handlers
//!
//! Balance reads, transaction history and top-ups. Bank-transfer top-ups
//! are created in waiting state and affect the balance only once an admin
//! approves them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use leadforge_common::{
    auth::AuthContext,
    db::models::{TransactionKind, TransactionStatus, WalletTransaction},
    errors::{AppError, Result},
    DEFAULT_PAGE_SIZE,
};

/// Request to create a top-up
#[derive(Debug, Deserialize)]
pub struct CreateTopupRequest {
    /// Amount in cents; must be positive
    pub amount_cents: i64,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance_cents: i64,
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub kind: String,
    pub amount_cents: i64,
    pub status: String,
    pub order_id: Option<Uuid>,
    pub reference: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Serialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionResponse>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: u64,
    pub limit: Option<u64>,
}

fn transaction_response(txn: WalletTransaction) -> TransactionResponse {
    TransactionResponse {
        id: txn.id,
        kind: txn.kind,
        amount_cents: txn.amount_cents,
        status: txn.status,
        order_id: txn.order_id,
        reference: txn.reference,
        created_at: txn.created_at.to_rfc3339(),
        completed_at: txn.completed_at.map(|dt| dt.to_rfc3339()),
    }
}

/// Current balance of the caller
pub async fn get_balance(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<BalanceResponse>> {
    let repo = state.repository();
    let balance_cents = repo.balance(auth.user_id).await?;

    Ok(Json(BalanceResponse {
        user_id: auth.user_id,
        balance_cents,
    }))
}

/// List the caller's wallet transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<PageParams>,
) -> Result<Json<TransactionListResponse>> {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, 100);
    let repo = state.repository();

    let (transactions, total) = repo
        .list_transactions(auth.user_id, page.offset, limit)
        .await?;

    Ok(Json(TransactionListResponse {
        transactions: transactions.into_iter().map(transaction_response).collect(),
        total,
        offset: page.offset,
        limit,
    }))
}

/// Create a bank-transfer top-up awaiting admin approval
pub async fn create_topup(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateTopupRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>)> {
    if request.amount_cents <= 0 {
        return Err(AppError::Validation {
            message: "Top-up amount must be positive".to_string(),
            field: Some("amount_cents".to_string()),
        });
    }

    let repo = state.repository();
    let txn = repo
        .create_transaction(
            auth.user_id,
            TransactionKind::Topup,
            request.amount_cents,
            TransactionStatus::Waiting,
            None,
            None,
        )
        .await?;

    tracing::info!(
        transaction_id = %txn.id,
        user_id = %auth.user_id,
        amount_cents = request.amount_cents,
        "Top-up created, awaiting approval"
    );

    Ok((StatusCode::CREATED, Json(transaction_response(txn))))
}

/// Approve a waiting top-up (admin)
pub async fn approve_topup(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<TransactionResponse>> {
    auth.require_admin()?;

    let repo = state.repository();

    let txn = repo
        .find_transaction_by_id(transaction_id)
        .await?
        .ok_or_else(|| AppError::TransactionNotFound {
            id: transaction_id.to_string(),
        })?;

    let approved = repo.approve_topup(transaction_id).await?;
    if !approved {
        return Err(AppError::Conflict {
            message: format!(
                "Transaction {} is not a waiting top-up (kind {}, status {})",
                transaction_id, txn.kind, txn.status
            ),
        });
    }

    tracing::info!(
        transaction_id = %transaction_id,
        admin = %auth.user_id,
        "Top-up approved"
    );

    let txn = repo
        .find_transaction_by_id(transaction_id)
        .await?
        .ok_or_else(|| AppError::TransactionNotFound {
            id: transaction_id.to_string(),
        })?;

    Ok(Json(transaction_response(txn)))
}
