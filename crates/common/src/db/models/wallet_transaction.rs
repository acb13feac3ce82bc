//! Wallet transaction entity
//!
//! A ledger entry for money movement. Amounts are signed cents: top-ups are
//! positive, order and lookup debits negative. Waiting transactions
//! (bank-transfer top-ups) require admin approval before they affect the
//! balance; the balance is the sum of completed amounts.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of money movement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Topup,
    Order,
    Lookup,
}

impl From<String> for TransactionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "topup" => TransactionKind::Topup,
            "lookup" => TransactionKind::Lookup,
            _ => TransactionKind::Order,
        }
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        match kind {
            TransactionKind::Topup => "topup".to_string(),
            TransactionKind::Order => "order".to_string(),
            TransactionKind::Lookup => "lookup".to_string(),
        }
    }
}

/// Transaction status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Completed,
    Waiting,
    Free,
}

impl From<String> for TransactionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "completed" => TransactionStatus::Completed,
            "free" => TransactionStatus::Free,
            _ => TransactionStatus::Waiting,
        }
    }
}

impl From<TransactionStatus> for String {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Completed => "completed".to_string(),
            TransactionStatus::Waiting => "waiting".to_string(),
            TransactionStatus::Free => "free".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub kind: String,

    /// Signed amount in cents
    pub amount_cents: i64,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub order_id: Option<Uuid>,

    /// External payment reference (e.g. a payment intent id)
    #[sea_orm(column_type = "Text", nullable)]
    pub reference: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    pub completed_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Get the kind as an enum
    pub fn transaction_kind(&self) -> TransactionKind {
        TransactionKind::from(self.kind.clone())
    }

    /// Get the status as an enum
    pub fn transaction_status(&self) -> TransactionStatus {
        TransactionStatus::from(self.status.clone())
    }

    /// Whether this transaction counts toward the balance
    pub fn affects_balance(&self) -> bool {
        self.transaction_status() == TransactionStatus::Completed
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
