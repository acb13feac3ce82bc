//! Order entity
//!
//! The billing record for a checkout. Status transitions exactly once from
//! Unpaid to Paid, triggered by a cleared card transaction or an approved
//! balance debit; the repository enforces the transition with a conditional
//! update so concurrent finalizations cannot double-apply.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order payment status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Unpaid,
    Paid,
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "paid" => OrderStatus::Paid,
            _ => OrderStatus::Unpaid,
        }
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Unpaid => "unpaid".to_string(),
            OrderStatus::Paid => "paid".to_string(),
        }
    }
}

/// How an order was (or will be) paid
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Balance,
    BankTransfer,
}

impl From<String> for PaymentMethod {
    fn from(s: String) -> Self {
        match s.as_str() {
            "balance" => PaymentMethod::Balance,
            "bank_transfer" => PaymentMethod::BankTransfer,
            _ => PaymentMethod::Card,
        }
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Card => "card".to_string(),
            PaymentMethod::Balance => "balance".to_string(),
            PaymentMethod::BankTransfer => "bank_transfer".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    /// Aggregate delivered volume across the order's files
    pub volume: i64,

    /// Aggregate price in cents
    pub price_cents: i64,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub payment_method: Option<String>,

    /// Receipt attachment paths (bank-transfer uploads)
    #[sea_orm(column_type = "JsonBinary")]
    pub receipts: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub paid_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Get the order status as an enum
    pub fn order_status(&self) -> OrderStatus {
        OrderStatus::from(self.status.clone())
    }

    /// Check whether the order has been paid
    pub fn is_paid(&self) -> bool {
        self.order_status() == OrderStatus::Paid
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery_file::Entity")]
    DeliveryFiles,

    #[sea_orm(has_many = "super::purchased_lead::Entity")]
    PurchasedLeads,
}

impl Related<super::delivery_file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryFiles.def()
    }
}

impl Related<super::purchased_lead::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchasedLeads.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
