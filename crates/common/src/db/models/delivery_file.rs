//! Delivery file entity
//!
//! One per delivered data artifact. Status moves Waiting -> Ready when the
//! extract has been written; it never transitions backward. The delivered
//! lead keys are persisted here so payment finalization can record ledger
//! entries without re-running the build.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// File readiness status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Waiting,
    Ready,
}

impl From<String> for FileStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "ready" => FileStatus::Ready,
            _ => FileStatus::Waiting,
        }
    }
}

impl From<FileStatus> for String {
    fn from(status: FileStatus) -> Self {
        match status {
            FileStatus::Waiting => "waiting".to_string(),
            FileStatus::Ready => "ready".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub file_type: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub countries: serde_json::Value,

    pub collection_id: Uuid,

    /// Per-row price in cents at the time of purchase
    pub unit_price_cents: i64,

    /// Delivered row count
    pub volume: i64,

    /// Resolved column names actually included in the extract
    #[sea_orm(column_type = "JsonBinary")]
    pub columns: serde_json::Value,

    /// Lead keys of the delivered rows
    #[sea_orm(column_type = "JsonBinary")]
    pub lead_keys: serde_json::Value,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Text")]
    pub storage_path: String,

    pub order_id: Uuid,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the file status as an enum
    pub fn file_status(&self) -> FileStatus {
        FileStatus::from(self.status.clone())
    }

    /// Decode the delivered lead keys
    pub fn delivered_lead_keys(&self) -> Vec<String> {
        serde_json::from_value(self.lead_keys.clone()).unwrap_or_default()
    }

    /// Decode the included column names
    pub fn included_columns(&self) -> Vec<String> {
        serde_json::from_value(self.columns.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::collection::Entity",
        from = "Column::CollectionId",
        to = "super::collection::Column::Id"
    )]
    Collection,

    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::collection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collection.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
