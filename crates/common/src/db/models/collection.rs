//! Collection entity
//!
//! A catalog product bundling selectable columns of lead data. The column
//! definitions (including their source-table mappings) are embedded as JSONB
//! and decoded into domain types by the fulfillment layer.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Collection lifecycle status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Active,
    Inactive,
}

impl From<String> for CollectionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "active" => CollectionStatus::Active,
            _ => CollectionStatus::Inactive,
        }
    }
}

impl From<CollectionStatus> for String {
    fn from(status: CollectionStatus) -> Self {
        match status {
            CollectionStatus::Active => "active".to_string(),
            CollectionStatus::Inactive => "inactive".to_string(),
        }
    }
}

/// Product type of a collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Business,
    Consumer,
}

impl From<String> for ProductType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "consumer" => ProductType::Consumer,
            _ => ProductType::Business,
        }
    }
}

impl From<ProductType> for String {
    fn from(kind: ProductType) -> Self {
        match kind {
            ProductType::Business => "business".to_string(),
            ProductType::Consumer => "consumer".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collections")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Image paths shown on the catalog page
    #[sea_orm(column_type = "JsonBinary")]
    pub images: serde_json::Value,

    /// Country codes this collection applies to
    #[sea_orm(column_type = "JsonBinary")]
    pub countries: serde_json::Value,

    #[sea_orm(column_type = "Text")]
    pub product_type: String,

    /// Base per-row fee in cents
    pub fee_cents: i64,

    /// Per-row discount in cents, subtracted from the base fee
    pub discount_cents: i64,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub featured: bool,

    /// Embedded column definitions (`Vec<ColumnDef>` in the fulfillment layer)
    #[sea_orm(column_type = "JsonBinary")]
    pub columns: serde_json::Value,

    /// Field names whose values form the stable lead identifier
    #[sea_orm(column_type = "JsonBinary")]
    pub natural_key: serde_json::Value,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the collection status as an enum
    pub fn collection_status(&self) -> CollectionStatus {
        CollectionStatus::from(self.status.clone())
    }

    /// Check whether the collection is purchasable
    pub fn is_active(&self) -> bool {
        self.collection_status() == CollectionStatus::Active
    }

    /// Effective per-row fee after discount, floored at zero
    pub fn effective_fee_cents(&self) -> i64 {
        (self.fee_cents - self.discount_cents).max(0)
    }

    /// Decode the natural key field list
    pub fn natural_key_fields(&self) -> Vec<String> {
        serde_json::from_value(self.natural_key.clone()).unwrap_or_default()
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
