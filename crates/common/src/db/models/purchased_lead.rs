//! Purchased lead ledger entity
//!
//! One row per (user, collection, lead key): the durable record preventing
//! re-delivery of the same lead to the same user from the same collection.
//! The lead key is a natural-key hash of the row data, not a storage id, so
//! re-imports of the same table cannot re-sell an already-owned record.
//!
//! The (user_id, collection_id, lead_key) unique constraint is the
//! authoritative concurrency guard; inserts go through the repository's
//! conflict-ignoring statement and never overwrite.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchased_leads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    pub collection_id: Uuid,

    /// Stable natural-key identifier of the delivered row
    #[sea_orm(column_type = "Text")]
    pub lead_key: String,

    /// Order whose payment recorded this purchase
    pub order_id: Uuid,

    pub created_at: DateTimeWithTimeZone,
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
