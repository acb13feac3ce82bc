//! Table row entity
//!
//! One raw data row of an uploaded dataset. Fields are stored as a JSONB
//! map keyed by the table's column names; rows are replaced wholesale on
//! re-import.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "table_rows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub table_id: Uuid,

    /// Position within the source file, for stable ordering
    pub row_index: i64,

    /// Column name -> value
    #[sea_orm(column_type = "JsonBinary")]
    pub fields: serde_json::Value,
}

impl Model {
    /// Decode the field map
    pub fn field_map(&self) -> HashMap<String, String> {
        serde_json::from_value(self.fields.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::data_table::Entity",
        from = "Column::TableId",
        to = "super::data_table::Column::Id"
    )]
    DataTable,
}

impl Related<super::data_table::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DataTable.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
