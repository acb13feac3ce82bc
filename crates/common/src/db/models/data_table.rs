//! Data table entity
//!
//! A raw uploaded dataset: an ordered column list, a stored lead count, and
//! the delimiter of its source file. Row data lives in `table_rows`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "data_tables")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Uploading user
    pub owner_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Ordered column names, as parsed from the upload header
    #[sea_orm(column_type = "JsonBinary")]
    pub columns: serde_json::Value,

    /// Stored row count; immutable except via re-import
    pub leads: i64,

    #[sea_orm(column_type = "JsonBinary")]
    pub tags: serde_json::Value,

    #[sea_orm(column_type = "Text", nullable)]
    pub source_file: Option<String>,

    /// Field delimiter of the source file: comma, tab, semicolon or pipe
    #[sea_orm(column_type = "Text")]
    pub delimiter: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Decode the ordered column name list
    pub fn column_names(&self) -> Vec<String> {
        serde_json::from_value(self.columns.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::table_row::Entity")]
    Rows,
}

impl Related<super::table_row::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rows.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
