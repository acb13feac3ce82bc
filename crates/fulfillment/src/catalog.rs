//! Catalog column definitions
//!
//! Domain types decoded from a collection's embedded column JSON. A column's
//! source is a tagged variant: either a single (table, column) reference or
//! a merged set of references aligned by the collection's natural key. The
//! variant shape makes the row-alignment rule a property of the type — a
//! merged source cannot be configured without a natural key, enforced when
//! the collection is created rather than discovered during a build.

use leadforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Data type of a logical column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Number,
    Date,
}

impl DataType {
    /// Whether range filters are legal on this type
    pub fn supports_range(&self) -> bool {
        matches!(self, DataType::Number | DataType::Date)
    }
}

/// Reference to an underlying column of a data table
///
/// A weak reference: the table may be deleted independently, in which case
/// resolution treats the mapping as "leads unavailable".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnRef {
    pub table_id: Uuid,
    pub column: String,
}

/// Where a logical column's values come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSource {
    /// Sourced from exactly one table
    Single(TableColumnRef),

    /// Sourced from several tables, row-aligned by the collection's
    /// natural key
    Merged { refs: Vec<TableColumnRef> },
}

impl ColumnSource {
    /// All table references of this source
    pub fn refs(&self) -> &[TableColumnRef] {
        match self {
            ColumnSource::Single(r) => std::slice::from_ref(r),
            ColumnSource::Merged { refs } => refs,
        }
    }

    /// The underlying column name within a given table, if referenced
    pub fn column_in_table(&self, table_id: Uuid) -> Option<&str> {
        self.refs()
            .iter()
            .find(|r| r.table_id == table_id)
            .map(|r| r.column.as_str())
    }
}

/// A logical column of a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Numeric id, unique within the collection
    pub id: u32,

    /// Display name; also the header of the delivered extract
    pub name: String,

    pub data_type: DataType,

    /// Shown to clients in the order builder
    #[serde(default = "default_visible")]
    pub visible: bool,

    /// Must be part of every order from this collection
    #[serde(default)]
    pub required: bool,

    /// Additional per-row fee in cents, when this column is selected
    #[serde(default)]
    pub extra_fee_cents: Option<i64>,

    /// Order-builder workflow step this column belongs to
    #[serde(default)]
    pub step: String,

    pub source: ColumnSource,
}

fn default_visible() -> bool {
    true
}

impl ColumnDef {
    /// The additional fee charged per delivered row, zero when none
    pub fn extra_fee(&self) -> i64 {
        self.extra_fee_cents.unwrap_or(0)
    }
}

/// Decode a collection's embedded column JSON
///
/// Malformed column data is a catalog integrity problem, reported as a
/// Configuration error rather than a user input error.
pub fn decode_columns(value: &serde_json::Value) -> Result<Vec<ColumnDef>> {
    serde_json::from_value(value.clone()).map_err(|e| AppError::Configuration {
        message: format!("Malformed collection columns: {}", e),
    })
}

/// Validate column definitions at collection creation time
pub fn validate_columns(columns: &[ColumnDef], natural_key: &[String]) -> Result<()> {
    let mut seen_ids = HashSet::new();

    for column in columns {
        if !seen_ids.insert(column.id) {
            return Err(AppError::Validation {
                message: format!("Duplicate column id {}", column.id),
                field: Some("columns".to_string()),
            });
        }

        if column.name.trim().is_empty() {
            return Err(AppError::Validation {
                message: format!("Column {} has an empty name", column.id),
                field: Some("columns".to_string()),
            });
        }

        if column.extra_fee().is_negative() {
            return Err(AppError::Validation {
                message: format!("Column {} has a negative additional fee", column.id),
                field: Some("columns".to_string()),
            });
        }

        match &column.source {
            ColumnSource::Single(_) => {}
            ColumnSource::Merged { refs } => {
                if refs.len() < 2 {
                    return Err(AppError::Validation {
                        message: format!(
                            "Column {} declares a merged source with fewer than two tables",
                            column.id
                        ),
                        field: Some("columns".to_string()),
                    });
                }
                if natural_key.is_empty() {
                    return Err(AppError::Validation {
                        message: format!(
                            "Column {} merges multiple tables but the collection has no natural key to align rows",
                            column.id
                        ),
                        field: Some("natural_key".to_string()),
                    });
                }
            }
        }
    }

    Ok(())
}

/// Distinct table ids referenced across a set of columns
///
/// A table feeding two different columns appears once; iteration order is
/// first-reference order so callers behave deterministically.
pub fn distinct_table_ids(columns: &[ColumnDef]) -> Vec<Uuid> {
    distinct_ids(columns.iter())
}

/// Distinct table ids over a borrowed column subset (a build's selection)
pub fn distinct_table_ids_of(columns: &[&ColumnDef]) -> Vec<Uuid> {
    distinct_ids(columns.iter().copied())
}

fn distinct_ids<'a>(columns: impl Iterator<Item = &'a ColumnDef>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    for column in columns {
        for r in column.source.refs() {
            if seen.insert(r.table_id) {
                ids.push(r.table_id);
            }
        }
    }

    ids
}

/// Field delimiter of an uploaded dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    Comma,
    Tab,
    Semicolon,
    Pipe,
}

impl Delimiter {
    /// The delimiter byte for csv readers/writers
    pub fn as_byte(&self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
            Delimiter::Semicolon => b';',
            Delimiter::Pipe => b'|',
        }
    }

    /// Parse the stored text form
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "comma" => Ok(Delimiter::Comma),
            "tab" => Ok(Delimiter::Tab),
            "semicolon" => Ok(Delimiter::Semicolon),
            "pipe" => Ok(Delimiter::Pipe),
            other => Err(AppError::InvalidFormat {
                message: format!("Unknown delimiter '{}'", other),
            }),
        }
    }

    /// The stored text form
    pub fn as_str(&self) -> &'static str {
        match self {
            Delimiter::Comma => "comma",
            Delimiter::Tab => "tab",
            Delimiter::Semicolon => "semicolon",
            Delimiter::Pipe => "pipe",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_column(id: u32, table_id: Uuid) -> ColumnDef {
        ColumnDef {
            id,
            name: format!("col_{}", id),
            data_type: DataType::Text,
            visible: true,
            required: false,
            extra_fee_cents: None,
            step: String::new(),
            source: ColumnSource::Single(TableColumnRef {
                table_id,
                column: format!("raw_{}", id),
            }),
        }
    }

    #[test]
    fn test_distinct_table_ids_counts_shared_table_once() {
        let shared = Uuid::new_v4();
        let other = Uuid::new_v4();

        let columns = vec![
            single_column(1, shared),
            single_column(2, shared),
            single_column(3, other),
        ];

        let ids = distinct_table_ids(&columns);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], shared);
        assert_eq!(ids[1], other);
    }

    #[test]
    fn test_distinct_table_ids_spans_merged_sources() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let merged = ColumnDef {
            id: 1,
            name: "email".to_string(),
            data_type: DataType::Text,
            visible: true,
            required: true,
            extra_fee_cents: None,
            step: String::new(),
            source: ColumnSource::Merged {
                refs: vec![
                    TableColumnRef { table_id: a, column: "email".to_string() },
                    TableColumnRef { table_id: b, column: "mail".to_string() },
                ],
            },
        };

        let ids = distinct_table_ids(&[merged, single_column(2, a)]);
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_empty_columns_have_no_tables() {
        assert!(distinct_table_ids(&[]).is_empty());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let t = Uuid::new_v4();
        let columns = vec![single_column(1, t), single_column(1, t)];

        let err = validate_columns(&columns, &[]).unwrap_err();
        assert!(err.to_string().contains("Duplicate column id"));
    }

    #[test]
    fn test_validate_rejects_merged_without_natural_key() {
        let merged = ColumnDef {
            id: 1,
            name: "phone".to_string(),
            data_type: DataType::Text,
            visible: true,
            required: false,
            extra_fee_cents: None,
            step: String::new(),
            source: ColumnSource::Merged {
                refs: vec![
                    TableColumnRef { table_id: Uuid::new_v4(), column: "phone".to_string() },
                    TableColumnRef { table_id: Uuid::new_v4(), column: "phone".to_string() },
                ],
            },
        };

        assert!(validate_columns(std::slice::from_ref(&merged), &[]).is_err());
        assert!(validate_columns(&[merged], &["email".to_string()]).is_ok());
    }

    #[test]
    fn test_validate_rejects_single_ref_merged_source() {
        let merged = ColumnDef {
            id: 1,
            name: "phone".to_string(),
            data_type: DataType::Text,
            visible: true,
            required: false,
            extra_fee_cents: None,
            step: String::new(),
            source: ColumnSource::Merged {
                refs: vec![TableColumnRef {
                    table_id: Uuid::new_v4(),
                    column: "phone".to_string(),
                }],
            },
        };

        assert!(validate_columns(&[merged], &["email".to_string()]).is_err());
    }

    #[test]
    fn test_column_source_serde_roundtrip() {
        let source = ColumnSource::Merged {
            refs: vec![
                TableColumnRef { table_id: Uuid::new_v4(), column: "a".to_string() },
                TableColumnRef { table_id: Uuid::new_v4(), column: "b".to_string() },
            ],
        };

        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["kind"], "merged");

        let parsed: ColumnSource = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, source);
    }

    #[test]
    fn test_decode_columns_reports_configuration_error() {
        let malformed = serde_json::json!([{"id": "not-a-number"}]);
        let err = decode_columns(&malformed).unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_delimiter_parse() {
        assert_eq!(Delimiter::parse("comma").unwrap().as_byte(), b',');
        assert_eq!(Delimiter::parse("pipe").unwrap().as_byte(), b'|');
        assert!(Delimiter::parse("colon").is_err());
    }
}
