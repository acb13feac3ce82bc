//! Order selection filters
//!
//! A selection maps column ids to either a discrete value set or an
//! inclusive range. Ranges are legal only on number and date columns;
//! everything else about a malformed selection surfaces as InvalidSelection
//! before any rows are scanned.

use crate::catalog::{ColumnDef, DataType};
use chrono::NaiveDate;
use leadforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Filter over one logical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnFilter {
    /// Row value must be one of the accepted values
    Values { values: HashSet<String> },

    /// Row value must fall within the inclusive range; bounds are parsed
    /// according to the column's data type
    Range {
        min: Option<String>,
        max: Option<String>,
    },
}

/// A full selection: column id -> filter
pub type Selection = HashMap<u32, ColumnFilter>;

/// Validate a selection against a collection's columns
///
/// Returns the columns to include in the build: every filtered column plus
/// every required column, in catalog order.
pub fn validate_selection<'a>(
    columns: &'a [ColumnDef],
    selection: &Selection,
) -> Result<Vec<&'a ColumnDef>> {
    let by_id: HashMap<u32, &ColumnDef> = columns.iter().map(|c| (c.id, c)).collect();

    for (column_id, filter) in selection {
        let column = by_id.get(column_id).ok_or_else(|| AppError::InvalidSelection {
            message: format!("Unknown column id {}", column_id),
        })?;

        match filter {
            ColumnFilter::Values { values } => {
                if values.is_empty() {
                    return Err(AppError::InvalidSelection {
                        message: format!("Empty value set for column {}", column_id),
                    });
                }
            }
            ColumnFilter::Range { min, max } => {
                if !column.data_type.supports_range() {
                    return Err(AppError::InvalidSelection {
                        message: format!(
                            "Range filter on column {} which is not numeric or date-like",
                            column_id
                        ),
                    });
                }
                if min.is_none() && max.is_none() {
                    return Err(AppError::InvalidSelection {
                        message: format!("Range filter on column {} has no bounds", column_id),
                    });
                }
                for bound in [min, max].into_iter().flatten() {
                    if parse_typed(column.data_type, bound).is_none() {
                        return Err(AppError::InvalidSelection {
                            message: format!(
                                "Range bound '{}' is not a valid {:?} for column {}",
                                bound, column.data_type, column_id
                            ),
                        });
                    }
                }
            }
        }
    }

    // Filtered columns plus required columns, deduped, in catalog order
    let included: Vec<&ColumnDef> = columns
        .iter()
        .filter(|c| c.required || selection.contains_key(&c.id))
        .collect();

    Ok(included)
}

/// Test a row value against a filter
///
/// Values missing from the row, and values that fail to parse as the
/// column's type, never match a filter.
pub fn matches(filter: &ColumnFilter, data_type: DataType, value: Option<&str>) -> bool {
    let Some(value) = value else {
        return false;
    };

    match filter {
        ColumnFilter::Values { values } => values.contains(value),
        ColumnFilter::Range { min, max } => {
            let Some(v) = parse_typed(data_type, value) else {
                return false;
            };

            if let Some(lo) = min.as_deref().and_then(|b| parse_typed(data_type, b)) {
                if v < lo {
                    return false;
                }
            }
            if let Some(hi) = max.as_deref().and_then(|b| parse_typed(data_type, b)) {
                if v > hi {
                    return false;
                }
            }
            true
        }
    }
}

/// Comparable form of a typed value
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum TypedValue {
    Number(f64),
    Date(NaiveDate),
}

fn parse_typed(data_type: DataType, raw: &str) -> Option<TypedValue> {
    match data_type {
        DataType::Number => raw.trim().parse::<f64>().ok().map(TypedValue::Number),
        DataType::Date => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .ok()
            .map(TypedValue::Date),
        DataType::Text => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSource, TableColumnRef};
    use uuid::Uuid;

    fn column(id: u32, data_type: DataType, required: bool) -> ColumnDef {
        ColumnDef {
            id,
            name: format!("col_{}", id),
            data_type,
            visible: true,
            required,
            extra_fee_cents: None,
            step: String::new(),
            source: ColumnSource::Single(TableColumnRef {
                table_id: Uuid::new_v4(),
                column: format!("raw_{}", id),
            }),
        }
    }

    fn values(vals: &[&str]) -> ColumnFilter {
        ColumnFilter::Values {
            values: vals.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_unknown_column_rejected() {
        let columns = vec![column(1, DataType::Text, false)];
        let selection: Selection = [(99, values(&["x"]))].into_iter().collect();

        let err = validate_selection(&columns, &selection).unwrap_err();
        assert!(matches!(err, AppError::InvalidSelection { .. }));
    }

    #[test]
    fn test_range_on_text_column_rejected() {
        let columns = vec![column(1, DataType::Text, false)];
        let selection: Selection = [(
            1,
            ColumnFilter::Range {
                min: Some("a".to_string()),
                max: None,
            },
        )]
        .into_iter()
        .collect();

        assert!(validate_selection(&columns, &selection).is_err());
    }

    #[test]
    fn test_range_with_unparseable_bound_rejected() {
        let columns = vec![column(1, DataType::Number, false)];
        let selection: Selection = [(
            1,
            ColumnFilter::Range {
                min: Some("not-a-number".to_string()),
                max: None,
            },
        )]
        .into_iter()
        .collect();

        assert!(validate_selection(&columns, &selection).is_err());
    }

    #[test]
    fn test_required_columns_always_included() {
        let columns = vec![
            column(1, DataType::Text, true),
            column(2, DataType::Text, false),
            column(3, DataType::Number, false),
        ];
        let selection: Selection = [(3, ColumnFilter::Range {
            min: Some("1".to_string()),
            max: Some("10".to_string()),
        })]
        .into_iter()
        .collect();

        let included = validate_selection(&columns, &selection).unwrap();
        let ids: Vec<u32> = included.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_membership_matching() {
        let filter = values(&["US", "CA"]);
        assert!(matches(&filter, DataType::Text, Some("US")));
        assert!(!matches(&filter, DataType::Text, Some("DE")));
        assert!(!matches(&filter, DataType::Text, None));
    }

    #[test]
    fn test_numeric_range_is_inclusive() {
        let filter = ColumnFilter::Range {
            min: Some("10".to_string()),
            max: Some("20".to_string()),
        };

        assert!(matches(&filter, DataType::Number, Some("10")));
        assert!(matches(&filter, DataType::Number, Some("15.5")));
        assert!(matches(&filter, DataType::Number, Some("20")));
        assert!(!matches(&filter, DataType::Number, Some("9.99")));
        assert!(!matches(&filter, DataType::Number, Some("20.01")));
        assert!(!matches(&filter, DataType::Number, Some("garbage")));
    }

    #[test]
    fn test_date_range() {
        let filter = ColumnFilter::Range {
            min: Some("2024-01-01".to_string()),
            max: None,
        };

        assert!(matches(&filter, DataType::Date, Some("2024-06-15")));
        assert!(matches(&filter, DataType::Date, Some("2024-01-01")));
        assert!(!matches(&filter, DataType::Date, Some("2023-12-31")));
        assert!(!matches(&filter, DataType::Date, Some("15/06/2024")));
    }

    #[test]
    fn test_half_open_range() {
        let filter = ColumnFilter::Range {
            min: None,
            max: Some("100".to_string()),
        };

        assert!(matches(&filter, DataType::Number, Some("-5")));
        assert!(matches(&filter, DataType::Number, Some("100")));
        assert!(!matches(&filter, DataType::Number, Some("101")));
    }
}
