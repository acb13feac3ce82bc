//! Order pricing
//!
//! Price is linear in delivered volume: the collection's effective per-row
//! fee (base minus discount, floored at zero) plus the additional fees of
//! every selected additional-fee column, multiplied by the delivered row
//! count. Pricing is always computed on the delivered volume, never the
//! requested volume, so a failed or partial build can never overcharge.

use crate::catalog::ColumnDef;
use serde::{Deserialize, Serialize};

/// A priced build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Price per delivered row in cents
    pub unit_price_cents: i64,

    /// Delivered row count the quote covers
    pub volume: u64,

    /// Total price in cents
    pub total_cents: i64,
}

/// Compute the quote for a delivered volume
pub fn quote(
    fee_cents: i64,
    discount_cents: i64,
    selected_columns: &[&ColumnDef],
    volume: u64,
) -> Quote {
    let extra: i64 = selected_columns.iter().map(|c| c.extra_fee()).sum();
    let unit_price_cents = (fee_cents - discount_cents).max(0) + extra;
    let total_cents = unit_price_cents * volume as i64;

    Quote {
        unit_price_cents,
        volume,
        total_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSource, DataType, TableColumnRef};
    use uuid::Uuid;

    fn column(id: u32, extra_fee_cents: Option<i64>) -> ColumnDef {
        ColumnDef {
            id,
            name: format!("col_{}", id),
            data_type: DataType::Text,
            visible: true,
            required: false,
            extra_fee_cents,
            step: String::new(),
            source: ColumnSource::Single(TableColumnRef {
                table_id: Uuid::new_v4(),
                column: format!("raw_{}", id),
            }),
        }
    }

    #[test]
    fn test_base_fee_times_volume() {
        let selected: Vec<&ColumnDef> = vec![];
        let q = quote(1000, 0, &selected, 50);

        assert_eq!(q.unit_price_cents, 1000);
        assert_eq!(q.total_cents, 50_000);
    }

    #[test]
    fn test_discount_and_additional_fee() {
        // Base fee 10.00, discount 2.00, one additional-fee column at 3.00,
        // volume 100: (10 - 2 + 3) * 100 = 1100.00
        let with_fee = column(1, Some(300));
        let plain = column(2, None);
        let selected = vec![&with_fee, &plain];

        let q = quote(1000, 200, &selected, 100);

        assert_eq!(q.unit_price_cents, 1100);
        assert_eq!(q.total_cents, 110_000);
        assert_eq!(q.volume, 100);
    }

    #[test]
    fn test_multiple_additional_fees_sum() {
        let a = column(1, Some(100));
        let b = column(2, Some(250));
        let selected = vec![&a, &b];

        let q = quote(500, 0, &selected, 10);
        assert_eq!(q.unit_price_cents, 850);
        assert_eq!(q.total_cents, 8_500);
    }

    #[test]
    fn test_discount_never_drives_fee_negative() {
        let selected: Vec<&ColumnDef> = vec![];
        let q = quote(100, 500, &selected, 10);

        assert_eq!(q.unit_price_cents, 0);
        assert_eq!(q.total_cents, 0);
    }

    #[test]
    fn test_zero_volume_is_free() {
        let with_fee = column(1, Some(300));
        let selected = vec![&with_fee];

        let q = quote(1000, 200, &selected, 0);
        assert_eq!(q.total_cents, 0);
    }
}
