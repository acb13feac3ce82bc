//! Lead aggregation
//!
//! Computes the total available leads for a collection: the sum of stored
//! lead counts across the distinct set of tables its columns reference. A
//! table referenced by several columns counts once; a table that has been
//! deleted contributes zero rather than failing the computation.

use crate::catalog::{self, ColumnDef};
use leadforge_common::cache::{keys, Cache};
use leadforge_common::db::models::DataTable;
use leadforge_common::db::Repository;
use leadforge_common::errors::{AppError, Result};
use leadforge_common::metrics::record_cache;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Sum lead counts over the tables that still exist
///
/// `tables` holds only the live tables resolved from the distinct reference
/// set; anything deleted since the collection was configured is simply
/// absent and treated as zero availability.
pub fn sum_leads(columns: &[ColumnDef], tables: &[DataTable]) -> u64 {
    let referenced = catalog::distinct_table_ids(columns);

    tables
        .iter()
        .filter(|t| referenced.contains(&t.id))
        .map(|t| t.leads.max(0) as u64)
        .sum()
}

/// Aggregates available leads per collection
#[derive(Clone)]
pub struct LeadAggregator {
    repository: Repository,
    cache: Option<Arc<Cache>>,
    cache_ttl_secs: u64,
}

impl LeadAggregator {
    pub fn new(repository: Repository, cache: Option<Arc<Cache>>, cache_ttl_secs: u64) -> Self {
        Self {
            repository,
            cache,
            cache_ttl_secs,
        }
    }

    /// Total available leads for a collection
    ///
    /// NotFound when the collection does not exist; database failures
    /// surface as retryable persistence errors, distinct from NotFound.
    /// Cache failures degrade to the computed value.
    #[instrument(skip(self))]
    pub async fn total_leads(&self, collection_id: Uuid) -> Result<u64> {
        if let Some(ref cache) = self.cache {
            match cache.get::<u64>(&keys::lead_count(collection_id)).await {
                Ok(Some(count)) => {
                    record_cache(true, "lead_count");
                    return Ok(count);
                }
                Ok(None) => record_cache(false, "lead_count"),
                Err(e) => {
                    debug!(error = %e, "Lead-count cache read failed, computing directly");
                }
            }
        }

        let count = self.compute_total(collection_id).await?;

        if let Some(ref cache) = self.cache {
            if let Err(e) = cache
                .set_with_ttl(&keys::lead_count(collection_id), &count, self.cache_ttl_secs)
                .await
            {
                debug!(error = %e, "Lead-count cache write failed, continuing");
            }
        }

        Ok(count)
    }

    async fn compute_total(&self, collection_id: Uuid) -> Result<u64> {
        let collection = self
            .repository
            .find_collection_by_id(collection_id)
            .await?
            .ok_or_else(|| AppError::CollectionNotFound {
                id: collection_id.to_string(),
            })?;

        let columns = catalog::decode_columns(&collection.columns)?;
        let table_ids = catalog::distinct_table_ids(&columns);
        if table_ids.is_empty() {
            return Ok(0);
        }

        let tables = self.repository.find_tables_by_ids(&table_ids).await?;

        debug!(
            collection_id = %collection_id,
            referenced = table_ids.len(),
            live = tables.len(),
            "Aggregating lead counts"
        );

        Ok(sum_leads(&columns, &tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSource, DataType, TableColumnRef};

    fn table(id: Uuid, leads: i64) -> DataTable {
        let now = chrono::Utc::now();
        DataTable {
            id,
            owner_id: Uuid::new_v4(),
            name: "test".to_string(),
            columns: serde_json::json!(["email"]),
            leads,
            tags: serde_json::json!([]),
            source_file: None,
            delimiter: "comma".to_string(),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

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
                column: "email".to_string(),
            }),
        }
    }

    #[test]
    fn test_shared_table_counted_once() {
        let shared = Uuid::new_v4();
        let columns = vec![single_column(1, shared), single_column(2, shared)];
        let tables = vec![table(shared, 500)];

        assert_eq!(sum_leads(&columns, &tables), 500);
    }

    #[test]
    fn test_sums_across_distinct_tables() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let columns = vec![single_column(1, a), single_column(2, b)];
        let tables = vec![table(a, 300), table(b, 200)];

        assert_eq!(sum_leads(&columns, &tables), 500);
    }

    #[test]
    fn test_deleted_table_contributes_zero() {
        let live = Uuid::new_v4();
        let deleted = Uuid::new_v4();
        let columns = vec![single_column(1, live), single_column(2, deleted)];
        let tables = vec![table(live, 300)];

        assert_eq!(sum_leads(&columns, &tables), 300);
    }

    #[test]
    fn test_sole_table_deleted_yields_zero() {
        let deleted = Uuid::new_v4();
        let columns = vec![single_column(1, deleted)];

        assert_eq!(sum_leads(&columns, &[]), 0);
    }

    #[test]
    fn test_no_mappings_yields_zero() {
        assert_eq!(sum_leads(&[], &[]), 0);
    }

    #[test]
    fn test_unreferenced_table_ignored() {
        let referenced = Uuid::new_v4();
        let stray = Uuid::new_v4();
        let columns = vec![single_column(1, referenced)];
        let tables = vec![table(referenced, 100), table(stray, 9999)];

        assert_eq!(sum_leads(&columns, &tables), 100);
    }
}
