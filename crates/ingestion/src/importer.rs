//! Dataset import
//!
//! Turns parsed delimited content into a data table with stored rows and a
//! lead count. Re-import replaces the rows wholesale and refreshes the
//! count; lead identity is natural-key derived downstream, so a re-import
//! can never make an already-owned record purchasable again.

use crate::errors::IngestionError;
use crate::parser::{parse_dataset, ParsedDataset};
use leadforge_common::db::models::DataTable;
use leadforge_common::db::Repository;
use leadforge_common::metrics::record_import;
use leadforge_fulfillment::Delimiter;
use tracing::{info, instrument};
use uuid::Uuid;

/// Imports uploaded datasets into the table store
pub struct DatasetImporter {
    repository: Repository,
}

impl DatasetImporter {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Import a new dataset and create its table
    #[instrument(skip(self, content), fields(owner_id = %owner_id, name = %name))]
    pub async fn import(
        &self,
        owner_id: Uuid,
        name: String,
        delimiter: Delimiter,
        tags: Vec<String>,
        source_file: Option<String>,
        content: &str,
    ) -> Result<DataTable, IngestionError> {
        let dataset = parse_dataset(content, delimiter)?;

        let table = self
            .repository
            .create_table(
                owner_id,
                name,
                serde_json::json!(dataset.columns),
                dataset.lead_count() as i64,
                serde_json::json!(tags),
                source_file,
                delimiter.as_str().to_string(),
            )
            .await?;

        let inserted = self
            .repository
            .insert_table_rows(table.id, row_values(&dataset))
            .await?;

        record_import(inserted);
        info!(
            table_id = %table.id,
            rows = inserted,
            columns = dataset.columns.len(),
            "Dataset imported"
        );

        Ok(table)
    }

    /// Replace an existing table's rows from fresh content
    #[instrument(skip(self, content), fields(table_id = %table_id))]
    pub async fn reimport(
        &self,
        table_id: Uuid,
        content: &str,
    ) -> Result<DataTable, IngestionError> {
        let table = self
            .repository
            .find_table_by_id(table_id)
            .await?
            .ok_or_else(|| IngestionError::DatabaseError(format!("table {} not found", table_id)))?;

        let delimiter = Delimiter::parse(&table.delimiter)
            .map_err(|e| IngestionError::DatabaseError(e.to_string()))?;
        let dataset = parse_dataset(content, delimiter)?;

        let replaced = self
            .repository
            .replace_table_rows(
                table_id,
                serde_json::json!(dataset.columns),
                row_values(&dataset),
            )
            .await?;

        record_import(replaced);
        info!(table_id = %table_id, rows = replaced, "Dataset re-imported");

        self.repository
            .find_table_by_id(table_id)
            .await?
            .ok_or_else(|| IngestionError::DatabaseError(format!("table {} not found", table_id)))
    }
}

fn row_values(dataset: &ParsedDataset) -> Vec<(i64, serde_json::Value)> {
    dataset
        .rows
        .iter()
        .enumerate()
        .map(|(index, fields)| (index as i64, serde_json::json!(fields)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dataset;

    #[test]
    fn test_row_values_preserve_order() {
        let dataset =
            parse_dataset("email\na@b.com\nc@d.com\ne@f.com\n", Delimiter::Comma).unwrap();
        let values = row_values(&dataset);

        assert_eq!(values.len(), 3);
        assert_eq!(values[0].0, 0);
        assert_eq!(values[2].0, 2);
        assert_eq!(values[1].1["email"], "c@d.com");
    }
}
