//! Extract materialization
//!
//! Writes the delivered row-set to a durable artifact. The writer is an
//! injected trait so the build pipeline never touches the filesystem
//! directly; failures surface as Storage errors and leave the delivery file
//! in waiting state for retry or cleanup.

use crate::catalog::Delimiter;
use async_trait::async_trait;
use leadforge_common::errors::{AppError, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Trait for materializing delivered rows
#[async_trait]
pub trait ExtractWriter: Send + Sync {
    /// Write the header and rows to the destination path
    async fn write_extract(
        &self,
        columns: &[String],
        rows: &[Vec<String>],
        dest: &Path,
    ) -> Result<()>;
}

/// Storage path of a delivery file's extract
pub fn extract_path(base: &Path, user_id: Uuid, file_id: Uuid) -> PathBuf {
    base.join(user_id.to_string()).join(format!("{}.csv", file_id))
}

/// Writer producing delimited text files via the csv crate
pub struct CsvWriter {
    delimiter: Delimiter,
}

impl CsvWriter {
    pub fn new(delimiter: Delimiter) -> Self {
        Self { delimiter }
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new(Delimiter::Comma)
    }
}

#[async_trait]
impl ExtractWriter for CsvWriter {
    async fn write_extract(
        &self,
        columns: &[String],
        rows: &[Vec<String>],
        dest: &Path,
    ) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Storage {
                message: format!("Failed to create extract directory: {}", e),
            })?;
        }

        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter.as_byte())
            .from_path(dest)
            .map_err(|e| AppError::Storage {
                message: format!("Failed to open extract for writing: {}", e),
            })?;

        writer.write_record(columns).map_err(|e| AppError::Storage {
            message: format!("Failed to write extract header: {}", e),
        })?;

        for row in rows {
            writer.write_record(row).map_err(|e| AppError::Storage {
                message: format!("Failed to write extract row: {}", e),
            })?;
        }

        writer.flush().map_err(|e| AppError::Storage {
            message: format!("Failed to flush extract: {}", e),
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("extract.csv");

        let writer = CsvWriter::default();
        let columns = vec!["email".to_string(), "country".to_string()];
        let rows = vec![
            vec!["a@b.com".to_string(), "US".to_string()],
            vec!["c@d.com".to_string(), "CA".to_string()],
        ];

        writer.write_extract(&columns, &rows, &dest).await.unwrap();

        let content = std::fs::read_to_string(&dest).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some("email,country"));
        assert_eq!(lines.next(), Some("a@b.com,US"));
        assert_eq!(lines.next(), Some("c@d.com,CA"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let user_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();
        let dest = extract_path(dir.path(), user_id, file_id);

        let writer = CsvWriter::default();
        writer
            .write_extract(&["email".to_string()], &[], &dest)
            .await
            .unwrap();

        assert!(dest.exists());
        assert!(dest.ends_with(format!("{}/{}.csv", user_id, file_id)));
    }

    #[tokio::test]
    async fn test_honors_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("extract.csv");

        let writer = CsvWriter::new(Delimiter::Semicolon);
        let columns = vec!["a".to_string(), "b".to_string()];
        let rows = vec![vec!["1".to_string(), "2".to_string()]];

        writer.write_extract(&columns, &rows, &dest).await.unwrap();

        let content = std::fs::read_to_string(&dest).unwrap();
        assert!(content.starts_with("a;b"));
    }
}
