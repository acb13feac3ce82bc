//! Ingestion service error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Parse error at row {row}: {message}")]
    ParseError { row: usize, message: String },

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Duplicate header column: {0}")]
    DuplicateColumn(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<leadforge_common::errors::AppError> for IngestionError {
    fn from(e: leadforge_common::errors::AppError) -> Self {
        IngestionError::DatabaseError(e.to_string())
    }
}

impl From<IngestionError> for leadforge_common::errors::AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::ParseError { .. }
            | IngestionError::EmptyDataset(_)
            | IngestionError::DuplicateColumn(_) => {
                leadforge_common::errors::AppError::InvalidFormat {
                    message: e.to_string(),
                }
            }
            other => leadforge_common::errors::AppError::Internal {
                message: other.to_string(),
            },
        }
    }
}
