//! Error types for LeadForge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! The taxonomy separates "fix your request" errors (selection, validation),
//! catalog data-integrity errors (configuration), retryable infrastructure
//! errors (database, storage), and payment errors that preserve the draft
//! order for a later retry.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidSelection,
    MissingField,
    InvalidFormat,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidToken,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,

    // Resource errors (4xxx)
    NotFound,
    CollectionNotFound,
    TableNotFound,
    OrderNotFound,
    FileNotFound,
    TransactionNotFound,

    // Conflict / inventory errors (5xxx)
    Conflict,
    InsufficientInventory,

    // Payment errors (6xxx)
    PaymentFailed,
    InsufficientFunds,

    // Infrastructure errors (7xxx)
    DatabaseError,
    ConnectionError,
    StorageError,
    CacheError,

    // Catalog integrity errors (8xxx)
    ConfigurationError,

    // Internal errors (9xxx)
    InternalError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidSelection => 1002,
            ErrorCode::MissingField => 1003,
            ErrorCode::InvalidFormat => 1004,

            // Auth (2xxx)
            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidToken => 2002,
            ErrorCode::ExpiredToken => 2003,

            // Authz (3xxx)
            ErrorCode::Forbidden => 3001,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::CollectionNotFound => 4002,
            ErrorCode::TableNotFound => 4003,
            ErrorCode::OrderNotFound => 4004,
            ErrorCode::FileNotFound => 4005,
            ErrorCode::TransactionNotFound => 4006,

            // Conflicts / inventory (5xxx)
            ErrorCode::Conflict => 5001,
            ErrorCode::InsufficientInventory => 5002,

            // Payment (6xxx)
            ErrorCode::PaymentFailed => 6001,
            ErrorCode::InsufficientFunds => 6002,

            // Infrastructure (7xxx)
            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,
            ErrorCode::StorageError => 7003,
            ErrorCode::CacheError => 7004,

            // Catalog integrity (8xxx)
            ErrorCode::ConfigurationError => 8001,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::SerializationError => 9002,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }

    /// Whether a caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::DatabaseError
                | ErrorCode::ConnectionError
                | ErrorCode::StorageError
                | ErrorCode::CacheError
                | ErrorCode::ServiceUnavailable
        )
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid selection: {message}")]
    InvalidSelection { message: String },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Collection not found: {id}")]
    CollectionNotFound { id: String },

    #[error("Table not found: {id}")]
    TableNotFound { id: String },

    #[error("Order not found: {id}")]
    OrderNotFound { id: String },

    #[error("File not found: {id}")]
    FileNotFound { id: String },

    #[error("Transaction not found: {id}")]
    TransactionNotFound { id: String },

    // Conflict / inventory errors
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Insufficient inventory: {available} eligible leads for requested volume {requested}")]
    InsufficientInventory { requested: u64, available: u64 },

    // Payment errors
    #[error("Payment failed: {message}")]
    PaymentFailed { message: String },

    #[error("Insufficient funds: balance {balance_cents} cents, required {required_cents} cents")]
    InsufficientFunds {
        balance_cents: i64,
        required_cents: i64,
    },

    // Catalog integrity errors
    #[error("Catalog configuration error: {message}")]
    Configuration { message: String },

    // Infrastructure errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidSelection { .. } => ErrorCode::InvalidSelection,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::CollectionNotFound { .. } => ErrorCode::CollectionNotFound,
            AppError::TableNotFound { .. } => ErrorCode::TableNotFound,
            AppError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
            AppError::FileNotFound { .. } => ErrorCode::FileNotFound,
            AppError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            AppError::Conflict { .. } => ErrorCode::Conflict,
            AppError::InsufficientInventory { .. } => ErrorCode::InsufficientInventory,
            AppError::PaymentFailed { .. } => ErrorCode::PaymentFailed,
            AppError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::CacheError { .. } => ErrorCode::CacheError,
            AppError::HttpClient(_) => ErrorCode::ServiceUnavailable,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidSelection { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } | AppError::InvalidToken | AppError::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }

            // 402 Payment Required
            AppError::PaymentFailed { .. } | AppError::InsufficientFunds { .. } => {
                StatusCode::PAYMENT_REQUIRED
            }

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::CollectionNotFound { .. }
            | AppError::TableNotFound { .. }
            | AppError::OrderNotFound { .. }
            | AppError::FileNotFound { .. }
            | AppError::TransactionNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict { .. } | AppError::InsufficientInventory { .. } => {
                StatusCode::CONFLICT
            }

            // 500 Internal Server Error
            AppError::Configuration { .. }
            | AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Storage { .. }
            | AppError::Internal { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::CacheError { .. } | AppError::ServiceUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                retryable: code.is_retryable(),
                details: None,
                request_id: None, // Should be filled by middleware
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::CollectionNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::CollectionNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_selection_is_client_error() {
        let err = AppError::InvalidSelection {
            message: "unknown column 42".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.is_client_error());
        assert!(!err.code().is_retryable());
    }

    #[test]
    fn test_configuration_is_server_error_not_retryable() {
        let err = AppError::Configuration {
            message: "column 3 has no live source table".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
        assert!(!err.code().is_retryable());
    }

    #[test]
    fn test_database_error_is_retryable() {
        let err = AppError::DatabaseConnection {
            message: "pool exhausted".into(),
        };
        assert!(err.code().is_retryable());
        assert!(err.is_server_error());
    }

    #[test]
    fn test_insufficient_inventory() {
        let err = AppError::InsufficientInventory {
            requested: 50,
            available: 30,
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("30"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_payment_failure_preserves_draft_semantics() {
        let err = AppError::PaymentFailed {
            message: "card declined".into(),
        };
        assert_eq!(err.status_code(), StatusCode::PAYMENT_REQUIRED);
        assert!(!err.code().is_retryable());
    }
}
