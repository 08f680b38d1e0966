//! Error types for the Siphon ETL pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConnectionError`] - Backend connection errors
//! - [`QueryError`] - SQL execution errors
//! - [`TransformError`] - Dataset transform errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries. There is no retry
//! and no rollback beyond the backend's own statement semantics:
//! errors propagate to the caller and abort the run.

use thiserror::Error;

// =============================================================================
// Connection Errors
// =============================================================================

/// Errors while establishing or configuring a backend connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Backend unreachable or credentials rejected.
    #[error("Connection failed: {0}")]
    Failed(String),

    /// Connection descriptor is incomplete or inconsistent.
    #[error("Invalid connection configuration: {0}")]
    InvalidConfig(String),

    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors while executing SQL against a backend.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed SQL, missing table/column, or constraint violation.
    #[error("SQL execution failed: {0}")]
    Execution(String),

    /// A result column has a type the dataset model cannot represent.
    #[error("Unsupported column type '{type_name}' in column '{column}'")]
    UnsupportedType { column: String, type_name: String },

    /// Table or column name that cannot be safely quoted.
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

// =============================================================================
// Transform Errors
// =============================================================================

/// Errors while applying a transform to a dataset.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Referenced column does not exist in the dataset.
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// Transform hit a value it cannot operate on.
    #[error("Transform '{transform}' failed on column '{column}': {message}")]
    OperationFailed {
        transform: String,
        column: String,
        message: String,
    },
}

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Top-level errors for a complete ETL run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Query error.
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Transform error.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// IO error (pipeline or connection files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
