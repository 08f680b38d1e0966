//! # Siphon - backend-agnostic tabular ETL
//!
//! Siphon loads a SQL table into an in-memory dataset, applies an ordered
//! sequence of transforms, and writes the result back to a destination
//! table, replacing it if it exists.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Backend   │────▶│   Dataset   │────▶│ Transforms  │────▶│   Backend   │
//! │ (load rows) │     │ (in memory) │     │ (in order)  │     │  (replace)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! Three interchangeable backends (SQLite, MySQL, PostgreSQL) sit behind one
//! capability interface; they differ only in connection parameters and minor
//! SQL dialect quirks. Everything is synchronous and blocking: one linear
//! sequence of calls against a connection scoped to the operation.
//!
//! ## Quick Start
//!
//! ```rust
//! use siphon::{run, ConnectionConfig, Pipeline};
//!
//! let config = ConnectionConfig::sqlite("company.db");
//! let pipeline = Pipeline::from_json(r#"{
//!     "source_table": "Sales",
//!     "transforms": [
//!         {"type": "filter", "column": "Amount", "op": "le", "value": 2000},
//!         {"type": "add_column", "name": "Category",
//!          "derivation": {"type": "constant", "value": "Electronics"}}
//!     ],
//!     "destination_table": "Sales_Cleaned"
//! }"#).unwrap();
//! # let _ = (config, pipeline);
//! # fn etl(config: siphon::ConnectionConfig, pipeline: siphon::Pipeline) -> Result<(), siphon::PipelineError> {
//! let result = run(&config, &pipeline)?;
//! println!("stored {} rows", result.rows_stored);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`dataset`] - In-memory tabular dataset
//! - [`transform`] - Transform vocabulary and the ETL pipeline
//! - [`backend`] - SQL backends behind one capability interface
//! - [`logs`] - Leveled progress logging

// Core modules
pub mod dataset;
pub mod error;

// Transformation
pub mod transform;

// Backends
pub mod backend;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConnectionError, PipelineError, QueryError, TransformError};

// =============================================================================
// Re-exports - Dataset
// =============================================================================

pub use dataset::{Dataset, Value};

// =============================================================================
// Re-exports - Transforms and pipeline
// =============================================================================

pub use transform::{
    apply_transforms, example_pipeline, run, run_with_backend, transforms_description, AggFn,
    CompareOp, Derivation, Pipeline, PipelineResult, Transform,
};

// =============================================================================
// Re-exports - Backends
// =============================================================================

pub use backend::{
    Backend, ConnectionConfig, Dialect, Driver, MysqlBackend, PostgresBackend, SqliteBackend,
};
