//! Load, transform, store orchestration.
//!
//! A [`Pipeline`] names a source table, an ordered list of transforms, and
//! an optional destination table. Running it is strictly linear:
//!
//! ```text
//! ┌────────────┐     ┌────────────┐     ┌────────────┐     ┌────────────┐
//! │   Source   │────▶│   Load     │────▶│ Transforms │────▶│   Store    │
//! │   table    │     │ (dataset)  │     │ (in order) │     │ (replace)  │
//! └────────────┘     └────────────┘     └────────────┘     └────────────┘
//! ```
//!
//! Any failing step aborts the whole run. The store step is the only step
//! that writes to the backend, so an aborted run leaves no partial writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::ops::{CompareOp, Derivation, Transform};
use crate::backend::{Backend, ConnectionConfig};
use crate::dataset::{Dataset, Value};
use crate::error::PipelineError;
use crate::logs::{log_info, log_success, log_warning};

/// A complete ETL step: source, transforms, destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// Table to load all rows from.
    pub source_table: String,

    /// Transforms applied in the literal order given.
    #[serde(default)]
    pub transforms: Vec<Transform>,

    /// Table to write the result to, replacing it if it exists.
    /// Omitted = transform only, nothing is written back.
    #[serde(default)]
    pub destination_table: Option<String>,
}

impl Pipeline {
    /// Parse a pipeline from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// The dataset after all transforms.
    pub dataset: Dataset,

    /// Rows loaded from the source table.
    pub rows_loaded: usize,

    /// Rows written to the destination table (0 when none was set).
    pub rows_stored: usize,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

/// Run a pipeline against the configured backend.
///
/// The connection is acquired here and released when the run finishes,
/// on success and on error alike.
pub fn run(config: &ConnectionConfig, pipeline: &Pipeline) -> Result<PipelineResult, PipelineError> {
    let mut backend = config.connect()?;
    run_with_backend(backend.as_mut(), pipeline)
}

/// Run a pipeline on an already-open backend connection.
pub fn run_with_backend(
    backend: &mut dyn Backend,
    pipeline: &Pipeline,
) -> Result<PipelineResult, PipelineError> {
    let started_at = Utc::now();
    let clock = Instant::now();

    log_info(format!("Loading table '{}'...", pipeline.source_table));
    let mut dataset = backend.load_table(&pipeline.source_table)?;
    let rows_loaded = dataset.len();
    log_success(format!(
        "Loaded {} rows, {} columns",
        rows_loaded,
        dataset.columns().len()
    ));

    for transform in &pipeline.transforms {
        dataset = transform.apply(dataset)?;
        log_info(format!(
            "{}: {} rows remain",
            transform.name(),
            dataset.len()
        ));
    }

    let rows_stored = match &pipeline.destination_table {
        Some(destination) => {
            log_info(format!("Storing into '{}' (replace)...", destination));
            backend.store_table(destination, &dataset)?;
            log_success(format!("Stored {} rows", dataset.len()));
            dataset.len()
        }
        None => {
            log_warning("No destination table; result not stored");
            0
        }
    };

    Ok(PipelineResult {
        rows_loaded,
        rows_stored,
        started_at,
        duration_ms: clock.elapsed().as_millis() as u64,
        dataset,
    })
}

/// Generate an example pipeline for documentation and the CLI.
///
/// Mirrors a typical cleaning exercise: drop outlier sales, tag the rest
/// with a category, write the cleaned table back.
pub fn example_pipeline() -> Pipeline {
    Pipeline {
        description: "Clean the Sales table: drop outliers, add a category".to_string(),
        source_table: "Sales".to_string(),
        transforms: vec![
            Transform::Filter {
                column: "Amount".to_string(),
                op: CompareOp::Le,
                value: Value::Integer(2000),
            },
            Transform::AddColumn {
                name: "Category".to_string(),
                derivation: Derivation::Constant {
                    value: Value::Text("Electronics".to_string()),
                },
            },
        ],
        destination_table: Some("Sales_Cleaned".to_string()),
    }
}
