//! Dataset transforms and the ETL pipeline.
//!
//! - [`ops`] - The transform vocabulary applied to in-memory datasets
//! - [`pipeline`] - Load, transform, store orchestration

pub mod ops;
pub mod pipeline;

pub use ops::{
    apply_transforms, transforms_description, AggFn, CompareOp, Derivation, Transform,
};
pub use pipeline::{example_pipeline, run, run_with_backend, Pipeline, PipelineResult};
