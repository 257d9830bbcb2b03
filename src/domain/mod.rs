//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - raw input rows and the records derived from them
//! - grid rows and model-facing windowed rows
//! - the run configuration (`PipelineConfig`) and output schema

pub mod types;

pub use types::*;
