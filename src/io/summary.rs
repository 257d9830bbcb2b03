//! `run_summary.json`: what a run was configured with and what it produced.
//!
//! Written beside the dataset files so a model training job can check the
//! feature column list and the row counts without re-reading the CSVs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::app::pipeline::{MonthTotal, RunOutput, RunStats};
use crate::domain::{DatasetSchema, PipelineConfig};
use crate::error::PipelineError;

pub const SUMMARY_FILE: &str = "run_summary.json";

#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub tool: &'static str,
    pub version: &'static str,
    pub config: &'a PipelineConfig,
    pub schema: &'a DatasetSchema,
    pub stats: &'a RunStats,
    pub monthly_totals: &'a [MonthTotal],
}

impl<'a> RunSummary<'a> {
    pub fn new(config: &'a PipelineConfig, run: &'a RunOutput) -> Self {
        Self {
            tool: "dg",
            version: env!("CARGO_PKG_VERSION"),
            config,
            schema: run.schema(),
            stats: &run.stats,
            monthly_totals: &run.monthly_totals,
        }
    }
}

/// Serialize `summary` as pretty JSON to `path`.
///
/// Callers stage this file with the datasets; see `export::write_outputs`.
pub fn write_run_summary(path: &Path, summary: &RunSummary<'_>) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, summary)
        .map_err(|e| PipelineError::io(path, std::io::Error::other(e)))?;
    writer.flush().map_err(|e| PipelineError::io(path, e))
}
