//! Formatted terminal output for `dg prepare`.
//!
//! We keep formatting code in one place so:
//! - the pipeline stays free of presentation concerns
//! - output changes are localized

use std::path::PathBuf;

use crate::app::pipeline::RunStats;
use crate::domain::{DatasetSchema, PipelineConfig, ValidationMonth};

/// Format the full run summary (configuration, grid size, dataset sizes).
pub fn format_run_summary(stats: &RunStats, schema: &DatasetSchema, config: &PipelineConfig) -> String {
    let mut out = String::new();

    out.push_str("=== dg - monthly demand feature build ===\n");
    out.push_str(&format!(
        "Calendar: {} .. {} | predict={} (block {})\n",
        config.start_date, config.end_date, stats.predict_month, stats.predict_block
    ));
    let validation = match (config.validation, stats.validation_month) {
        (ValidationMonth::Disabled, _) | (_, None) => "off".to_string(),
        (_, Some(month)) => month.to_string(),
    };
    out.push_str(&format!("Lags: k={} | validation={validation}\n", config.lag_depth));

    out.push_str(&format!(
        "Inputs: sales={} (returns={}) | items={} | categories={} (groups={}) | test pairs={}\n",
        stats.transactions, stats.returns, stats.items, stats.categories, stats.category_groups, stats.test_pairs
    ));
    out.push_str(&format!(
        "Grid: pairs={} x months={} = {} rows (from {}) | test-only pairs={}\n",
        stats.grid_pairs, stats.grid_months, stats.grid_rows, stats.first_month, stats.test_only_pairs
    ));
    out.push_str(&format!("Train targets: {}\n", fmt_blocks(&stats.train_targets)));

    out.push_str("\nDatasets:\n");
    out.push_str(&format!("{:<12} {:>10}\n", "split", "rows"));
    out.push_str(&format!("{:-<12} {:-<10}\n", "", ""));
    for (name, rows) in [
        ("train", stats.train_rows),
        ("validation", stats.validation_rows),
        ("test", stats.test_rows),
    ] {
        out.push_str(&format!("{name:<12} {rows:>10}\n"));
    }

    out.push_str(&format!(
        "\nFeatures ({}): {}\n",
        schema.feature_columns.len(),
        schema.feature_columns.join(", ")
    ));
    out
}

/// Format the list of files a run wrote.
pub fn format_written(paths: &[PathBuf]) -> String {
    let mut out = String::from("Wrote:\n");
    for p in paths {
        out.push_str(&format!("- {}\n", p.display()));
    }
    out
}

fn fmt_blocks(blocks: &[u32]) -> String {
    match (blocks.first(), blocks.last()) {
        (Some(first), Some(last)) if first != last => format!("{first}..={last} ({} months)", blocks.len()),
        (Some(only), _) => format!("{only} (1 month)"),
        _ => "none".to_string(),
    }
}
