//! Command-line parsing for the monthly demand feature builder.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! pipeline: flags are parsed here and converted into a `PipelineConfig`,
//! which is all the pipeline ever sees.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::data::SampleConfig;
use crate::domain::{PipelineConfig, ValidationMonth, YearMonth};
use crate::io::ingest::InputPaths;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dg", version, about = "Monthly sales feature builder (shop x item x month)")]
pub struct Cli {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace).
    #[arg(long, global = true, env = "DG_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build train/validation/test datasets from the four input CSV files.
    Prepare(PrepareArgs),
    /// Write a small synthetic input set (sales, items, categories, test).
    Sample(SampleArgs),
}

#[derive(Debug, Args, Clone)]
pub struct PrepareArgs {
    /// Daily sales CSV (date, shop_id, item_id, item_price, item_cnt_day).
    #[arg(long, env = "DG_SALES", value_name = "CSV")]
    pub sales: PathBuf,

    /// Item catalog CSV (item_id, item_name, item_category_id).
    #[arg(long, env = "DG_ITEMS", value_name = "CSV")]
    pub items: PathBuf,

    /// Category CSV (item_category_id, category_name).
    #[arg(long, env = "DG_CATEGORIES", value_name = "CSV")]
    pub categories: PathBuf,

    /// Test specification CSV (shop_id, item_id).
    #[arg(long, env = "DG_TEST", value_name = "CSV")]
    pub test: PathBuf,

    /// Output directory for train_df.csv, validation_df.csv, test_df.csv.
    #[arg(long, env = "DG_OUT", default_value = "Data")]
    pub out: PathBuf,

    /// Number of lag months per row.
    #[arg(short = 'k', long, env = "DG_LAGS", default_value_t = 12)]
    pub lags: usize,

    /// First day of the calendar range (YYYY-MM-DD).
    #[arg(long, env = "DG_START", default_value = "2018-01-01")]
    pub start: NaiveDate,

    /// Last day of the calendar range (YYYY-MM-DD).
    #[arg(long, env = "DG_END", default_value = "2019-12-31")]
    pub end: NaiveDate,

    /// Month to predict (YYYY-MM).
    #[arg(long, env = "DG_PREDICT", default_value = "2019-12")]
    pub predict: YearMonth,

    /// Validation month (YYYY-MM); defaults to the month before --predict.
    #[arg(long, env = "DG_VALIDATION", conflicts_with = "no_validation")]
    pub validation: Option<YearMonth>,

    /// Put every historical month into train.
    #[arg(long)]
    pub no_validation: bool,

    /// Upper edges of the price buckets, comma separated.
    #[arg(
        long,
        env = "DG_PRICE_EDGES",
        value_delimiter = ',',
        default_value = "100,300,1000,3000,10000"
    )]
    pub price_edges: Vec<f64>,

    /// Render an ASCII chart of monthly unit sales.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

impl PrepareArgs {
    pub fn input_paths(&self) -> InputPaths {
        InputPaths {
            sales: self.sales.clone(),
            items: self.items.clone(),
            categories: self.categories.clone(),
            test: self.test.clone(),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let validation = match (self.no_validation, self.validation) {
            (true, _) => ValidationMonth::Disabled,
            (false, Some(month)) => ValidationMonth::At(month),
            (false, None) => ValidationMonth::LastHistorical,
        };
        PipelineConfig {
            lag_depth: self.lags,
            start_date: self.start,
            end_date: self.end,
            predict: self.predict,
            validation,
            price_edges: self.price_edges.clone(),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Directory to write the four CSV files into.
    #[arg(long, default_value = "sample")]
    pub out: PathBuf,

    /// Random seed; the same seed always writes the same files.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of shops.
    #[arg(long, default_value_t = 4)]
    pub shops: u32,

    /// Number of catalog items.
    #[arg(long, default_value_t = 30)]
    pub items: u32,

    /// First day of generated sales (YYYY-MM-DD).
    #[arg(long, default_value = "2018-01-01")]
    pub start: NaiveDate,

    /// Number of months with sales.
    #[arg(long, default_value_t = 23)]
    pub months: u32,
}

impl SampleArgs {
    pub fn sample_config(&self) -> SampleConfig {
        SampleConfig {
            seed: self.seed,
            shops: self.shops,
            items: self.items,
            start: self.start,
            months: self.months,
            ..SampleConfig::default()
        }
    }
}
