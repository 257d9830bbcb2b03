//! Shared "prepare pipeline" logic used by the CLI and the integration tests.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! join -> features -> grid -> defaults -> fill -> windows -> trend -> calendar -> split
//!
//! `run` has no ambient state: it takes the configuration and the loaded
//! inputs and returns every computed output. Writing files is left to the
//! caller so nothing touches disk unless the whole run succeeded.

use serde::Serialize;
use tracing::info;

use crate::domain::{Block, DatasetSchema, LABEL_COLUMN, PipelineConfig, ValidationMonth, YearMonth};
use crate::error::PipelineError;
use crate::io::ingest::PipelineInputs;
use crate::stages::calendar::{CalendarFeatureAdder, MonthCalendar, StandardCalendar};
use crate::stages::catalog::CatalogCompleter;
use crate::stages::features::{CategoryRollup, FeatureGenerator, PriceBuckets};
use crate::stages::fill::{FeatureFiller, FilledGrid};
use crate::stages::join::{DataJoiner, ReferenceTables};
use crate::stages::missing::MissingValueFiller;
use crate::stages::split::{DatasetSplitter, Datasets};
use crate::stages::trend::TrendFeatureGenerator;
use crate::stages::window::SlidingWindowDatasetBuilder;

/// Totals of one grid month over all pairs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthTotal {
    pub month: YearMonth,
    pub date_block_num: Block,
    pub units: f64,
    /// Sum of `item_price * item_cnt_day`; returns count negative.
    pub revenue: f64,
    /// Number of sales rows, returns included.
    pub transactions: u32,
}

/// Row and grid counts of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub transactions: usize,
    pub returns: usize,
    pub items: usize,
    pub categories: usize,
    pub category_groups: usize,
    pub test_pairs: usize,
    pub test_only_pairs: usize,
    pub grid_pairs: usize,
    pub grid_months: usize,
    pub grid_rows: usize,
    pub first_month: YearMonth,
    pub predict_month: YearMonth,
    pub predict_block: Block,
    pub validation_month: Option<YearMonth>,
    pub train_targets: Vec<Block>,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub test_rows: usize,
}

/// All computed outputs of a single `dg prepare` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub datasets: Datasets,
    pub stats: RunStats,
    pub monthly_totals: Vec<MonthTotal>,
}

impl RunOutput {
    pub fn schema(&self) -> &DatasetSchema {
        &self.datasets.schema
    }
}

/// Execute the full pipeline on in-memory inputs.
pub fn run(config: &PipelineConfig, inputs: &PipelineInputs) -> Result<RunOutput, PipelineError> {
    // Lookup tables and strategies are built once, before any stage runs.
    let calendar = MonthCalendar::new(config.start_date, config.end_date, config.predict)?;
    let predict_block = calendar.predict_block();
    let validation_block = resolve_validation(config.validation, &calendar)?;
    let refs = ReferenceTables::build(&inputs.items, &inputs.categories)?;
    let rollup = CategoryRollup::from_refs(&refs);
    let buckets = PriceBuckets::new(config.price_edges.clone())?;
    let windows = SlidingWindowDatasetBuilder::new(config.lag_depth, &buckets)?;
    let trend = TrendFeatureGenerator::default();
    let calendar_features = CalendarFeatureAdder::new(&calendar, &StandardCalendar::default());

    info!(
        start = %calendar.start(),
        predict = %calendar.predict(),
        lag_depth = config.lag_depth,
        "starting pipeline"
    );

    // 1) Join.
    let joined = DataJoiner::new(&refs, &calendar).join(&inputs.sales)?;
    let returns = joined.iter().filter(|r| r.item_cnt_day < 0.0).count();

    // 2) Row features.
    let featured = FeatureGenerator::new(&buckets, &rollup).generate_all(joined)?;

    // 3) Dense grid, including test-required pairs.
    let grid = CatalogCompleter::new(predict_block).complete(&featured, &inputs.test)?;
    drop(featured);

    // 4) + 5) Defaults, then causal filling.
    let defaulted = MissingValueFiller::new(&refs, &rollup).fill(grid, &inputs.test)?;
    let test_only_pairs = defaulted.test_only_pairs();
    let filled = FeatureFiller.fill(defaulted)?;
    let monthly_totals = monthly_totals(&filled, &calendar);

    // 6) Sliding windows.
    let mut windowed = windows.build(&filled, &inputs.test)?;

    // 7) + 8) Trend and calendar columns, identically for train and test.
    trend.apply(&mut windowed.train, &mut windowed.test)?;
    calendar_features.apply(&mut windowed.train, &mut windowed.test)?;

    let schema = DatasetSchema {
        key_columns: ["shop_id", "item_id", "date_block_num"].map(String::from).to_vec(),
        feature_columns: ["item_category_id", "category_group_id", "item_price", "price_bucket"]
            .into_iter()
            .map(String::from)
            .chain(windows.lag_names())
            .chain(trend.names())
            .chain(calendar_features.names().iter().cloned())
            .collect(),
        label_column: LABEL_COLUMN.to_string(),
    };

    let train_targets = windowed.train_targets.clone();

    // 9) Split.
    let datasets = DatasetSplitter::new(validation_block, predict_block).split(windowed, schema)?;

    let stats = RunStats {
        transactions: inputs.sales.len(),
        returns,
        items: inputs.items.len(),
        categories: inputs.categories.len(),
        category_groups: rollup.len(),
        test_pairs: inputs.test.len(),
        test_only_pairs,
        grid_pairs: filled.pairs().len(),
        grid_months: filled.n_months(),
        grid_rows: filled.len(),
        first_month: calendar.month_of(filled.first_block()).unwrap_or(calendar.start()),
        predict_month: calendar.predict(),
        predict_block,
        validation_month: validation_block.and_then(|b| calendar.month_of(b)),
        train_targets,
        train_rows: datasets.train.len(),
        validation_rows: datasets.validation.len(),
        test_rows: datasets.test.len(),
    };

    info!(
        train = stats.train_rows,
        validation = stats.validation_rows,
        test = stats.test_rows,
        features = datasets.schema.feature_columns.len(),
        "pipeline finished"
    );

    Ok(RunOutput {
        datasets,
        stats,
        monthly_totals,
    })
}

/// Resolve the configured validation month to a block.
///
/// Whether the block is an actual training target is checked by the splitter,
/// which knows the target months.
fn resolve_validation(validation: ValidationMonth, calendar: &MonthCalendar) -> Result<Option<Block>, PipelineError> {
    match validation {
        ValidationMonth::Disabled => Ok(None),
        ValidationMonth::LastHistorical => Ok(calendar.predict_block().checked_sub(1)),
        ValidationMonth::At(month) => calendar.block_of(month).map(Some).ok_or_else(|| {
            PipelineError::config(format!(
                "validation month {month} is outside the calendar range {}..={}",
                calendar.start(),
                calendar.end()
            ))
        }),
    }
}

fn monthly_totals(grid: &FilledGrid, calendar: &MonthCalendar) -> Vec<MonthTotal> {
    let mut totals: Vec<MonthTotal> = grid
        .months()
        .filter_map(|block| {
            calendar.month_of(block).map(|month| MonthTotal {
                month,
                date_block_num: block,
                units: 0.0,
                revenue: 0.0,
                transactions: 0,
            })
        })
        .collect();
    for row in grid.rows() {
        let offset = (row.date_block_num - grid.first_block()) as usize;
        if let Some(total) = totals.get_mut(offset) {
            total.units += row.item_cnt_month;
            total.revenue += row.revenue_month;
            total.transactions += row.transactions;
        }
    }
    totals
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{CategoryInfo, ItemCatalogEntry, TestPair, Transaction};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn inputs() -> PipelineInputs {
        let tx = |d: NaiveDate, shop_id, item_id, cnt| Transaction {
            date: d,
            shop_id,
            item_id,
            item_price: 150.0,
            item_cnt_day: cnt,
        };
        PipelineInputs {
            sales: vec![
                tx(date(2019, 2, 3), 0, 10, 1.0),
                tx(date(2019, 3, 4), 0, 10, 2.0),
                tx(date(2019, 3, 9), 1, 20, 1.0),
                tx(date(2019, 4, 1), 1, 20, -1.0),
            ],
            items: vec![
                ItemCatalogEntry { item_id: 10, item_name: "a".into(), item_category_id: 0 },
                ItemCatalogEntry { item_id: 20, item_name: "b".into(), item_category_id: 1 },
            ],
            categories: vec![
                CategoryInfo { item_category_id: 0, category_name: "Games - PS4".into() },
                CategoryInfo { item_category_id: 1, category_name: "Books - Audio".into() },
            ],
            test: vec![TestPair { shop_id: 0, item_id: 20 }],
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            lag_depth: 2,
            start_date: date(2019, 1, 1),
            end_date: date(2019, 12, 31),
            predict: YearMonth { year: 2019, month: 5 },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn schema_lists_every_feature_once() {
        let out = run(&config(), &inputs()).unwrap();
        let schema = out.schema();
        assert_eq!(
            schema.columns(true)[..9],
            ["shop_id", "item_id", "date_block_num", "item_category_id", "category_group_id", "item_price", "price_bucket", "lag_1", "lag_2"]
        );
        assert_eq!(schema.columns(true).last().map(String::as_str), Some("item_cnt_month"));
        assert!(!schema.columns(false).contains(&"item_cnt_month".to_string()));

        let width = schema.feature_columns.len();
        for row in out.datasets.train.iter().chain(&out.datasets.test) {
            assert_eq!(row.lags.len() + row.trend.len() + row.calendar.len() + 4, width);
        }
    }

    #[test]
    fn default_validation_is_month_before_predict() {
        let out = run(&config(), &inputs()).unwrap();
        assert_eq!(out.stats.validation_month, Some(YearMonth { year: 2019, month: 4 }));
        assert!(out.datasets.validation.iter().all(|r| r.date_block_num == 3));
        assert!(out.datasets.train.iter().all(|r| r.date_block_num == 2));
        assert_eq!(out.stats.test_only_pairs, 1);
        assert_eq!(out.stats.returns, 1);
    }

    #[test]
    fn monthly_totals_cover_the_grid() {
        let out = run(&config(), &inputs()).unwrap();
        let units: Vec<f64> = out.monthly_totals.iter().map(|t| t.units).collect();
        // Blocks 1..=4 (Feb..May 2019).
        assert_eq!(units, vec![1.0, 3.0, -1.0, 0.0]);
        let revenue: Vec<f64> = out.monthly_totals.iter().map(|t| t.revenue).collect();
        assert_eq!(revenue, vec![150.0, 450.0, -150.0, 0.0]);
        let transactions: Vec<u32> = out.monthly_totals.iter().map(|t| t.transactions).collect();
        assert_eq!(transactions, vec![1, 2, 1, 0]);
        assert_eq!(out.monthly_totals[0].month, YearMonth { year: 2019, month: 2 });
    }

    #[test]
    fn validation_outside_calendar_is_config_error() {
        let cfg = PipelineConfig {
            validation: ValidationMonth::At(YearMonth { year: 2017, month: 1 }),
            ..config()
        };
        assert!(matches!(run(&cfg, &inputs()), Err(PipelineError::Config(_))));
    }
}
