//! Shared domain types.
//!
//! Records move through the pipeline by value: each stage consumes the
//! previous stage's output and returns a complete replacement. The types here
//! are the vocabulary those stages share:
//!
//! - raw input rows (`Transaction`, `ItemCatalogEntry`, `CategoryInfo`, `TestPair`)
//! - per-transaction derivations (`JoinedRecord`, `FeaturedRecord`)
//! - month-level grid rows (`MonthlyGridRow`, `FilledRow`)
//! - model-facing rows (`WindowedRow`) and the run configuration

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub type ShopId = u32;
pub type ItemId = u32;
pub type CategoryId = i32;

/// Zero-based month index counted from the calendar start month.
pub type Block = u32;

/// Category id used for items that no reference table can resolve.
pub const UNKNOWN_CATEGORY: CategoryId = -1;

/// Name of the label column in train/validation outputs.
pub const LABEL_COLUMN: &str = "item_cnt_month";

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Absolute month count, used for month arithmetic.
    fn index(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    /// Signed number of months from `earlier` to `self`.
    pub fn months_since(self, earlier: YearMonth) -> i64 {
        self.index() - earlier.index()
    }

    pub fn plus_months(self, n: i64) -> Self {
        let idx = self.index() + n;
        Self {
            year: idx.div_euclid(12) as i32,
            month: (idx.rem_euclid(12) + 1) as u32,
        }
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn days_in_month(self) -> u32 {
        match self.month {
            4 | 6 | 9 | 11 => 30,
            2 if is_leap_year(self.year) => 29,
            2 => 28,
            _ => 31,
        }
    }
}

fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Accepts `YYYY-MM` or `YYYY/MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (y, m) = s
            .split_once(['-', '/'])
            .ok_or_else(|| format!("Invalid month '{s}'. Expected YYYY-MM."))?;
        let year = y
            .parse::<i32>()
            .map_err(|_| format!("Invalid year in '{s}'. Expected YYYY-MM."))?;
        let month = m
            .parse::<u32>()
            .map_err(|_| format!("Invalid month in '{s}'. Expected YYYY-MM."))?;
        YearMonth::new(year, month).ok_or_else(|| format!("Month out of range in '{s}' (1..=12)."))
    }
}

/// One raw sale event (negative counts are returns).
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub shop_id: ShopId,
    pub item_id: ItemId,
    pub item_price: f64,
    pub item_cnt_day: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemCatalogEntry {
    pub item_id: ItemId,
    pub item_name: String,
    pub item_category_id: CategoryId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryInfo {
    pub item_category_id: CategoryId,
    pub category_name: String,
}

/// A (shop, item) combination the model must predict for the target month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestPair {
    pub shop_id: ShopId,
    pub item_id: ItemId,
}

/// A transaction enriched with its month block and category.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRecord {
    pub date: NaiveDate,
    pub date_block_num: Block,
    pub shop_id: ShopId,
    pub item_id: ItemId,
    pub item_price: f64,
    pub item_cnt_day: f64,
    pub item_category_id: CategoryId,
    pub category_name: Arc<str>,
}

/// A joined record plus its row-level derived columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturedRecord {
    pub record: JoinedRecord,
    pub revenue: f64,
    pub price_bucket: u8,
    pub category_group_id: CategoryId,
}

/// One cell of the shop×item×month grid before filling.
///
/// Attributes are `None` where the month had no sale.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyGridRow {
    pub shop_id: ShopId,
    pub item_id: ItemId,
    pub date_block_num: Block,
    pub item_cnt_month: f64,
    pub revenue_month: f64,
    pub transactions: u32,
    pub item_price: Option<f64>,
    pub item_category_id: Option<CategoryId>,
    pub category_group_id: Option<CategoryId>,
    /// `false` for pairs that only appear in the test specification.
    pub has_history: bool,
}

/// A grid cell after missing values and derived features were filled.
#[derive(Debug, Clone, PartialEq)]
pub struct FilledRow {
    pub shop_id: ShopId,
    pub item_id: ItemId,
    pub date_block_num: Block,
    pub item_cnt_month: f64,
    pub revenue_month: f64,
    pub transactions: u32,
    /// Last known monthly price as of this month (0 before the first sale).
    pub item_price: f64,
    pub item_category_id: CategoryId,
    pub category_group_id: CategoryId,
    pub has_history: bool,
}

/// One model-facing row: features for a (shop, item, target month).
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedRow {
    pub shop_id: ShopId,
    pub item_id: ItemId,
    /// Target month.
    pub date_block_num: Block,
    pub item_category_id: CategoryId,
    pub category_group_id: CategoryId,
    /// Price as of the month before the target.
    pub item_price: f64,
    pub price_bucket: u8,
    /// `lags[j]` is the unit count `j + 1` months before the target.
    pub lags: Vec<f64>,
    pub trend: Vec<f64>,
    pub calendar: Vec<f64>,
    /// Target month unit count; `None` for test rows.
    pub label: Option<f64>,
}

/// Which month (if any) is held out for validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMonth {
    /// No validation split; every historical target goes to train.
    Disabled,
    /// The month right before the predict month.
    LastHistorical,
    At(YearMonth),
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Number of lag months per row (k).
    pub lag_depth: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub predict: YearMonth,
    pub validation: ValidationMonth,
    /// Upper edges of the price buckets (strictly increasing).
    pub price_edges: Vec<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lag_depth: 12,
            start_date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap_or_default(),
            predict: YearMonth { year: 2019, month: 12 },
            validation: ValidationMonth::LastHistorical,
            price_edges: vec![100.0, 300.0, 1000.0, 3000.0, 10000.0],
        }
    }
}

/// Column layout shared by the train, validation and test outputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSchema {
    pub key_columns: Vec<String>,
    pub feature_columns: Vec<String>,
    pub label_column: String,
}

impl DatasetSchema {
    /// All column names of a labelled dataset, in output order.
    pub fn columns(&self, with_label: bool) -> Vec<String> {
        let mut out = self.key_columns.clone();
        out.extend(self.feature_columns.iter().cloned());
        if with_label {
            out.push(self.label_column.clone());
        }
        out
    }
}
