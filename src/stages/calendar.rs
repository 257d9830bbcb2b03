//! Month calendar and calendar-derived features.
//!
//! `MonthCalendar` is the single date ↔ `date_block_num` mapping of a run: it
//! is built once from the configured range and predict month, used by the
//! joiner to place transactions on the time axis, and reused here to key
//! calendar features by block.
//!
//! The feature set itself is a strategy (`CalendarFeature`) so the default
//! columns can be swapped without touching the pipeline.

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::info;

use crate::domain::{Block, WindowedRow, YearMonth};
use crate::error::PipelineError;

/// Maps calendar months in `[start, end]` to zero-based blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCalendar {
    start: YearMonth,
    end: YearMonth,
    predict: YearMonth,
}

impl MonthCalendar {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, predict: YearMonth) -> Result<Self, PipelineError> {
        if start_date > end_date {
            return Err(PipelineError::config(format!(
                "calendar start {start_date} is after calendar end {end_date}"
            )));
        }
        let start = YearMonth::of(start_date);
        let end = YearMonth::of(end_date);
        if predict < start || predict > end {
            return Err(PipelineError::config(format!(
                "predict month {predict} is outside the calendar range {start}..={end}"
            )));
        }
        if predict == start {
            return Err(PipelineError::config(format!(
                "predict month {predict} leaves no history before it (calendar starts {start})"
            )));
        }
        Ok(Self { start, end, predict })
    }

    pub fn start(&self) -> YearMonth {
        self.start
    }

    pub fn end(&self) -> YearMonth {
        self.end
    }

    pub fn predict(&self) -> YearMonth {
        self.predict
    }

    /// Number of months in the range.
    pub fn len(&self) -> usize {
        (self.end.months_since(self.start) + 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn predict_block(&self) -> Block {
        self.predict.months_since(self.start) as Block
    }

    /// Block of a month, `None` outside the range.
    pub fn block_of(&self, month: YearMonth) -> Option<Block> {
        (month >= self.start && month <= self.end).then(|| month.months_since(self.start) as Block)
    }

    pub fn block_of_date(&self, date: NaiveDate) -> Option<Block> {
        self.block_of(YearMonth::of(date))
    }

    /// Calendar month of a block, `None` outside the range.
    pub fn month_of(&self, block: Block) -> Option<YearMonth> {
        ((block as usize) < self.len()).then(|| self.start.plus_months(i64::from(block)))
    }
}

/// Pluggable calendar feature set.
pub trait CalendarFeature {
    /// Column names, in the order `compute` returns values.
    fn names(&self) -> Vec<String>;

    fn compute(&self, month: YearMonth, calendar: &MonthCalendar) -> Vec<f64>;
}

/// Fixed-date public holidays used by `StandardCalendar::default()`.
pub const DEFAULT_HOLIDAYS: [(u32, u32); 10] = [
    (1, 1),
    (2, 11),
    (2, 23),
    (4, 29),
    (5, 3),
    (5, 4),
    (5, 5),
    (8, 11),
    (11, 3),
    (11, 23),
];

/// Default calendar features.
///
/// | column          | value                                         |
/// |-----------------|-----------------------------------------------|
/// | `month_of_year` | 1..=12                                        |
/// | `year_index`    | year minus the calendar start year            |
/// | `days_in_month` | 28..=31                                       |
/// | `weekend_days`  | Saturdays and Sundays in the month            |
/// | `holiday_days`  | configured `(month, day)` holidays in the month |
#[derive(Debug, Clone)]
pub struct StandardCalendar {
    holidays: Vec<(u32, u32)>,
}

impl StandardCalendar {
    pub fn with_holidays(holidays: Vec<(u32, u32)>) -> Self {
        Self { holidays }
    }
}

impl Default for StandardCalendar {
    fn default() -> Self {
        Self::with_holidays(DEFAULT_HOLIDAYS.to_vec())
    }
}

impl CalendarFeature for StandardCalendar {
    fn names(&self) -> Vec<String> {
        ["month_of_year", "year_index", "days_in_month", "weekend_days", "holiday_days"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn compute(&self, month: YearMonth, calendar: &MonthCalendar) -> Vec<f64> {
        let days = month.days_in_month();
        let weekend_days = month
            .first_day()
            .map(|first| {
                first
                    .iter_days()
                    .take(days as usize)
                    .filter(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
                    .count()
            })
            .unwrap_or(0);
        let holiday_days = self
            .holidays
            .iter()
            .filter(|&&(m, d)| m == month.month && d <= days)
            .count();

        vec![
            f64::from(month.month),
            f64::from(month.year - calendar.start().year),
            f64::from(days),
            weekend_days as f64,
            holiday_days as f64,
        ]
    }
}

/// Appends calendar features to windowed rows.
///
/// The per-block feature table is computed once at construction and shared
/// by train and test rows.
pub struct CalendarFeatureAdder {
    names: Vec<String>,
    table: Vec<Vec<f64>>,
}

impl CalendarFeatureAdder {
    pub fn new(calendar: &MonthCalendar, strategy: &dyn CalendarFeature) -> Self {
        let table = (0..calendar.len() as Block)
            .filter_map(|block| calendar.month_of(block))
            .map(|month| strategy.compute(month, calendar))
            .collect();
        Self {
            names: strategy.names(),
            table,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Features of one block, `None` outside the calendar.
    pub fn features(&self, block: Block) -> Option<&[f64]> {
        self.table.get(block as usize).map(Vec::as_slice)
    }

    /// Fill `calendar` on every train and test row.
    pub fn apply(&self, train: &mut [WindowedRow], test: &mut [WindowedRow]) -> Result<(), PipelineError> {
        for row in train.iter_mut().chain(test.iter_mut()) {
            let features = self.features(row.date_block_num).ok_or_else(|| {
                PipelineError::config(format!(
                    "target block {} is outside the configured calendar range",
                    row.date_block_num
                ))
            })?;
            row.calendar = features.to_vec();
        }
        info!(
            columns = self.names.len(),
            rows = train.len() + test.len(),
            "added calendar features"
        );
        Ok(())
    }
}
