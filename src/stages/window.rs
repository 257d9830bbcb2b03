//! Sliding-window lag rows.
//!
//! For a target month `t` a row carries `lag_j = item_cnt_month(t - j)` for
//! `j = 1..=k`, plus the price and price bucket as of `t - 1`. Nothing at
//! month `t` or later is read for features; month `t` only provides the
//! label. Lags that fall before the grid's first month are 0, the same
//! convention the grid uses for months without sales.
//!
//! Train rows exist for every grid pair and every target `k <= t < predict`;
//! test rows exist for each test pair at the predict month and carry no label.

use std::collections::BTreeSet;

use tracing::info;

use crate::domain::{Block, FilledRow, TestPair, WindowedRow};
use crate::error::PipelineError;
use crate::stages::features::PriceBuckets;
use crate::stages::fill::FilledGrid;

/// Train-context and test rows before trend/calendar enrichment.
#[derive(Debug, Clone, Default)]
pub struct WindowedDatasets {
    pub train: Vec<WindowedRow>,
    pub test: Vec<WindowedRow>,
    /// Target months present in `train`, ascending.
    pub train_targets: Vec<Block>,
}

pub struct SlidingWindowDatasetBuilder<'a> {
    lag_depth: usize,
    buckets: &'a PriceBuckets,
}

impl<'a> SlidingWindowDatasetBuilder<'a> {
    pub fn new(lag_depth: usize, buckets: &'a PriceBuckets) -> Result<Self, PipelineError> {
        if lag_depth == 0 {
            return Err(PipelineError::config("lag depth must be >= 1"));
        }
        Ok(Self { lag_depth, buckets })
    }

    /// Lag column names, `lag_1` (most recent) first.
    pub fn lag_names(&self) -> Vec<String> {
        (1..=self.lag_depth).map(|j| format!("lag_{j}")).collect()
    }

    pub fn build(&self, grid: &FilledGrid, test: &[TestPair]) -> Result<WindowedDatasets, PipelineError> {
        let predict_block = grid.last_block();
        let train_targets: Vec<Block> = grid
            .months()
            .filter(|&t| t < predict_block && t as usize >= self.lag_depth)
            .collect();
        if train_targets.is_empty() {
            return Err(PipelineError::config(format!(
                "lag depth {} leaves no training month: history covers blocks {}..{}",
                self.lag_depth,
                grid.first_block(),
                predict_block
            )));
        }

        let mut train = Vec::with_capacity(grid.pairs().len() * train_targets.len());
        for pair_idx in 0..grid.pairs().len() {
            let rows = grid.pair_rows(pair_idx);
            for &target in &train_targets {
                train.push(self.window_row(rows, grid.first_block(), target, true));
            }
        }

        let unique: BTreeSet<&TestPair> = test.iter().collect();
        let mut test_rows = Vec::with_capacity(unique.len());
        for pair in unique {
            let pair_idx = grid.pair_index(pair.shop_id, pair.item_id).ok_or_else(|| {
                PipelineError::schema(
                    "grid",
                    format!("test pair (shop {}, item {}) is absent from the grid", pair.shop_id, pair.item_id),
                )
            })?;
            test_rows.push(self.window_row(grid.pair_rows(pair_idx), grid.first_block(), predict_block, false));
        }

        info!(
            lag_depth = self.lag_depth,
            train_rows = train.len(),
            test_rows = test_rows.len(),
            targets = train_targets.len(),
            "built sliding-window rows"
        );
        Ok(WindowedDatasets {
            train,
            test: test_rows,
            train_targets,
        })
    }

    /// One row for `target` from a pair's month slice starting at `first_block`.
    fn window_row(&self, rows: &[FilledRow], first_block: Block, target: Block, labelled: bool) -> WindowedRow {
        let at = |block: Option<Block>| -> Option<&FilledRow> {
            let offset = block?.checked_sub(first_block)? as usize;
            rows.get(offset)
        };

        let lags = (1..=self.lag_depth as Block)
            .map(|j| at(target.checked_sub(j)).map_or(0.0, |r| r.item_cnt_month))
            .collect();
        let prev = at(target.checked_sub(1));
        let item_price = prev.map_or(0.0, |r| r.item_price);
        // Category attributes are the same in every month of a pair.
        let reference = &rows[0];

        WindowedRow {
            shop_id: reference.shop_id,
            item_id: reference.item_id,
            date_block_num: target,
            item_category_id: reference.item_category_id,
            category_group_id: reference.category_group_id,
            item_price,
            price_bucket: self.buckets.bucket(item_price),
            lags,
            trend: Vec::new(),
            calendar: Vec::new(),
            label: if labelled {
                at(Some(target)).map(|r| r.item_cnt_month)
            } else {
                None
            },
        }
    }
}
