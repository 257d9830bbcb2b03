//! Fill derived features along each pair's month axis.
//!
//! - price: causal forward fill (a month never sees a later month's price);
//!   months before the first sale get 0
//! - category and category group: time-invariant, taken from any month

use tracing::info;

use crate::domain::{CategoryId, FilledRow, MonthlyGridRow};
use crate::error::PipelineError;
use crate::stages::catalog::Grid;
use crate::stages::missing::DefaultedGrid;

/// Fully filled grid: no unset attribute remains.
pub type FilledGrid = Grid<FilledRow>;

pub struct FeatureFiller;

impl FeatureFiller {
    pub fn fill(&self, grid: DefaultedGrid) -> Result<FilledGrid, PipelineError> {
        let grid = grid.into_grid();
        let n_months = grid.n_months();
        let mut rows = Vec::with_capacity(grid.len());
        let mut forward_filled = 0usize;

        for pair_rows in grid.rows().chunks_exact(n_months) {
            let (category_id, group_id) = invariant_attributes(pair_rows)?;
            let mut last_price: Option<f64> = None;

            for row in pair_rows {
                if row.item_price.is_some() {
                    last_price = row.item_price;
                } else if last_price.is_some() {
                    forward_filled += 1;
                }
                rows.push(FilledRow {
                    shop_id: row.shop_id,
                    item_id: row.item_id,
                    date_block_num: row.date_block_num,
                    item_cnt_month: row.item_cnt_month,
                    revenue_month: row.revenue_month,
                    transactions: row.transactions,
                    item_price: last_price.unwrap_or(0.0),
                    item_category_id: category_id,
                    category_group_id: group_id,
                    has_history: row.has_history,
                });
            }
        }

        info!(rows = rows.len(), forward_filled, "filled grid features");
        grid.map_rows(rows)
    }
}

fn invariant_attributes(pair_rows: &[MonthlyGridRow]) -> Result<(CategoryId, CategoryId), PipelineError> {
    let category_id = pair_rows.iter().find_map(|r| r.item_category_id);
    let group_id = pair_rows.iter().find_map(|r| r.category_group_id);
    match (category_id, group_id) {
        (Some(c), Some(g)) => Ok((c, g)),
        _ => {
            let (shop, item) = pair_rows
                .first()
                .map(|r| (r.shop_id, r.item_id))
                .unwrap_or_default();
            Err(PipelineError::Invariant(format!(
                "pair (shop {shop}, item {item}) has no category after defaults were applied"
            )))
        }
    }
}
