//! Dense shop×item×month grid construction.
//!
//! The grid is the cross product of every (shop, item) pair seen in sales or
//! required by the test specification with every month from the first sale
//! through the predict month. Months without sales are explicit zero rows.
//!
//! Layout: rows are stored pair-major in one `Vec`, so the row of pair `p` at
//! block `b` lives at `p * n_months + (b - first_block)`. Stages that work per
//! pair walk `chunks_exact(n_months)` instead of re-grouping.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::ops::RangeInclusive;

use tracing::{debug, info};

use crate::domain::{Block, CategoryId, FeaturedRecord, ItemId, MonthlyGridRow, ShopId, TestPair};
use crate::error::PipelineError;

/// A pair-major grid of rows of type `R`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<R> {
    /// Sorted, unique.
    pub(crate) pairs: Vec<(ShopId, ItemId)>,
    pub(crate) first_block: Block,
    pub(crate) n_months: usize,
    pub(crate) rows: Vec<R>,
}

/// Grid straight out of `CatalogCompleter`.
pub type CatalogGrid = Grid<MonthlyGridRow>;

impl<R> Grid<R> {
    pub fn pairs(&self) -> &[(ShopId, ItemId)] {
        &self.pairs
    }

    pub fn months(&self) -> RangeInclusive<Block> {
        self.first_block..=self.last_block()
    }

    pub fn first_block(&self) -> Block {
        self.first_block
    }

    pub fn last_block(&self) -> Block {
        self.first_block + self.n_months as Block - 1
    }

    pub fn n_months(&self) -> usize {
        self.n_months
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn pair_index(&self, shop_id: ShopId, item_id: ItemId) -> Option<usize> {
        self.pairs.binary_search(&(shop_id, item_id)).ok()
    }

    /// All months of one pair, ordered by block.
    pub fn pair_rows(&self, pair_idx: usize) -> &[R] {
        let start = pair_idx * self.n_months;
        &self.rows[start..start + self.n_months]
    }

    pub(crate) fn pair_rows_mut(&mut self, pair_idx: usize) -> &mut [R] {
        let start = pair_idx * self.n_months;
        &mut self.rows[start..start + self.n_months]
    }

    /// Row of a pair at a block, `None` outside the month axis.
    pub fn row(&self, pair_idx: usize, block: Block) -> Option<&R> {
        let offset = block.checked_sub(self.first_block)? as usize;
        (offset < self.n_months).then(|| &self.pair_rows(pair_idx)[offset])
    }

    /// Replace every row while keeping the layout.
    pub(crate) fn map_rows<S>(self, rows: Vec<S>) -> Result<Grid<S>, PipelineError> {
        if rows.len() != self.rows.len() {
            return Err(PipelineError::Invariant(format!(
                "grid row count changed from {} to {}",
                self.rows.len(),
                rows.len()
            )));
        }
        Ok(Grid {
            pairs: self.pairs,
            first_block: self.first_block,
            n_months: self.n_months,
            rows,
        })
    }
}

#[derive(Debug, Default)]
struct MonthAgg {
    units: f64,
    revenue: f64,
    transactions: u32,
    price_sum: f64,
    category_id: CategoryId,
    group_id: CategoryId,
}

/// Expands featured transactions into the dense monthly grid.
pub struct CatalogCompleter {
    predict_block: Block,
}

impl CatalogCompleter {
    pub fn new(predict_block: Block) -> Self {
        Self { predict_block }
    }

    pub fn complete(&self, records: &[FeaturedRecord], test: &[TestPair]) -> Result<CatalogGrid, PipelineError> {
        let first_block = records
            .iter()
            .map(|r| r.record.date_block_num)
            .min()
            .ok_or_else(|| PipelineError::schema("sales", "no transactions to build the grid from"))?;
        if let Some(late) = records.iter().find(|r| r.record.date_block_num >= self.predict_block) {
            return Err(PipelineError::config(format!(
                "transaction in block {} is not before the predict block {}",
                late.record.date_block_num, self.predict_block
            )));
        }
        let n_months = (self.predict_block - first_block + 1) as usize;

        // One pass over transactions: (shop, item, block) -> monthly aggregate.
        let mut aggs: HashMap<(ShopId, ItemId, Block), MonthAgg> = HashMap::new();
        for f in records {
            let r = &f.record;
            let agg = aggs.entry((r.shop_id, r.item_id, r.date_block_num)).or_default();
            agg.units += r.item_cnt_day;
            agg.revenue += f.revenue;
            agg.transactions += 1;
            agg.price_sum += r.item_price;
            agg.category_id = r.item_category_id;
            agg.group_id = f.category_group_id;
        }

        let history: HashSet<(ShopId, ItemId)> = aggs.keys().map(|&(s, i, _)| (s, i)).collect();
        let pairs: Vec<(ShopId, ItemId)> = history
            .iter()
            .copied()
            .chain(test.iter().map(|p| (p.shop_id, p.item_id)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut rows = Vec::with_capacity(pairs.len() * n_months);
        for &(shop_id, item_id) in &pairs {
            let has_history = history.contains(&(shop_id, item_id));
            for offset in 0..n_months {
                let block = first_block + offset as Block;
                let row = match aggs.get(&(shop_id, item_id, block)) {
                    Some(agg) => MonthlyGridRow {
                        shop_id,
                        item_id,
                        date_block_num: block,
                        item_cnt_month: agg.units,
                        revenue_month: agg.revenue,
                        transactions: agg.transactions,
                        item_price: Some(agg.price_sum / f64::from(agg.transactions)),
                        item_category_id: Some(agg.category_id),
                        category_group_id: Some(agg.group_id),
                        has_history,
                    },
                    None => MonthlyGridRow {
                        shop_id,
                        item_id,
                        date_block_num: block,
                        item_cnt_month: 0.0,
                        revenue_month: 0.0,
                        transactions: 0,
                        item_price: None,
                        item_category_id: None,
                        category_group_id: None,
                        has_history,
                    },
                };
                rows.push(row);
            }
        }

        if rows.len() != pairs.len() * n_months {
            return Err(PipelineError::Invariant(format!(
                "grid has {} rows, expected {} pairs x {} months",
                rows.len(),
                pairs.len(),
                n_months
            )));
        }

        debug!(cells_with_sales = aggs.len(), "aggregated monthly sales");
        info!(
            pairs = pairs.len(),
            history_pairs = history.len(),
            months = n_months,
            rows = rows.len(),
            "completed catalog grid"
        );

        Ok(Grid {
            pairs,
            first_block,
            n_months,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::JoinedRecord;

    fn featured(shop_id: ShopId, item_id: ItemId, block: Block, cnt: f64, price: f64) -> FeaturedRecord {
        FeaturedRecord {
            record: JoinedRecord {
                date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
                date_block_num: block,
                shop_id,
                item_id,
                item_price: price,
                item_cnt_day: cnt,
                item_category_id: 3,
                category_name: Arc::from("Games - PS4"),
            },
            revenue: price * cnt,
            price_bucket: 0,
            category_group_id: 0,
        }
    }

    #[test]
    fn grid_is_dense_and_unique() {
        let records = vec![
            featured(0, 10, 1, 1.0, 10.0),
            featured(0, 10, 1, 2.0, 20.0),
            featured(1, 20, 3, 5.0, 10.0),
            featured(0, 20, 2, -1.0, 10.0),
        ];
        let test = vec![TestPair { shop_id: 1, item_id: 10 }, TestPair { shop_id: 0, item_id: 10 }];
        let grid = CatalogCompleter::new(4).complete(&records, &test).unwrap();

        // pairs: (0,10), (0,20), (1,10), (1,20); months 1..=4
        assert_eq!(grid.pairs().len(), 4);
        assert_eq!(grid.months(), 1..=4);
        assert_eq!(grid.len(), 16);

        let keys: HashSet<_> = grid
            .rows()
            .iter()
            .map(|r| (r.shop_id, r.item_id, r.date_block_num))
            .collect();
        assert_eq!(keys.len(), 16);

        let p = grid.pair_index(0, 10).unwrap();
        let cell = grid.row(p, 1).unwrap();
        assert_eq!(cell.item_cnt_month, 3.0);
        assert_eq!(cell.transactions, 2);
        assert_eq!(cell.item_price, Some(15.0));
        assert_eq!(cell.revenue_month, 50.0);

        let gap = grid.row(p, 2).unwrap();
        assert_eq!(gap.item_cnt_month, 0.0);
        assert_eq!(gap.item_price, None);

        let ret = grid.row(grid.pair_index(0, 20).unwrap(), 2).unwrap();
        assert_eq!(ret.item_cnt_month, -1.0);
    }

    #[test]
    fn test_only_pairs_have_no_history() {
        let records = vec![featured(0, 10, 0, 1.0, 10.0)];
        let test = vec![TestPair { shop_id: 5, item_id: 50 }];
        let grid = CatalogCompleter::new(2).complete(&records, &test).unwrap();
        let idx = grid.pair_index(5, 50).unwrap();
        assert!(grid.pair_rows(idx).iter().all(|r| !r.has_history && r.item_cnt_month == 0.0));
        assert!(grid.pair_rows(grid.pair_index(0, 10).unwrap()).iter().all(|r| r.has_history));
    }

    #[test]
    fn empty_sales_is_an_error() {
        assert!(CatalogCompleter::new(2).complete(&[], &[]).is_err());
    }

    #[test]
    fn row_lookup_outside_axis_is_none() {
        let grid = CatalogCompleter::new(3).complete(&[featured(0, 10, 1, 1.0, 1.0)], &[]).unwrap();
        assert!(grid.row(0, 0).is_none());
        assert!(grid.row(0, 4).is_none());
        assert!(grid.row(0, 3).is_some());
    }
}
