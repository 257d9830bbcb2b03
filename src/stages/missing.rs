//! Defaults for test-only pairs.
//!
//! A pair listed in the test specification without any sales history has no
//! month from which price or category could be filled. Those pairs get
//! reference-table categories (or the `unknown` sentinel) and a zero price
//! instead of being dropped.

use std::collections::BTreeSet;

use tracing::info;

use crate::domain::{TestPair, UNKNOWN_CATEGORY};
use crate::error::PipelineError;
use crate::stages::catalog::CatalogGrid;
use crate::stages::features::CategoryRollup;
use crate::stages::join::ReferenceTables;

/// A grid whose test-only pairs carry explicit defaults.
///
/// Only `MissingValueFiller` can produce one, which pins the stage order:
/// the grid must already contain the test pairs.
#[derive(Debug, Clone)]
pub struct DefaultedGrid {
    grid: CatalogGrid,
    test_only_pairs: usize,
}

impl DefaultedGrid {
    pub fn grid(&self) -> &CatalogGrid {
        &self.grid
    }

    pub fn test_only_pairs(&self) -> usize {
        self.test_only_pairs
    }

    pub fn into_grid(self) -> CatalogGrid {
        self.grid
    }
}

pub struct MissingValueFiller<'a> {
    refs: &'a ReferenceTables,
    rollup: &'a CategoryRollup,
}

impl<'a> MissingValueFiller<'a> {
    pub fn new(refs: &'a ReferenceTables, rollup: &'a CategoryRollup) -> Self {
        Self { refs, rollup }
    }

    pub fn fill(&self, mut grid: CatalogGrid, test: &[TestPair]) -> Result<DefaultedGrid, PipelineError> {
        let unique: BTreeSet<&TestPair> = test.iter().collect();
        let mut test_only = 0usize;
        let mut unknown_items = 0usize;

        for pair in unique {
            let idx = grid.pair_index(pair.shop_id, pair.item_id).ok_or_else(|| {
                PipelineError::schema(
                    "grid",
                    format!(
                        "test pair (shop {}, item {}) is absent from the grid; it must be built with the test pairs",
                        pair.shop_id, pair.item_id
                    ),
                )
            })?;

            let rows = grid.pair_rows_mut(idx);
            if rows.iter().any(|r| r.has_history) {
                continue;
            }

            test_only += 1;
            let (category_id, group_id) = match self.refs.category_of_item(pair.item_id) {
                Some(c) => (c, self.rollup.group_of_category(c)),
                None => {
                    unknown_items += 1;
                    (UNKNOWN_CATEGORY, UNKNOWN_CATEGORY)
                }
            };
            for row in rows.iter_mut() {
                row.item_category_id.get_or_insert(category_id);
                row.category_group_id.get_or_insert(group_id);
                row.item_price.get_or_insert(0.0);
            }
        }

        info!(test_only_pairs = test_only, unknown_items, "filled defaults for pairs without history");
        Ok(DefaultedGrid {
            grid,
            test_only_pairs: test_only,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{CategoryInfo, FeaturedRecord, ItemCatalogEntry, JoinedRecord};
    use crate::stages::catalog::CatalogCompleter;

    fn setup() -> (ReferenceTables, CategoryRollup) {
        let categories = vec![
            CategoryInfo { item_category_id: 0, category_name: "Games - PS4".into() },
            CategoryInfo { item_category_id: 1, category_name: "Books".into() },
        ];
        let items = vec![
            ItemCatalogEntry { item_id: 10, item_name: "a".into(), item_category_id: 0 },
            ItemCatalogEntry { item_id: 30, item_name: "c".into(), item_category_id: 1 },
        ];
        let refs = ReferenceTables::build(&items, &categories).unwrap();
        let rollup = CategoryRollup::from_refs(&refs);
        (refs, rollup)
    }

    fn grid(test: &[TestPair]) -> CatalogGrid {
        let records = vec![FeaturedRecord {
            record: JoinedRecord {
                date: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
                date_block_num: 0,
                shop_id: 0,
                item_id: 10,
                item_price: 5.0,
                item_cnt_day: 1.0,
                item_category_id: 0,
                category_name: Arc::from("Games - PS4"),
            },
            revenue: 5.0,
            price_bucket: 0,
            category_group_id: 1,
        }];
        CatalogCompleter::new(2).complete(&records, test).unwrap()
    }

    #[test]
    fn test_only_pairs_get_catalog_or_sentinel_defaults() {
        let (refs, rollup) = setup();
        let test = vec![
            TestPair { shop_id: 0, item_id: 10 },
            TestPair { shop_id: 1, item_id: 30 },
            TestPair { shop_id: 1, item_id: 99 },
        ];
        let out = MissingValueFiller::new(&refs, &rollup).fill(grid(&test), &test).unwrap();
        assert_eq!(out.test_only_pairs(), 2);
        let g = out.grid();

        let known = g.pair_rows(g.pair_index(1, 30).unwrap());
        assert!(known.iter().all(|r| r.item_category_id == Some(1) && r.category_group_id == Some(0)));
        assert!(known.iter().all(|r| r.item_price == Some(0.0) && r.item_cnt_month == 0.0));

        let unknown = g.pair_rows(g.pair_index(1, 99).unwrap());
        assert!(unknown.iter().all(|r| r.item_category_id == Some(UNKNOWN_CATEGORY)));

        // Pairs with history are left for the causal filler.
        let hist = g.pair_rows(g.pair_index(0, 10).unwrap());
        assert_eq!(hist[1].item_price, None);
    }

    #[test]
    fn grid_without_test_pairs_is_schema_error() {
        let (refs, rollup) = setup();
        let test = vec![TestPair { shop_id: 7, item_id: 10 }];
        let err = MissingValueFiller::new(&refs, &rollup).fill(grid(&[]), &test).unwrap_err();
        assert!(matches!(err, PipelineError::Schema { table: "grid", .. }));
    }
}
