//! Row-level derived features.
//!
//! Each joined transaction gets:
//! - `revenue = item_price × item_cnt_day` (returns stay negative)
//! - a discrete price bucket
//! - its category group (the category rollup)

use std::collections::{BTreeSet, HashMap};

use tracing::info;

use crate::domain::{CategoryId, FeaturedRecord, JoinedRecord, UNKNOWN_CATEGORY};
use crate::error::PipelineError;
use crate::stages::join::ReferenceTables;

/// Price discretization by upper bucket edges.
///
/// With edges `[e0, e1, ..]`, bucket 0 is `price < e0`, bucket 1 is
/// `e0 <= price < e1`, and the last bucket holds everything above the
/// largest edge.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBuckets {
    edges: Vec<f64>,
}

impl PriceBuckets {
    pub fn new(edges: Vec<f64>) -> Result<Self, PipelineError> {
        if edges.len() > u8::MAX as usize {
            return Err(PipelineError::config("too many price bucket edges (max 255)"));
        }
        if edges.iter().any(|e| !e.is_finite() || *e <= 0.0) {
            return Err(PipelineError::config("price bucket edges must be finite and > 0"));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::config("price bucket edges must be strictly increasing"));
        }
        Ok(Self { edges })
    }

    pub fn bucket(&self, price: f64) -> u8 {
        self.edges.iter().position(|&edge| price < edge).unwrap_or(self.edges.len()) as u8
    }
}

/// Category → category group mapping.
///
/// The group of a category is the part of its name before the first `" - "`
/// (e.g. `"Games - PS4"` → `"Games"`). Group ids follow the sorted order of
/// the distinct group names.
#[derive(Debug, Clone, Default)]
pub struct CategoryRollup {
    group_ids: HashMap<String, CategoryId>,
    by_category: HashMap<CategoryId, CategoryId>,
}

impl CategoryRollup {
    pub fn from_refs(refs: &ReferenceTables) -> Self {
        let names: BTreeSet<&str> = refs.categories().map(|(_, name)| category_group(name)).collect();
        let group_ids: HashMap<String, CategoryId> = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (name.to_string(), idx as CategoryId))
            .collect();
        let by_category = refs
            .categories()
            .map(|(id, name)| (id, group_ids.get(category_group(name)).copied().unwrap_or(UNKNOWN_CATEGORY)))
            .collect();
        Self { group_ids, by_category }
    }

    /// Group id for a category name; `UNKNOWN_CATEGORY` when the group is not known.
    pub fn group_of_name(&self, category_name: &str) -> CategoryId {
        self.group_ids
            .get(category_group(category_name))
            .copied()
            .unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn group_of_category(&self, category_id: CategoryId) -> CategoryId {
        self.by_category.get(&category_id).copied().unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn len(&self) -> usize {
        self.group_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_ids.is_empty()
    }
}

/// Group part of a category name.
pub fn category_group(name: &str) -> &str {
    name.split(" - ").next().unwrap_or(name).trim()
}

/// Derives per-transaction features. Holds only immutable lookup tables, so
/// `generate` depends on nothing but the record it is given.
pub struct FeatureGenerator<'a> {
    buckets: &'a PriceBuckets,
    rollup: &'a CategoryRollup,
}

impl<'a> FeatureGenerator<'a> {
    pub fn new(buckets: &'a PriceBuckets, rollup: &'a CategoryRollup) -> Self {
        Self { buckets, rollup }
    }

    pub fn generate(&self, record: JoinedRecord) -> Result<FeaturedRecord, PipelineError> {
        if !record.item_price.is_finite() || record.item_price < 0.0 {
            return Err(PipelineError::schema(
                "sales",
                format!(
                    "item_price {} on {} (shop {}, item {}) must be finite and >= 0",
                    record.item_price, record.date, record.shop_id, record.item_id
                ),
            ));
        }
        if !record.item_cnt_day.is_finite() {
            return Err(PipelineError::schema(
                "sales",
                format!(
                    "item_cnt_day on {} (shop {}, item {}) must be finite",
                    record.date, record.shop_id, record.item_id
                ),
            ));
        }

        Ok(FeaturedRecord {
            revenue: record.item_price * record.item_cnt_day,
            price_bucket: self.buckets.bucket(record.item_price),
            category_group_id: self.rollup.group_of_name(&record.category_name),
            record,
        })
    }

    pub fn generate_all(&self, records: Vec<JoinedRecord>) -> Result<Vec<FeaturedRecord>, PipelineError> {
        let out = records
            .into_iter()
            .map(|r| self.generate(r))
            .collect::<Result<Vec<_>, _>>()?;
        info!(records = out.len(), groups = self.rollup.len(), "generated row features");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::{CategoryInfo, ItemCatalogEntry};

    fn rollup() -> CategoryRollup {
        let categories = vec![
            CategoryInfo { item_category_id: 0, category_name: "Games - PS4".into() },
            CategoryInfo { item_category_id: 1, category_name: "Games - PC".into() },
            CategoryInfo { item_category_id: 2, category_name: "Books".into() },
        ];
        let items = vec![ItemCatalogEntry { item_id: 1, item_name: "x".into(), item_category_id: 0 }];
        CategoryRollup::from_refs(&ReferenceTables::build(&items, &categories).unwrap())
    }

    fn record(price: f64, cnt: f64) -> JoinedRecord {
        JoinedRecord {
            date: NaiveDate::from_ymd_opt(2018, 1, 2).unwrap(),
            date_block_num: 0,
            shop_id: 1,
            item_id: 1,
            item_price: price,
            item_cnt_day: cnt,
            item_category_id: 0,
            category_name: Arc::from("Games - PS4"),
        }
    }

    #[test]
    fn price_buckets_use_upper_edges() {
        let b = PriceBuckets::new(vec![100.0, 1000.0]).unwrap();
        assert_eq!(b.bucket(0.0), 0);
        assert_eq!(b.bucket(99.99), 0);
        assert_eq!(b.bucket(100.0), 1);
        assert_eq!(b.bucket(5000.0), 2);
    }

    #[test]
    fn price_buckets_reject_unsorted_edges() {
        assert!(PriceBuckets::new(vec![100.0, 100.0]).is_err());
        assert!(PriceBuckets::new(vec![f64::NAN]).is_err());
    }

    #[test]
    fn rollup_groups_by_name_prefix() {
        let r = rollup();
        assert_eq!(r.len(), 2);
        // Sorted: "Books" = 0, "Games" = 1.
        assert_eq!(r.group_of_category(2), 0);
        assert_eq!(r.group_of_category(0), 1);
        assert_eq!(r.group_of_category(1), 1);
        assert_eq!(r.group_of_name("Movies - DVD"), UNKNOWN_CATEGORY);
    }

    #[test]
    fn returns_keep_negative_revenue() {
        let buckets = PriceBuckets::new(vec![100.0, 1000.0]).unwrap();
        let r = rollup();
        let fg = FeatureGenerator::new(&buckets, &r);
        let f = fg.generate(record(250.0, -2.0)).unwrap();
        assert_eq!(f.revenue, -500.0);
        assert_eq!(f.record.item_cnt_day, -2.0);
        assert_eq!(f.price_bucket, 1);
        assert_eq!(f.category_group_id, 1);
    }

    #[test]
    fn negative_price_is_schema_error() {
        let buckets = PriceBuckets::new(vec![100.0]).unwrap();
        let r = rollup();
        let fg = FeatureGenerator::new(&buckets, &r);
        assert!(matches!(fg.generate(record(-1.0, 1.0)), Err(PipelineError::Schema { .. })));
        assert!(matches!(fg.generate(record(1.0, f64::INFINITY)), Err(PipelineError::Schema { .. })));
    }
}
