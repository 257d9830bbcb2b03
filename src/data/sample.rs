//! Synthetic shop/item sales generation.
//!
//! Produces a complete, internally consistent input set (sales, items,
//! categories, test pairs) so the pipeline can be exercised without real data.
//!
//! Model:
//! - every (shop, item) pair gets a daily demand rate drawn once
//! - daily unit counts are Poisson with that rate
//! - prices are a log-normal base per item with small per-sale noise
//! - a few sales are followed by a one-unit return
//! - the last `test_only_items` catalog items never sell but appear in the
//!   test pairs, like newly listed products

use chrono::{Months, NaiveDate};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{LogNormal, Normal, Poisson};

use crate::domain::{CategoryInfo, ItemCatalogEntry, TestPair, Transaction};
use crate::error::PipelineError;
use crate::io::ingest::PipelineInputs;

const CATEGORY_NAMES: [&str; 6] = [
    "Books - Audio",
    "Books - Print",
    "Games - PC",
    "Games - PS4",
    "Movies - DVD",
    "Music - CD",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub seed: u64,
    pub shops: u32,
    pub items: u32,
    /// Catalog items (counted in `items`) without any sales.
    pub test_only_items: u32,
    pub start: NaiveDate,
    /// Months of sales history, starting at `start`.
    pub months: u32,
    /// Upper bound of the per-pair mean daily units.
    pub max_daily_rate: f64,
    /// Probability that a sale is followed by a return.
    pub return_prob: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            shops: 4,
            items: 30,
            test_only_items: 3,
            start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            months: 23,
            max_daily_rate: 0.6,
            return_prob: 0.02,
        }
    }
}

pub fn generate_sample(config: &SampleConfig) -> Result<PipelineInputs, PipelineError> {
    if config.shops == 0 || config.items == 0 || config.months == 0 {
        return Err(PipelineError::config("sample needs at least one shop, item and month"));
    }
    if config.test_only_items >= config.items {
        return Err(PipelineError::config("test-only items must leave at least one item with sales"));
    }
    if !(config.max_daily_rate.is_finite() && config.max_daily_rate > 0.0) {
        return Err(PipelineError::config("max daily rate must be finite and > 0"));
    }
    if !(0.0..1.0).contains(&config.return_prob) {
        return Err(PipelineError::config("return probability must be in [0, 1)"));
    }
    let end = config
        .start
        .checked_add_months(Months::new(config.months))
        .ok_or_else(|| PipelineError::config("sample date range overflows the calendar"))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let price_dist =
        LogNormal::new(5.5, 1.0).map_err(|e| PipelineError::Invariant(format!("price distribution: {e}")))?;
    let noise: Normal<f64> = Normal::new(0.0, 0.03).map_err(|e| PipelineError::Invariant(format!("noise distribution: {e}")))?;

    let categories: Vec<CategoryInfo> = CATEGORY_NAMES
        .iter()
        .enumerate()
        .map(|(id, name)| CategoryInfo {
            item_category_id: id as i32,
            category_name: (*name).to_string(),
        })
        .collect();

    let mut items = Vec::with_capacity(config.items as usize);
    let mut base_prices = Vec::with_capacity(config.items as usize);
    for item_id in 0..config.items {
        let category = rng.gen_range(0..categories.len());
        items.push(ItemCatalogEntry {
            item_id,
            item_name: format!("{} #{item_id}", CATEGORY_NAMES[category]),
            item_category_id: category as i32,
        });
        base_prices.push(round_cents(price_dist.sample(&mut rng)));
    }

    let selling_items = config.items - config.test_only_items;
    let mut sales = Vec::new();
    for shop_id in 0..config.shops {
        for item_id in 0..selling_items {
            let rate = config.max_daily_rate * rng.gen_range(0.05..=1.0);
            let demand = Poisson::new(rate)
                .map_err(|e| PipelineError::Invariant(format!("demand distribution: {e}")))?;
            let base = base_prices[item_id as usize];

            let mut date = config.start;
            while date < end {
                let units: f64 = demand.sample(&mut rng);
                if units > 0.0 {
                    let price = round_cents(base * (1.0 + noise.sample(&mut rng)).max(0.5));
                    sales.push(Transaction {
                        date,
                        shop_id,
                        item_id,
                        item_price: price,
                        item_cnt_day: units,
                    });
                    if rng.gen_bool(config.return_prob) {
                        sales.push(Transaction {
                            date,
                            shop_id,
                            item_id,
                            item_price: price,
                            item_cnt_day: -1.0,
                        });
                    }
                }
                date = match date.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
            }
        }
    }
    sales.sort_by_key(|t| (t.date, t.shop_id, t.item_id));

    let test = (0..config.shops)
        .flat_map(|shop_id| (0..config.items).map(move |item_id| TestPair { shop_id, item_id }))
        .collect();

    Ok(PipelineInputs {
        sales,
        items,
        categories,
        test,
    })
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
