//! Trend summaries over each row's own lag window.
//!
//! The summary is a pluggable strategy. Train and test rows go through the
//! same `apply` call, so both splits always see identical feature columns
//! computed by identical code.

use tracing::info;

use crate::domain::WindowedRow;
use crate::error::PipelineError;
use crate::math::linear_slope;

/// A feature that depends only on values already present in the row.
pub trait WindowFeature {
    fn names(&self) -> Vec<String>;
    fn compute(&self, row: &WindowedRow) -> Vec<f64>;
}

/// Mean, OLS slope, min and max of the lag window.
///
/// The slope is fitted over lags ordered oldest to newest, so a rising
/// series has a positive slope.
#[derive(Debug, Clone, Copy, Default)]
pub struct LagTrend;

impl WindowFeature for LagTrend {
    fn names(&self) -> Vec<String> {
        ["lag_mean", "lag_slope", "lag_min", "lag_max"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn compute(&self, row: &WindowedRow) -> Vec<f64> {
        let lags = &row.lags;
        if lags.is_empty() {
            return vec![0.0; 4];
        }
        let mean = lags.iter().sum::<f64>() / lags.len() as f64;
        let chronological: Vec<f64> = lags.iter().rev().copied().collect();
        let min = lags.iter().copied().fold(f64::INFINITY, f64::min);
        let max = lags.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        vec![mean, linear_slope(&chronological), min, max]
    }
}

pub struct TrendFeatureGenerator {
    strategy: Box<dyn WindowFeature>,
}

impl Default for TrendFeatureGenerator {
    fn default() -> Self {
        Self::new(Box::new(LagTrend))
    }
}

impl TrendFeatureGenerator {
    pub fn new(strategy: Box<dyn WindowFeature>) -> Self {
        Self { strategy }
    }

    pub fn names(&self) -> Vec<String> {
        self.strategy.names()
    }

    pub fn apply(&self, train: &mut [WindowedRow], test: &mut [WindowedRow]) -> Result<(), PipelineError> {
        let width = self.strategy.names().len();
        for row in train.iter_mut().chain(test.iter_mut()) {
            let values = self.strategy.compute(row);
            if values.len() != width {
                return Err(PipelineError::Invariant(format!(
                    "trend strategy produced {} values for {} columns",
                    values.len(),
                    width
                )));
            }
            row.trend = values;
        }
        info!(columns = width, rows = train.len() + test.len(), "added trend features");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(lags: Vec<f64>, label: Option<f64>) -> WindowedRow {
        WindowedRow {
            shop_id: 0,
            item_id: 1,
            date_block_num: 5,
            item_category_id: 0,
            category_group_id: 0,
            item_price: 10.0,
            price_bucket: 0,
            lags,
            trend: Vec::new(),
            calendar: Vec::new(),
            label,
        }
    }

    #[test]
    fn lag_trend_reads_lags_oldest_to_newest() {
        // lag_1 = 6 is the most recent month: the series rises.
        let values = LagTrend.compute(&row(vec![6.0, 4.0, 2.0], None));
        assert_eq!(values[0], 4.0);
        assert!((values[1] - 2.0).abs() < 1e-10);
        assert_eq!(values[2], 2.0);
        assert_eq!(values[3], 6.0);
    }

    #[test]
    fn single_lag_has_zero_slope() {
        let values = LagTrend.compute(&row(vec![3.0], None));
        assert_eq!(values, vec![3.0, 0.0, 3.0, 3.0]);
    }

    #[test]
    fn train_and_test_rows_get_identical_features_for_identical_windows() {
        let generator = TrendFeatureGenerator::default();
        let mut train = vec![row(vec![1.0, 0.0, 5.0], Some(2.0))];
        let mut test = vec![row(vec![1.0, 0.0, 5.0], None)];
        generator.apply(&mut train, &mut test).unwrap();
        assert_eq!(train[0].trend, test[0].trend);
        assert_eq!(train[0].trend.len(), generator.names().len());
    }

    struct Broken;

    impl WindowFeature for Broken {
        fn names(&self) -> Vec<String> {
            vec!["a".into(), "b".into()]
        }

        fn compute(&self, _row: &WindowedRow) -> Vec<f64> {
            vec![1.0]
        }
    }

    #[test]
    fn strategy_width_mismatch_is_invariant_error() {
        let generator = TrendFeatureGenerator::new(Box::new(Broken));
        let mut train = vec![row(vec![1.0], Some(1.0))];
        let err = generator.apply(&mut train, &mut []).unwrap_err();
        assert!(matches!(err, PipelineError::Invariant(_)));
    }
}
