//! Ordinary least squares slope over evenly spaced points.
//!
//! The lag-trend feature fits a line through each row's lag window with
//! x = 0, 1, ..., n-1. For fixed x the normal equations reduce to a closed
//! form, so no matrix is built per row.

/// Slope of the OLS line through `(i, values[i])`.
///
/// Fewer than two points carry no slope and yield 0.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;
    let (sxy, sxx) = values.iter().enumerate().fold((0.0_f64, 0.0_f64), |(sxy, sxx), (i, &y)| {
        let dx = i as f64 - x_mean;
        (sxy + dx * (y - y_mean), sxx + dx * dx)
    });
    sxy / sxx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_of_exact_line() {
        // y = 2 + 3x on x = [0, 1, 2]
        assert!((linear_slope(&[2.0, 5.0, 8.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn slope_of_noisy_line() {
        // Least squares slope of [1, 3, 2, 6] over x = 0..4 is 1.4.
        assert!((linear_slope(&[1.0, 3.0, 2.0, 6.0]) - 1.4).abs() < 1e-10);
        assert!(linear_slope(&[4.0, 4.0, 4.0]).abs() < 1e-10);
        assert_eq!(linear_slope(&[5.0]), 0.0);
        assert_eq!(linear_slope(&[]), 0.0);
    }
}
