//! Summary statistics used to standardize difference columns.
//!
//! All functions are pure and take the full column explicitly. Non-finite inputs propagate
//! with IEEE semantics.

use statrs::statistics::Statistics;

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Sample standard deviation (N - 1 denominator); `NaN` for fewer than two values.
pub fn sample_sd(values: &[f64]) -> f64 {
    values.iter().std_dev()
}

/// `(x - mean) / sd` for every value, with mean and sd computed once over the slice.
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    let mu = mean(values);
    let sd = sample_sd(values);
    values.iter().map(|&x| (x - mu) / sd).collect()
}
