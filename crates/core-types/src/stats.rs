//! Sample statistics over plain `f64` slices.
//!
//! Dispersion uses the `n - 1` denominator throughout, so tracking errors computed
//! by the rating engine, the optimizer and the comparator agree with each other.

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }
    let mean_a = mean(a)?;
    let mean_b = mean(b)?;
    let sum: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - mean_a) * (y - mean_b))
        .sum();
    Some(sum / (a.len() - 1) as f64)
}

pub fn sample_variance(values: &[f64]) -> Option<f64> {
    covariance(values, values)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(|v| v.max(0.0).sqrt())
}

/// Pearson correlation. `None` when either side has zero variance.
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let cov = covariance(a, b)?;
    let sd_a = sample_std(a)?;
    let sd_b = sample_std(b)?;
    if sd_a <= f64::EPSILON || sd_b <= f64::EPSILON {
        return None;
    }
    Some((cov / (sd_a * sd_b)).clamp(-1.0, 1.0))
}
