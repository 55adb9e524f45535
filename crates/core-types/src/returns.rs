use crate::error::CoreError;
use crate::stats;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Period-over-period returns aligned to a calendar grid.
///
/// Invariant: `dates.len() == values.len()` and dates are strictly increasing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ReturnSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self, CoreError> {
        if dates.len() != values.len() {
            return Err(CoreError::MisalignedSeries {
                left: dates.len(),
                right: values.len(),
            });
        }
        if let Some(pair) = dates.windows(2).find(|w| w[1] <= w[0]) {
            return Err(CoreError::UnorderedHistory(pair[1]));
        }
        Ok(Self { dates, values })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Callers guarantee the invariant, e.g. when slicing an ordered grid.
    pub(crate) fn from_parts_unchecked(dates: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        Self { dates, values }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        stats::mean(&self.values)
    }

    /// True if every return equals the first one, i.e. zero variance.
    pub fn is_flat(&self) -> bool {
        match self.values.first() {
            Some(first) => self.values.iter().all(|v| (v - first).abs() <= f64::EPSILON),
            None => true,
        }
    }

    /// Per-period difference `self - other`. Both series must share the same grid.
    pub fn active_against(&self, other: &ReturnSeries) -> Result<Vec<f64>, CoreError> {
        self.ensure_aligned(other)?;
        Ok(self
            .values
            .iter()
            .zip(&other.values)
            .map(|(a, b)| a - b)
            .collect())
    }

    pub fn ensure_aligned(&self, other: &ReturnSeries) -> Result<(), CoreError> {
        if self.dates != other.dates {
            return Err(CoreError::MisalignedSeries {
                left: self.len(),
                right: other.len(),
            });
        }
        Ok(())
    }

    /// Compounded return over the whole series, as a fraction.
    pub fn cumulative_return(&self) -> f64 {
        self.values.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0
    }

    /// Weighted sum of several aligned series, period by period.
    pub fn weighted_sum(series: &[&ReturnSeries], weights: &[f64]) -> Result<ReturnSeries, CoreError> {
        if series.len() != weights.len() {
            return Err(CoreError::MisalignedSeries {
                left: series.len(),
                right: weights.len(),
            });
        }
        let Some(first) = series.first() else {
            return Ok(ReturnSeries::empty());
        };
        let mut values = vec![0.0; first.len()];
        for (s, w) in series.iter().zip(weights) {
            first.ensure_aligned(s)?;
            for (acc, r) in values.iter_mut().zip(&s.values) {
                *acc += w * r;
            }
        }
        Ok(ReturnSeries {
            dates: first.dates.clone(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn new_validates_lengths_and_order() {
        assert!(ReturnSeries::new(grid(2), vec![0.1]).is_err());
        let mut dates = grid(2);
        dates.reverse();
        assert!(ReturnSeries::new(dates, vec![0.1, 0.2]).is_err());
    }

    #[test]
    fn flat_series_detection() {
        let flat = ReturnSeries::new(grid(3), vec![0.0, 0.0, 0.0]).unwrap();
        assert!(flat.is_flat());
        let moving = ReturnSeries::new(grid(3), vec![0.0, 0.01, 0.0]).unwrap();
        assert!(!moving.is_flat());
    }

    #[test]
    fn active_returns_require_same_grid() {
        let a = ReturnSeries::new(grid(2), vec![0.02, 0.01]).unwrap();
        let b = ReturnSeries::new(grid(2), vec![0.01, 0.03]).unwrap();
        let active = a.active_against(&b).unwrap();
        assert_relative_eq!(active[0], 0.01, epsilon = 1e-12);
        assert_relative_eq!(active[1], -0.02, epsilon = 1e-12);

        let c = ReturnSeries::new(grid(3), vec![0.0, 0.0, 0.0]).unwrap();
        assert!(a.active_against(&c).is_err());
    }

    #[test]
    fn weighted_sum_and_compounding() {
        let a = ReturnSeries::new(grid(2), vec![0.10, 0.0]).unwrap();
        let b = ReturnSeries::new(grid(2), vec![0.0, 0.10]).unwrap();
        let p = ReturnSeries::weighted_sum(&[&a, &b], &[0.5, 0.5]).unwrap();
        assert_relative_eq!(p.values()[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(p.cumulative_return(), 1.05 * 1.05 - 1.0, epsilon = 1e-12);
    }
}
