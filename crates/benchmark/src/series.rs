use crate::error::BenchmarkError;
use chrono::{Datelike, NaiveDate};
use core_types::{Frequency, PriceHistory, ReturnSeries};
use serde::Serialize;

/// An index history as fetched from the provider, tagged with its report name.
#[derive(Debug, Clone)]
pub struct NamedIndex {
    pub name: String,
    pub history: PriceHistory,
}

/// One component of the blended benchmark, sampled on the shared grid.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSeries {
    pub name: String,
    /// Closes at the sampling frequency (e.g. month-end closes).
    pub prices: PriceHistory,
    /// Returns on the shared grid. Periods without a quote are zero-return.
    pub returns: ReturnSeries,
}

/// Index return series plus their per-period arithmetic mean.
///
/// Every series shares one calendar grid; `combined` is the optimization target.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSeries {
    grid: Vec<NaiveDate>,
    components: Vec<IndexSeries>,
    combined: ReturnSeries,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexPerformance {
    pub name: String,
    /// Percent change from the first to the last close of the window.
    pub return_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkPerformance {
    pub indices: Vec<IndexPerformance>,
    /// Simple average of the index returns.
    pub average_return_pct: f64,
}

/// Blends one or more index histories into a `BenchmarkSeries`.
///
/// The grid is the union of the sampled dates of all indices. For monthly sampling a
/// month contributes a single grid date (the latest quote seen in that month), so
/// indices with different holiday calendars still line up.
pub fn combine(indices: &[NamedIndex], frequency: Frequency) -> Result<BenchmarkSeries, BenchmarkError> {
    if indices.is_empty() {
        return Err(BenchmarkError::NotEnoughData("no benchmark indices supplied".to_string()));
    }

    let sampled: Vec<(String, PriceHistory)> = indices
        .iter()
        .map(|idx| (idx.name.clone(), idx.history.resample(frequency)))
        .collect();

    let grid = calendar_grid(sampled.iter().map(|(_, h)| h), frequency);
    if grid.len() < 2 {
        return Err(BenchmarkError::NotEnoughData(format!(
            "benchmark calendar has {} sample dates, at least 2 are required",
            grid.len()
        )));
    }

    let components: Vec<IndexSeries> = sampled
        .into_iter()
        .map(|(name, prices)| {
            let returns = prices.returns_on(&grid);
            IndexSeries { name, prices, returns }
        })
        .collect();

    let periods = grid.len() - 1;
    let count = components.len() as f64;
    let mut combined = vec![0.0; periods];
    for component in &components {
        for (acc, r) in combined.iter_mut().zip(component.returns.values()) {
            *acc += r / count;
        }
    }
    let combined = ReturnSeries::new(grid[1..].to_vec(), combined)?;

    tracing::debug!(
        indices = components.len(),
        periods,
        "Combined benchmark series."
    );

    Ok(BenchmarkSeries {
        grid,
        components,
        combined,
    })
}

fn calendar_grid<'a>(histories: impl Iterator<Item = &'a PriceHistory>, frequency: Frequency) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = histories.flat_map(|h| h.dates()).collect();
    dates.sort_unstable();
    dates.dedup();
    if frequency == Frequency::Monthly {
        let mut monthly: Vec<NaiveDate> = Vec::with_capacity(dates.len());
        for date in dates {
            match monthly.last_mut() {
                Some(last) if last.year() == date.year() && last.month() == date.month() => *last = date,
                _ => monthly.push(date),
            }
        }
        return monthly;
    }
    dates
}

impl BenchmarkSeries {
    /// The sampled price dates. Returns are dated `grid[1..]`.
    pub fn grid(&self) -> &[NaiveDate] {
        &self.grid
    }

    pub fn combined(&self) -> &ReturnSeries {
        &self.combined
    }

    pub fn components(&self) -> &[IndexSeries] {
        &self.components
    }

    pub fn periods(&self) -> usize {
        self.combined.len()
    }

    /// Mean periodic return of the combined series.
    pub fn mean_return(&self) -> f64 {
        self.combined.mean().unwrap_or(0.0)
    }

    /// First-to-last price performance of every index over the window.
    pub fn performance(&self) -> BenchmarkPerformance {
        let indices: Vec<IndexPerformance> = self
            .components
            .iter()
            .map(|c| IndexPerformance {
                name: c.name.clone(),
                return_pct: c.prices.percent_change().unwrap_or(0.0),
            })
            .collect();
        let average_return_pct = if indices.is_empty() {
            0.0
        } else {
            indices.iter().map(|i| i.return_pct).sum::<f64>() / indices.len() as f64
        };
        BenchmarkPerformance {
            indices,
            average_return_pct,
        }
    }

    /// Compounded return of the combined series over the window, in percent.
    pub fn combined_return_pct(&self) -> f64 {
        self.combined.cumulative_return() * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core_types::PricePoint;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn index(name: &str, points: &[(NaiveDate, f64)]) -> NamedIndex {
        NamedIndex {
            name: name.to_string(),
            history: PriceHistory::new(
                points.iter().map(|(date, c)| PricePoint::new(*date, *c, 0.0)).collect(),
            )
            .unwrap(),
        }
    }

    #[test]
    fn combined_is_mean_of_index_returns() {
        let sp = index("sp500", &[(d(2024, 1, 31), 100.0), (d(2024, 2, 29), 110.0), (d(2024, 3, 28), 99.0)]);
        let tsx = index("tsx", &[(d(2024, 1, 31), 50.0), (d(2024, 2, 29), 50.0), (d(2024, 3, 28), 55.0)]);
        let bench = combine(&[sp, tsx], Frequency::Monthly).unwrap();

        assert_eq!(bench.periods(), 2);
        assert_relative_eq!(bench.combined().values()[0], 0.05, epsilon = 1e-12);
        assert_relative_eq!(bench.combined().values()[1], (-0.10 + 0.10) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn missing_periods_are_zero_return_not_dropped() {
        let sp = index("sp500", &[(d(2024, 1, 31), 100.0), (d(2024, 2, 29), 110.0), (d(2024, 3, 28), 121.0)]);
        // No February quote for the second index.
        let tsx = index("tsx", &[(d(2024, 1, 31), 50.0), (d(2024, 3, 28), 55.0)]);
        let bench = combine(&[sp, tsx], Frequency::Monthly).unwrap();

        let tsx_returns = bench.components()[1].returns.values();
        assert_eq!(bench.periods(), 2);
        assert_eq!(tsx_returns[0], 0.0);
        assert_relative_eq!(tsx_returns[1], 0.10, epsilon = 1e-12);
    }

    #[test]
    fn monthly_grid_collapses_holiday_offsets() {
        let sp = index("sp500", &[(d(2024, 5, 31), 100.0), (d(2024, 6, 28), 101.0)]);
        let tsx = index("tsx", &[(d(2024, 5, 31), 50.0), (d(2024, 6, 27), 51.0)]);
        let bench = combine(&[sp, tsx], Frequency::Monthly).unwrap();
        assert_eq!(bench.grid(), &[d(2024, 5, 31), d(2024, 6, 28)]);
    }

    #[test]
    fn performance_reports_each_index_and_average() {
        let sp = index("sp500", &[(d(2024, 1, 31), 100.0), (d(2024, 2, 29), 120.0)]);
        let tsx = index("tsx", &[(d(2024, 1, 31), 50.0), (d(2024, 2, 29), 55.0)]);
        let perf = combine(&[sp, tsx], Frequency::Monthly).unwrap().performance();
        assert_relative_eq!(perf.indices[0].return_pct, 20.0, epsilon = 1e-9);
        assert_relative_eq!(perf.indices[1].return_pct, 10.0, epsilon = 1e-9);
        assert_relative_eq!(perf.average_return_pct, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn single_sample_is_not_enough() {
        let sp = index("sp500", &[(d(2024, 1, 31), 100.0)]);
        assert!(matches!(
            combine(&[sp], Frequency::Monthly),
            Err(BenchmarkError::NotEnoughData(_))
        ));
    }
}
