use crate::enums::{Frequency, ListingStatus};
use crate::error::CoreError;
use crate::returns::ReturnSeries;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single daily observation of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64, volume: f64) -> Self {
        Self { date, close, volume }
    }
}

/// An ordered sequence of price observations.
///
/// Invariant: dates are strictly increasing, so there are no duplicate dates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceHistory {
    points: Vec<PricePoint>,
}

impl PriceHistory {
    /// Builds a history from points that are already in chronological order.
    pub fn new(points: Vec<PricePoint>) -> Result<Self, CoreError> {
        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(CoreError::UnorderedHistory(pair[1].date));
            }
        }
        if let Some(bad) = points.iter().find(|p| !p.close.is_finite() || p.close < 0.0) {
            return Err(CoreError::InvalidInput(
                "close".to_string(),
                format!("{} on {}", bad.close, bad.date),
            ));
        }
        Ok(Self { points })
    }

    /// Sorts the points by date before validating them.
    /// Duplicate dates are still rejected.
    pub fn from_unsorted(mut points: Vec<PricePoint>) -> Result<Self, CoreError> {
        points.sort_by_key(|p| p.date);
        Self::new(points)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// The most recent close on or before `date`, i.e. a forward-filled lookup.
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.date <= date);
        idx.checked_sub(1).map(|i| self.points[i].close)
    }

    /// Returns the observations with `start <= date <= end`.
    pub fn within(&self, start: NaiveDate, end: NaiveDate) -> PriceHistory {
        let points = self
            .points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect();
        PriceHistory { points }
    }

    /// Down-samples the history to the requested frequency.
    /// Monthly keeps the last observation of every calendar month.
    pub fn resample(&self, frequency: Frequency) -> PriceHistory {
        match frequency {
            Frequency::Daily => self.clone(),
            Frequency::Monthly => {
                let mut points: Vec<PricePoint> = Vec::new();
                for point in &self.points {
                    match points.last_mut() {
                        Some(last)
                            if last.date.year() == point.date.year()
                                && last.date.month() == point.date.month() =>
                        {
                            *last = *point;
                        }
                        _ => points.push(*point),
                    }
                }
                PriceHistory { points }
            }
        }
    }

    /// Projects the history onto a calendar grid and computes returns between
    /// consecutive grid dates.
    ///
    /// Prices are forward-filled onto the grid. A period where either side has no
    /// price yet is a zero return, so the output always has `grid.len() - 1` values.
    pub fn returns_on(&self, grid: &[NaiveDate]) -> ReturnSeries {
        if grid.len() < 2 {
            return ReturnSeries::empty();
        }
        let prices: Vec<Option<f64>> = grid.iter().map(|d| self.close_on_or_before(*d)).collect();
        let values = prices
            .windows(2)
            .map(|w| match (w[0], w[1]) {
                (Some(prev), Some(cur)) if prev > 0.0 => cur / prev - 1.0,
                _ => 0.0,
            })
            .collect();
        ReturnSeries::from_parts_unchecked(grid[1..].to_vec(), values)
    }

    /// Percentage change from the first to the last close.
    pub fn percent_change(&self) -> Option<f64> {
        let first = self.first()?.close;
        let last = self.last()?.close;
        if first > 0.0 {
            Some((last - first) / first * 100.0)
        } else {
            None
        }
    }
}

impl TryFrom<Vec<PricePoint>> for PriceHistory {
    type Error = CoreError;

    fn try_from(points: Vec<PricePoint>) -> Result<Self, Self::Error> {
        PriceHistory::new(points)
    }
}

impl From<PriceHistory> for Vec<PricePoint> {
    fn from(history: PriceHistory) -> Self {
        history.points
    }
}

/// A candidate security as delivered by the market data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub ticker: String,
    pub currency: String,
    pub exchange: String,
    pub status: ListingStatus,
    pub market_cap: f64,
    pub history: PriceHistory,
}

impl Instrument {
    /// Volume of the most recent observation.
    pub fn latest_volume(&self) -> Option<f64> {
        self.history.last().map(|p| p.volume)
    }

    /// Close of the most recent observation.
    pub fn latest_close(&self) -> Option<f64> {
        self.history.last().map(|p| p.close)
    }
}
