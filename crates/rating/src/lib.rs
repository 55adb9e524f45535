//! # MarketMatch Rating
//!
//! Scores every accepted instrument against the blended benchmark and ranks them.
//!
//! Three sub-scores, each min-max normalised to [0, 1] across the rated set:
//!
//! - **cap**: scaled market capitalisation, larger is better.
//! - **return**: distance between the instrument's mean periodic return and the
//!   benchmark's, smaller is better.
//! - **tracking**: standard deviation of the active returns, smaller is better. A
//!   flat (zero-variance) series is treated as a perfect tracker.
//!
//! The composite is a weighted sum of the three. Ties are broken by ticker.

use benchmark::BenchmarkSeries;
use configuration::RatingSettings;
use core_types::{Instrument, ReturnSeries, stats};
use serde::Serialize;
use std::cmp::Ordering;

pub mod error;
pub mod normalize;

pub use error::RatingError;

use normalize::{find_min_max, normalize, normalize_inverse, scale_caps};

/// The raw inputs behind a candidate's sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMetrics {
    pub market_cap: f64,
    pub mean_return: f64,
    /// `|mean_return - benchmark mean return|`.
    pub return_divergence: f64,
    pub tracking_error: f64,
    /// True if the return series has zero variance.
    pub flat: bool,
}

/// A rated instrument, ready for selection by the optimizer.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    #[serde(skip)]
    pub instrument: Instrument,
    /// Returns on the benchmark's calendar grid.
    #[serde(skip)]
    pub returns: ReturnSeries,
    pub ticker: String,
    pub score: f64,
    pub cap_score: f64,
    pub return_score: f64,
    pub tracking_score: f64,
    pub metrics: RawMetrics,
}

/// Rates `accepted` and returns the candidates ordered by score, best first.
pub fn rate(
    accepted: Vec<Instrument>,
    benchmark: &BenchmarkSeries,
    settings: &RatingSettings,
) -> Result<Vec<Candidate>, RatingError> {
    if accepted.is_empty() {
        return Ok(Vec::new());
    }
    let target = benchmark.combined();
    if target.len() < 2 {
        return Err(RatingError::NotEnoughPeriods(target.len()));
    }
    let target_mean = benchmark.mean_return();

    // 1. Raw metrics on the shared grid.
    let mut rows = Vec::with_capacity(accepted.len());
    for instrument in accepted {
        if !instrument.market_cap.is_finite() {
            return Err(RatingError::InvalidMetric {
                ticker: instrument.ticker.clone(),
                metric: "market cap",
            });
        }
        let returns = instrument.history.returns_on(benchmark.grid());
        let active = returns.active_against(target)?;
        let mean_return = returns.mean().unwrap_or(0.0);
        let metrics = RawMetrics {
            market_cap: instrument.market_cap,
            mean_return,
            return_divergence: (mean_return - target_mean).abs(),
            tracking_error: stats::sample_std(&active).unwrap_or(0.0),
            flat: returns.is_flat(),
        };
        rows.push((instrument, returns, metrics));
    }

    // 2. Normalisation ranges.
    let caps: Vec<f64> = rows.iter().map(|(_, _, m)| m.market_cap).collect();
    let scaled_caps = scale_caps(&caps, settings.cap_scaling);
    let cap_range = find_min_max(&scaled_caps).unwrap_or((0.0, 0.0));
    let divergences: Vec<f64> = rows.iter().map(|(_, _, m)| m.return_divergence).collect();
    let div_range = find_min_max(&divergences).unwrap_or((0.0, 0.0));
    // Flat series are pinned to the top score and would otherwise skew the range.
    let tracking: Vec<f64> = rows
        .iter()
        .filter(|(_, _, m)| !m.flat)
        .map(|(_, _, m)| m.tracking_error)
        .collect();
    let te_range = find_min_max(&tracking).unwrap_or((0.0, 0.0));

    // 3. Score.
    let mut candidates: Vec<Candidate> = rows
        .into_iter()
        .zip(scaled_caps)
        .map(|((instrument, returns, metrics), scaled_cap)| {
            let cap_score = normalize(scaled_cap, cap_range.0, cap_range.1);
            let return_score = if metrics.return_divergence == 0.0 {
                1.0
            } else {
                normalize_inverse(metrics.return_divergence, div_range.0, div_range.1)
            };
            let tracking_score = if metrics.flat || metrics.tracking_error == 0.0 {
                1.0
            } else {
                normalize_inverse(metrics.tracking_error, te_range.0, te_range.1)
            };
            let score = cap_score * settings.cap_weight
                + return_score * settings.return_weight
                + tracking_score * settings.tracking_weight;

            Candidate {
                ticker: instrument.ticker.clone(),
                instrument,
                returns,
                score,
                cap_score,
                return_score,
                tracking_score,
                metrics,
            }
        })
        .collect();

    // 4. Rank.
    candidates.sort_by(rank_order);

    tracing::info!(
        rated = candidates.len(),
        top = candidates.first().map(|c| c.ticker.as_str()).unwrap_or(""),
        "Rated candidates."
    );
    Ok(candidates)
}

/// Score descending, then ticker ascending.
fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.ticker.cmp(&b.ticker))
}
