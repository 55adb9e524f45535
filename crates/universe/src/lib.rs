//! # MarketMatch Universe
//!
//! Removes candidates that cannot be held: unusable data, too little history,
//! delisted or stale listings, disallowed currencies and illiquid names.
//!
//! `filter` is a pure function of its inputs. Running it again on its own
//! `accepted` output with the same rules returns that set unchanged.

use chrono::Datelike;
use core_types::{Instrument, PriceHistory};
use itertools::Itertools;
use serde::Serialize;

pub mod reason;
pub mod rules;

pub use reason::RejectionReason;
pub use rules::{FilterRules, ListingCheck, VolumeCheck};

/// An excluded instrument and the first rule it failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub instrument: Instrument,
    pub reason: RejectionReason,
}

/// Ticker-level view of a rejection, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedTicker {
    pub ticker: String,
    pub reason: String,
    pub code: &'static str,
}

impl RejectedTicker {
    pub fn new(ticker: impl Into<String>, reason: &RejectionReason) -> Self {
        Self {
            ticker: ticker.into(),
            reason: reason.to_string(),
            code: reason.code(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOutcome {
    /// Instruments that passed every enabled rule, in input order.
    pub accepted: Vec<Instrument>,
    pub rejected: Vec<Rejection>,
}

impl FilterOutcome {
    pub fn accepted_tickers(&self) -> Vec<String> {
        self.accepted.iter().map(|i| i.ticker.clone()).collect()
    }

    pub fn rejected_tickers(&self) -> Vec<RejectedTicker> {
        self.rejected
            .iter()
            .map(|r| RejectedTicker::new(&r.instrument.ticker, &r.reason))
            .collect()
    }
}

/// Splits `instruments` into accepted and rejected sets.
pub fn filter(instruments: Vec<Instrument>, rules: &FilterRules) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for instrument in instruments {
        match evaluate(&instrument, rules) {
            None => outcome.accepted.push(instrument),
            Some(reason) => {
                tracing::info!(
                    ticker = %instrument.ticker,
                    code = reason.code(),
                    reason = %reason,
                    "Instrument removed from universe."
                );
                outcome.rejected.push(Rejection { instrument, reason });
            }
        }
    }
    tracing::info!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        "Universe filter complete."
    );
    outcome
}

/// Applies the rules in order and returns the first failure, if any.
pub fn evaluate(instrument: &Instrument, rules: &FilterRules) -> Option<RejectionReason> {
    let in_window = instrument.history.within(rules.window.start, rules.window.end);

    if let Some(detail) = invalid_data(instrument, &in_window) {
        return Some(RejectionReason::InvalidData { detail });
    }

    let periods = in_window.resample(rules.frequency).len().saturating_sub(1);
    if periods < rules.min_history_periods {
        return Some(RejectionReason::InsufficientHistory {
            periods,
            required: rules.min_history_periods,
        });
    }

    if let Some(listing) = rules.listing {
        if !instrument.status.is_active() {
            return Some(RejectionReason::Delisted);
        }
        let recent = rules.volume_window();
        if in_window.within(recent.start, recent.end).is_empty() {
            return Some(RejectionReason::Delisted);
        }
        if let Some(last) = in_window.last() {
            let gap = (rules.window.end - last.date).num_days();
            if gap > listing.staleness_days {
                return Some(RejectionReason::StaleListing { last_trade: last.date });
            }
        }
    }

    if let Some(allowed) = &rules.allowed_currencies {
        let currency = instrument.currency.trim().to_uppercase();
        if !allowed.contains(&currency) {
            return Some(RejectionReason::WrongCurrency { currency });
        }
    }

    if let Some(volume) = rules.volume {
        let average_volume = average_monthly_volume(instrument, rules, &volume);
        if average_volume < volume.min_average_volume {
            return Some(RejectionReason::LowVolume {
                average_volume,
                minimum: volume.min_average_volume,
            });
        }
    }

    None
}

/// A market cap that is not a finite non-negative number, or a close in the
/// window that is not a finite positive price.
fn invalid_data(instrument: &Instrument, in_window: &PriceHistory) -> Option<String> {
    if !instrument.market_cap.is_finite() || instrument.market_cap < 0.0 {
        return Some(format!("market cap {}", instrument.market_cap));
    }
    in_window
        .points()
        .iter()
        .find(|p| !p.close.is_finite() || p.close <= 0.0)
        .map(|p| format!("close {} on {}", p.close, p.date))
}

/// Mean of the monthly mean volumes over the trailing volume window.
/// Months with too few observations are skipped; no qualifying month gives 0.
pub fn average_monthly_volume(instrument: &Instrument, rules: &FilterRules, check: &VolumeCheck) -> f64 {
    let recent = rules::trailing_months(rules.window.end, check.months);
    let history = instrument.history.within(recent.start, recent.end);

    let monthly: Vec<f64> = history
        .points()
        .iter()
        .chunk_by(|p| (p.date.year(), p.date.month()))
        .into_iter()
        .filter_map(|(_, days)| {
            let volumes: Vec<f64> = days.map(|p| p.volume).collect();
            (volumes.len() >= check.min_trading_days_per_month)
                .then(|| volumes.iter().sum::<f64>() / volumes.len() as f64)
        })
        .collect();

    if monthly.is_empty() {
        0.0
    } else {
        monthly.iter().sum::<f64>() / monthly.len() as f64
    }
}
