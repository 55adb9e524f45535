use chrono::{Datelike, Months, NaiveDate};
use configuration::FilterSettings;
use core_types::{DataWindow, Frequency};
use std::collections::BTreeSet;

/// The resolved rule set for one filter run.
///
/// A disabled rule is `None`. The insufficient-history check is always on.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRules {
    pub window: DataWindow,
    pub frequency: Frequency,
    pub min_history_periods: usize,
    /// Upper-cased ISO codes.
    pub allowed_currencies: Option<BTreeSet<String>>,
    pub listing: Option<ListingCheck>,
    pub volume: Option<VolumeCheck>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListingCheck {
    pub staleness_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeCheck {
    pub min_average_volume: f64,
    pub months: u32,
    pub min_trading_days_per_month: usize,
}

impl FilterRules {
    pub fn from_settings(settings: &FilterSettings, window: DataWindow, frequency: Frequency) -> Self {
        let allowed_currencies = settings.currency.enabled.then(|| {
            settings
                .currency
                .allowed
                .iter()
                .map(|c| c.trim().to_uppercase())
                .collect()
        });
        let listing = settings.listing.enabled.then_some(ListingCheck {
            staleness_days: settings.listing.staleness_days,
        });
        let volume = settings.volume.enabled.then_some(VolumeCheck {
            min_average_volume: settings.volume.min_average_volume,
            months: settings.volume.months,
            min_trading_days_per_month: settings.volume.min_trading_days_per_month,
        });

        Self {
            window,
            frequency,
            min_history_periods: settings.min_history_periods,
            allowed_currencies,
            listing,
            volume,
        }
    }

    /// The trailing window of complete calendar months that precede the month of
    /// the data window's end. Used for the volume average and the "no recent
    /// trades" delisting check.
    pub fn volume_window(&self) -> DataWindow {
        let months = self.volume.map(|v| v.months).unwrap_or(12);
        trailing_months(self.window.end, months)
    }
}

/// `months` whole calendar months ending the day before `end`'s month begins.
pub(crate) fn trailing_months(end: NaiveDate, months: u32) -> DataWindow {
    let month_start = NaiveDate::from_ymd_opt(end.year(), end.month(), 1).unwrap_or(end);
    let last = month_start.pred_opt().unwrap_or(month_start);
    let first = month_start
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN);
    DataWindow {
        start: first,
        end: last.max(first),
    }
}
