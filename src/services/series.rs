//! Calendar-aligned lookups over irregular daily series.
//!
//! Offsets are calendar days, not trading sessions. A lookup resolves to
//! the most recent observation on or before the target date, so a
//! 30-day lookback may land on data that is 28 or 32 sessions old.

use chrono::{Duration, NaiveDate};

use crate::models::{PriceObservation, PriceSeries};

/// `as_of_date - days_back` in calendar days
pub fn target_date(as_of_date: NaiveDate, days_back: i64) -> NaiveDate {
    as_of_date - Duration::days(days_back)
}

/// Most recent observation dated on or before `date`
pub fn latest_on_or_before(series: &PriceSeries, date: NaiveDate) -> Option<&PriceObservation> {
    series.up_to(date).last()
}

/// Close of the most recent observation on or before `as_of_date - days_back`.
///
/// `None` means insufficient history, never zero.
pub fn find_value_at_offset(
    series: &PriceSeries,
    as_of_date: NaiveDate,
    days_back: i64,
) -> Option<f64> {
    latest_on_or_before(series, target_date(as_of_date, days_back)).map(|o| o.close)
}

/// Observations within `[as_of_date - days, as_of_date]`
pub fn trailing_window(
    series: &PriceSeries,
    as_of_date: NaiveDate,
    days: i64,
) -> &[PriceObservation] {
    series.between(target_date(as_of_date, days), as_of_date)
}

/// Mean of the non-null volumes in a window, truncated to an integer
pub fn average_volume(window: &[PriceObservation]) -> Option<i64> {
    let volumes: Vec<i64> = window.iter().filter_map(|o| o.volume).collect();
    if volumes.is_empty() {
        return None;
    }
    let sum: i128 = volumes.iter().map(|v| *v as i128).sum();
    Some((sum / volumes.len() as i128) as i64)
}
