//! Statistical primitives shared by the analytics engines
//!
//! # Value Convention
//! All inputs are closing values in ascending date order (oldest first).
//! Stock prices, market index levels and equal-weighted industry index
//! values are all accepted as-is: every function here is either a mean
//! or a ratio, so the unit cancels out.
//!
//! # Missing Data
//! Functions return `None` instead of a sentinel whenever the input is too
//! short or the result is not finite. Callers treat `None` as "insufficient
//! history", never as zero.

use crate::constants::{MAX_DAILY_RETURN, MAX_PERCENT, MAX_VOLATILITY, TRADING_DAYS_PER_YEAR};

/// Simple moving average of the last `period` values
///
/// # Returns
/// * `None` if `period` is zero or fewer than `period` values are available
///
/// # Example
/// ```
/// use stocktools::models::indicators::moving_average;
/// assert_eq!(moving_average(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
/// ```
pub fn moving_average(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let avg = window.iter().sum::<f64>() / period as f64;
    avg.is_finite().then_some(avg)
}

/// Is the moving average rising?
///
/// Compares the MA as of the last value with the MA as of `trend_period`
/// observations earlier. With less history than `ma_period + trend_period`
/// but at least two extra observations beyond `ma_period`, the comparison
/// falls back to the MA one observation earlier.
///
/// # Returns
/// * `Some(true)` if the MA is strictly higher now
/// * `Some(false)` if flat or falling
/// * `None` if even the fallback comparison is impossible
pub fn ma_trend_up(values: &[f64], ma_period: usize, trend_period: usize) -> Option<bool> {
    if ma_period == 0 {
        return None;
    }

    let lag = if trend_period > 0 && values.len() >= ma_period + trend_period {
        trend_period
    } else if values.len() >= ma_period + 2 {
        1
    } else {
        return None;
    };

    let current = moving_average(values, ma_period)?;
    let past = moving_average(&values[..values.len() - lag], ma_period)?;
    Some(current > past)
}

/// Annualized volatility of daily simple returns, in percent
///
/// Returns whose prior value is zero, or where either value is not finite,
/// are skipped. Returns with magnitude of 10 (1000%) or more are treated as
/// data glitches and discarded. The population standard deviation of the
/// remaining returns is scaled by `sqrt(252)` and by 100.
///
/// # Returns
/// * Value clamped to `[0, 999]`
/// * `None` if fewer than 2 usable returns remain
pub fn volatility(values: &[f64]) -> Option<f64> {
    let returns: Vec<f64> = values
        .windows(2)
        .filter_map(|w| {
            let (prev, cur) = (w[0], w[1]);
            if prev == 0.0 || !prev.is_finite() || !cur.is_finite() {
                return None;
            }
            let r = (cur - prev) / prev;
            (r.is_finite() && r.abs() < MAX_DAILY_RETURN).then_some(r)
        })
        .collect();

    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let annualized = variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0;

    annualized
        .is_finite()
        .then(|| annualized.clamp(0.0, MAX_VOLATILITY))
}

/// Percentage change from `historical` to `current`, capped at ±9999
///
/// # Returns
/// * `None` if `historical` is zero or negative, or the result is not finite
pub fn percent_change(current: f64, historical: f64) -> Option<f64> {
    if historical <= 0.0 || !historical.is_finite() || !current.is_finite() {
        return None;
    }
    let pct = (current - historical) / historical * 100.0;
    pct.is_finite().then(|| pct.clamp(-MAX_PERCENT, MAX_PERCENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        assert_eq!(moving_average(&values, 5), Some(8.0));
        assert_eq!(moving_average(&values, 10), Some(5.5));
        assert_eq!(moving_average(&values, 11), None);
        assert_eq!(moving_average(&values, 0), None);
    }

    #[test]
    fn test_ma_trend_full_window() {
        let rising: Vec<f64> = (0..30).map(|v| v as f64).collect();
        assert_eq!(ma_trend_up(&rising, 5, 20), Some(true));

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(ma_trend_up(&falling, 5, 20), Some(false));
    }

    #[test]
    fn test_ma_trend_fallback_and_none() {
        let rising: Vec<f64> = (0..8).map(|v| v as f64).collect();
        // 8 < 5 + 20, but 8 >= 5 + 2
        assert_eq!(ma_trend_up(&rising, 5, 20), Some(true));
        // 6 < 5 + 2
        assert_eq!(ma_trend_up(&rising[..6], 5, 20), None);
    }

    #[test]
    fn test_volatility_flat_series_is_zero() {
        assert_eq!(volatility(&[100.0, 100.0, 100.0, 100.0]), Some(0.0));
    }

    #[test]
    fn test_volatility_alternating_returns() {
        // Returns: +10%, -10%, +10% ... population std is 0.1 around mean ~0
        let values = [100.0, 110.0, 99.0, 108.9, 98.01];
        let vol = volatility(&values).unwrap();
        let expected = 0.1 * 252f64.sqrt() * 100.0;
        assert!((vol - expected).abs() < 1e-6, "vol = {}", vol);
    }

    #[test]
    fn test_volatility_skips_glitches_and_zero_prior() {
        // 0 -> 50 has a zero prior, 1 -> 5000 is a glitch (r >= 10)
        assert_eq!(volatility(&[0.0, 50.0, 50.0]), None);
        let v = volatility(&[1.0, 5000.0, 5000.0, 5000.0]).unwrap();
        assert_eq!(v, 0.0);
    }

    #[test]
    fn test_percent_change() {
        assert!((percent_change(110.0, 100.0).unwrap() - 10.0).abs() < 1e-9);
        assert!((percent_change(90.0, 100.0).unwrap() + 10.0).abs() < 1e-9);
        assert_eq!(percent_change(10000.0, 0.0001), Some(9999.0));
        assert_eq!(percent_change(10.0, 0.0), None);
    }
}
