//! Bounding rules applied to analytic records before persistence.
//!
//! Optional fields that are non-finite or out of range become `None`.
//! Required fields (current/benchmark price) reject the record instead;
//! that decision lives with the record types.

use crate::constants::{
    MAX_ABS_MOMENTUM, MAX_PERCENT, MAX_PRICE, MAX_VOLATILITY, MAX_VOLUME, VALUE_DECIMALS,
};
use crate::utils::round_to;

/// Finite value or nothing
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Percentage fields: clamped to ±9999
pub fn bound_percent(value: Option<f64>) -> Option<f64> {
    finite(value).map(|v| round_to(v.clamp(-MAX_PERCENT, MAX_PERCENT), VALUE_DECIMALS))
}

/// Absolute momentum: clamped to ±999999
pub fn bound_abs_momentum(value: Option<f64>) -> Option<f64> {
    finite(value).map(|v| round_to(v.clamp(-MAX_ABS_MOMENTUM, MAX_ABS_MOMENTUM), VALUE_DECIMALS))
}

/// Volatility: clamped to [0, 999]
pub fn bound_volatility(value: Option<f64>) -> Option<f64> {
    finite(value).map(|v| round_to(v.clamp(0.0, MAX_VOLATILITY), VALUE_DECIMALS))
}

/// Prices must lie in (0, 9_999_999]; anything else is dropped
pub fn bound_price(value: Option<f64>) -> Option<f64> {
    finite(value)
        .filter(|v| *v > 0.0 && *v <= MAX_PRICE)
        .map(|v| round_to(v, VALUE_DECIMALS))
}

/// Volumes must be non-negative and are capped
pub fn bound_volume(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v >= 0).map(|v| v.min(MAX_VOLUME))
}

/// Moving averages share the price bounds
pub fn bound_moving_average(value: Option<f64>) -> Option<f64> {
    bound_price(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_bounds() {
        assert_eq!(bound_percent(Some(1e9)), Some(9999.0));
        assert_eq!(bound_percent(Some(-1e9)), Some(-9999.0));
        assert_eq!(bound_percent(Some(f64::NAN)), None);
        assert_eq!(bound_percent(Some(12.345678)), Some(12.3457));
    }

    #[test]
    fn test_price_bounds() {
        assert_eq!(bound_price(Some(0.0)), None);
        assert_eq!(bound_price(Some(-5.0)), None);
        assert_eq!(bound_price(Some(10_000_000.0)), None);
        assert_eq!(bound_price(Some(f64::INFINITY)), None);
        assert_eq!(bound_price(Some(123.45)), Some(123.45));
    }

    #[test]
    fn test_volatility_and_volume_bounds() {
        assert_eq!(bound_volatility(Some(-1.0)), Some(0.0));
        assert_eq!(bound_volatility(Some(5000.0)), Some(999.0));
        assert_eq!(bound_volume(Some(-1)), None);
        assert_eq!(bound_volume(Some(i64::MAX)), Some(MAX_VOLUME));
        assert_eq!(bound_abs_momentum(Some(2e6)), Some(999_999.0));
    }
}
