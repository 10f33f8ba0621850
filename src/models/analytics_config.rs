use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BACKFILL_DAYS, DEFAULT_BENCHMARK, MA_LONG_PERIOD, MA_TREND_PERIOD,
    MIN_RELAXED_MA_WINDOW,
};

/// Configuration for the relative strength engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeStrengthConfig {
    /// Benchmark index symbol (e.g. "^CRSLDX")
    pub benchmark_symbol: String,

    /// Long moving average period (200)
    pub ma_period: usize,

    /// Observations between the two MA readings of the trend test (20)
    pub trend_period: usize,

    /// Strict mode requires `ma_period` observations in both series.
    /// Relaxed mode shrinks the window to `min(ma_period, len / 2)`.
    pub strict_mode: bool,

    /// Floor for the relaxed window; shorter series are rejected
    pub min_ma_window: usize,
}

impl Default for RelativeStrengthConfig {
    fn default() -> Self {
        Self {
            benchmark_symbol: DEFAULT_BENCHMARK.to_string(),
            ma_period: MA_LONG_PERIOD,
            trend_period: MA_TREND_PERIOD,
            strict_mode: true,
            min_ma_window: MIN_RELAXED_MA_WINDOW,
        }
    }
}

impl RelativeStrengthConfig {
    pub fn new(benchmark_symbol: impl Into<String>) -> Self {
        Self {
            benchmark_symbol: benchmark_symbol.into(),
            ..Self::default()
        }
    }

    /// Switch to relaxed MA windows with the given floor
    pub fn relaxed(mut self, min_ma_window: usize) -> Self {
        self.strict_mode = false;
        self.min_ma_window = min_ma_window.max(2);
        self
    }

    pub fn with_ma_period(mut self, ma_period: usize) -> Self {
        self.ma_period = ma_period.max(1);
        self
    }

    pub fn with_trend_period(mut self, trend_period: usize) -> Self {
        self.trend_period = trend_period.max(1);
        self
    }

    /// MA window for a series of `len` observations, or `None` when the
    /// series is too short for the configured mode
    pub fn ma_window_for(&self, len: usize) -> Option<usize> {
        if self.strict_mode {
            return (len >= self.ma_period).then_some(self.ma_period);
        }
        let window = self.ma_period.min(len / 2);
        (window >= self.min_ma_window).then_some(window)
    }

    /// Observations needed before any RS can be produced
    pub fn required_observations(&self) -> usize {
        if self.strict_mode {
            self.ma_period
        } else {
            self.min_ma_window * 2
        }
    }
}

/// Configuration for historical batch generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Dates processed concurrently (each worker owns one date)
    pub concurrent_dates: usize,

    /// Default range length when no start date is given
    pub lookback_days: i64,

    /// Extra persistence attempts per date before its records count as failed
    pub persist_retries: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrent_dates: 3,
            lookback_days: DEFAULT_BACKFILL_DAYS,
            persist_retries: 1,
        }
    }
}

impl BatchConfig {
    pub fn with_concurrency(mut self, concurrent_dates: usize) -> Self {
        self.concurrent_dates = concurrent_dates.max(1);
        self
    }

    pub fn with_lookback_days(mut self, lookback_days: i64) -> Self {
        self.lookback_days = lookback_days.max(1);
        self
    }

    pub fn with_persist_retries(mut self, persist_retries: usize) -> Self {
        self.persist_retries = persist_retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_window() {
        let config = RelativeStrengthConfig::default();
        assert_eq!(config.ma_window_for(199), None);
        assert_eq!(config.ma_window_for(200), Some(200));
        assert_eq!(config.ma_window_for(500), Some(200));
        assert_eq!(config.required_observations(), 200);
    }

    #[test]
    fn test_relaxed_window_has_floor() {
        let config = RelativeStrengthConfig::default().relaxed(15);
        assert_eq!(config.ma_window_for(29), None);
        assert_eq!(config.ma_window_for(30), Some(15));
        assert_eq!(config.ma_window_for(120), Some(60));
        assert_eq!(config.ma_window_for(1000), Some(200));
        assert_eq!(config.required_observations(), 30);
    }
}
