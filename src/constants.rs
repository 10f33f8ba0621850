//! Analytics Constants
//!
//! Bounds, thresholds and lookback windows shared by the index builder,
//! the momentum engine and the relative strength engine.
//!
//! ## Value Bounds
//!
//! Stored records are clamped to these ranges before persistence:
//! - Percentages (momentum pct, returns, RS): ±9999
//! - Absolute momentum: ±999999
//! - Volatility: 0 to 999
//! - Prices: (0, 9_999_999]
//! - Volume: 0 to 9_999_999_999

/// Lookback horizons in calendar days
pub const HORIZONS_DAYS: [i64; 3] = [30, 90, 180];

/// Clamp for every percentage-valued field
pub const MAX_PERCENT: f64 = 9999.0;

/// Clamp for absolute momentum (price units)
pub const MAX_ABS_MOMENTUM: f64 = 999_999.0;

/// Upper clamp for annualized volatility
pub const MAX_VOLATILITY: f64 = 999.0;

/// Largest accepted price
pub const MAX_PRICE: f64 = 9_999_999.0;

/// Largest accepted (average) volume
pub const MAX_VOLUME: i64 = 9_999_999_999;

/// Daily returns with magnitude at or above this are treated as data glitches
pub const MAX_DAILY_RETURN: f64 = 10.0;

/// Trading days per year used to annualize volatility
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Window (calendar days) for volatility and average volume
pub const VOLATILITY_WINDOW_DAYS: i64 = 30;

/// Minimum observations for a momentum record
pub const MIN_MOMENTUM_OBSERVATIONS: usize = 30;

/// Long moving average period for Mansfield RS and Weinstein stages
pub const MA_LONG_PERIOD: usize = 200;

/// Observations between the two MA readings of the trend test
pub const MA_TREND_PERIOD: usize = 20;

/// Smallest MA window accepted in relaxed mode
pub const MIN_RELAXED_MA_WINDOW: usize = 15;

/// Minimum constituents for an equal-weighted industry index
pub const MIN_INDEX_CONSTITUENTS: usize = 3;

/// Default base value of a freshly built index
pub const DEFAULT_INDEX_BASE: f64 = 1000.0;

/// Default window for industry index construction (calendar days)
pub const DEFAULT_INDEX_PERIOD_DAYS: i64 = 365;

/// Price history loaded for a momentum calculation (covers 180d + 30 observations)
pub const MOMENTUM_LOOKBACK_DAYS: i64 = 270;

/// Price history loaded for a relative strength calculation.
///
/// 300 calendar days yield roughly 200 trading sessions; the extra 180 keep
/// the 180-day historical re-derivation above the MA200 threshold.
pub const RS_LOOKBACK_DAYS: i64 = 480;

/// Default range of a historical backfill (two years)
pub const DEFAULT_BACKFILL_DAYS: i64 = 730;

/// Default benchmark index
pub const DEFAULT_BENCHMARK: &str = "^CRSLDX";

/// Symbols with this prefix are market indices
pub const MARKET_INDEX_PREFIX: char = '^';

/// Decimal places kept for prices, momentum, returns and RS
pub const VALUE_DECIMALS: i32 = 4;

/// Decimal places kept for index values
pub const INDEX_DECIMALS: i32 = 6;
