use std::path::PathBuf;

use crate::constants::{DEFAULT_BENCHMARK, MARKET_INDEX_PREFIX};

/// Get market data directory from environment variable or use default
pub fn get_market_data_dir() -> PathBuf {
    std::env::var("MARKET_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("market_data"))
}

/// Get SQLite database path from environment variable or use default
pub fn get_database_path() -> PathBuf {
    std::env::var("DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| get_market_data_dir().join("stocktools.db"))
}

/// Get benchmark symbol from environment variable or use default
pub fn get_benchmark_symbol() -> String {
    std::env::var("BENCHMARK_SYMBOL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BENCHMARK.to_string())
}

/// Get industry membership file from environment variable or use default
pub fn get_ticker_group_path() -> PathBuf {
    std::env::var("TICKER_GROUP_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("ticker_group.json"))
}

/// Market indices are identified by their symbol prefix (e.g. ^CRSLDX)
pub fn is_market_index(symbol: &str) -> bool {
    symbol.starts_with(MARKET_INDEX_PREFIX)
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_market_index() {
        assert!(is_market_index("^CRSLDX"));
        assert!(!is_market_index("RELIANCE"));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 4), 1.2346);
        assert_eq!(round_to(9999.0, 4), 9999.0);
        assert_eq!(round_to(-0.00004, 4), -0.0);
    }
}
