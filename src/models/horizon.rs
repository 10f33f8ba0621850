use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::HORIZONS_DAYS;

/// Calendar-day lookback horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    Days30,
    Days90,
    Days180,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::Days30, Horizon::Days90, Horizon::Days180];

    pub fn days(&self) -> i64 {
        match self {
            Horizon::Days30 => HORIZONS_DAYS[0],
            Horizon::Days90 => HORIZONS_DAYS[1],
            Horizon::Days180 => HORIZONS_DAYS[2],
        }
    }

    /// Column suffix used by storage ("30d", "90d", "180d")
    pub fn suffix(&self) -> &'static str {
        match self {
            Horizon::Days30 => "30d",
            Horizon::Days90 => "90d",
            Horizon::Days180 => "180d",
        }
    }

    /// Parse from "30", "30d", "90", ...
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().trim_end_matches(['d', 'D']) {
            "30" => Ok(Horizon::Days30),
            "90" => Ok(Horizon::Days90),
            "180" => Ok(Horizon::Days180),
            _ => Err(format!("Invalid horizon: {}. Valid options: 30, 90, 180", s)),
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_parsing() {
        assert_eq!(Horizon::from_str("30").unwrap(), Horizon::Days30);
        assert_eq!(Horizon::from_str("90d").unwrap(), Horizon::Days90);
        assert_eq!(Horizon::from_str("180D").unwrap().days(), 180);
        assert!(Horizon::from_str("60").is_err());
    }
}
