use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::validation::{bound_moving_average, bound_percent, bound_price};
use super::{EntityType, Horizon};
use crate::error::CalcError;

/// Weinstein stage of a price trend relative to its long moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeinsteinStage {
    /// Below a rising MA
    Accumulation = 1,
    /// Above a rising MA
    Advancing = 2,
    /// Above a falling MA
    Distribution = 3,
    /// Below a falling MA
    Declining = 4,
}

impl WeinsteinStage {
    /// Classify from price, MA and trend. An unknown trend counts as falling.
    pub fn classify(price: f64, ma: f64, trend_up: Option<bool>) -> Self {
        let above = price > ma;
        let rising = trend_up.unwrap_or(false);
        match (above, rising) {
            (true, true) => WeinsteinStage::Advancing,
            (true, false) => WeinsteinStage::Distribution,
            (false, false) => WeinsteinStage::Declining,
            (false, true) => WeinsteinStage::Accumulation,
        }
    }

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(WeinsteinStage::Accumulation),
            2 => Some(WeinsteinStage::Advancing),
            3 => Some(WeinsteinStage::Distribution),
            4 => Some(WeinsteinStage::Declining),
            _ => None,
        }
    }
}

/// Entity versus benchmark at one horizon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonStrength {
    pub price: Option<f64>,
    pub benchmark_price: Option<f64>,
    pub symbol_return: Option<f64>,
    pub benchmark_return: Option<f64>,
    /// Mansfield RS re-derived as of `date - horizon`
    pub relative_strength: Option<f64>,
    /// True when `relative_strength` is the current RS standing in for an
    /// unavailable historical value
    pub is_fallback: bool,
}

/// Relative strength analysis, keyed by (symbol, date, benchmark_symbol)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeStrengthRecord {
    pub symbol: String,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub date: NaiveDate,
    pub benchmark_symbol: String,
    pub current_price: f64,
    pub benchmark_price: f64,
    pub current_rs: Option<f64>,
    pub d30: HorizonStrength,
    pub d90: HorizonStrength,
    pub d180: HorizonStrength,
    pub entity_ma_200: Option<f64>,
    pub entity_ma_trend_up: Option<bool>,
    pub entity_stage: Option<WeinsteinStage>,
    pub benchmark_ma_200: Option<f64>,
    pub benchmark_ma_trend_up: Option<bool>,
    pub benchmark_stage: Option<WeinsteinStage>,
    /// Moving average window actually used (200 unless relaxed)
    pub ma_window: usize,
}

impl RelativeStrengthRecord {
    pub fn horizon(&self, horizon: Horizon) -> &HorizonStrength {
        match horizon {
            Horizon::Days30 => &self.d30,
            Horizon::Days90 => &self.d90,
            Horizon::Days180 => &self.d180,
        }
    }

    pub fn horizon_mut(&mut self, horizon: Horizon) -> &mut HorizonStrength {
        match horizon {
            Horizon::Days30 => &mut self.d30,
            Horizon::Days90 => &mut self.d90,
            Horizon::Days180 => &mut self.d180,
        }
    }

    /// Apply storage bounds; current and benchmark prices are required
    pub fn validate(mut self) -> Result<Self, CalcError> {
        if self.symbol.trim().is_empty() {
            return Err(CalcError::NonFiniteResult { field: "symbol" });
        }
        if self.benchmark_symbol.trim().is_empty() {
            return Err(CalcError::NonFiniteResult {
                field: "benchmark_symbol",
            });
        }
        if !self.entity_type.is_benchmarkable() {
            return Err(CalcError::NonFiniteResult {
                field: "entity_type",
            });
        }

        self.current_price = bound_price(Some(self.current_price)).ok_or(
            CalcError::NonFiniteResult {
                field: "current_price",
            },
        )?;
        self.benchmark_price = bound_price(Some(self.benchmark_price)).ok_or(
            CalcError::NonFiniteResult {
                field: "benchmark_price",
            },
        )?;

        self.current_rs = bound_percent(self.current_rs);
        for horizon in Horizon::ALL {
            let h = self.horizon_mut(horizon);
            h.price = bound_price(h.price);
            h.benchmark_price = bound_price(h.benchmark_price);
            h.symbol_return = bound_percent(h.symbol_return);
            h.benchmark_return = bound_percent(h.benchmark_return);
            h.relative_strength = bound_percent(h.relative_strength);
            if h.relative_strength.is_none() {
                h.is_fallback = false;
            }
        }

        self.entity_ma_200 = bound_moving_average(self.entity_ma_200);
        self.benchmark_ma_200 = bound_moving_average(self.benchmark_ma_200);

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weinstein_stage_table() {
        assert_eq!(WeinsteinStage::classify(110.0, 100.0, Some(true)).number(), 2);
        assert_eq!(WeinsteinStage::classify(90.0, 100.0, Some(true)).number(), 1);
        assert_eq!(WeinsteinStage::classify(110.0, 100.0, Some(false)).number(), 3);
        assert_eq!(WeinsteinStage::classify(90.0, 100.0, Some(false)).number(), 4);
    }

    #[test]
    fn test_unknown_trend_is_treated_as_falling() {
        assert_eq!(
            WeinsteinStage::classify(110.0, 100.0, None),
            WeinsteinStage::Distribution
        );
        assert_eq!(WeinsteinStage::from_number(4), Some(WeinsteinStage::Declining));
        assert_eq!(WeinsteinStage::from_number(7), None);
    }

    fn record() -> RelativeStrengthRecord {
        RelativeStrengthRecord {
            symbol: "Banks".to_string(),
            entity_type: EntityType::IndustryIndex,
            entity_name: "Banks".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            benchmark_symbol: "^CRSLDX".to_string(),
            current_price: 1234.5,
            benchmark_price: 20000.0,
            current_rs: Some(104.2),
            d30: HorizonStrength {
                relative_strength: Some(f64::NAN),
                is_fallback: true,
                ..Default::default()
            },
            d90: HorizonStrength {
                symbol_return: Some(-123456.0),
                ..Default::default()
            },
            d180: HorizonStrength::default(),
            entity_ma_200: Some(1100.0),
            entity_ma_trend_up: Some(true),
            entity_stage: Some(WeinsteinStage::Advancing),
            benchmark_ma_200: Some(19000.0),
            benchmark_ma_trend_up: None,
            benchmark_stage: Some(WeinsteinStage::Distribution),
            ma_window: 200,
        }
    }

    #[test]
    fn test_validate_bounds_fields() {
        let r = record().validate().unwrap();
        assert_eq!(r.d30.relative_strength, None);
        assert!(!r.d30.is_fallback);
        assert_eq!(r.d90.symbol_return, Some(-9999.0));
    }

    #[test]
    fn test_validate_rejects_market_index_and_missing_benchmark_price() {
        let mut r = record();
        r.entity_type = EntityType::MarketIndex;
        assert!(r.validate().is_err());

        let mut r = record();
        r.benchmark_price = -1.0;
        assert_eq!(
            r.validate(),
            Err(CalcError::NonFiniteResult {
                field: "benchmark_price"
            })
        );
    }
}
