use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::validation::{
    bound_abs_momentum, bound_percent, bound_price, bound_volatility, bound_volume,
};
use super::{EntityType, Horizon};
use crate::error::CalcError;

/// Price change versus the calendar-aligned price at one horizon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonMomentum {
    /// Historical price found by the calendar-day lookup
    pub price: Option<f64>,
    pub momentum: Option<f64>,
    pub momentum_pct: Option<f64>,
}

/// Momentum analysis for one entity on one date, keyed by (symbol, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumRecord {
    pub symbol: String,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub date: NaiveDate,
    pub current_price: f64,
    pub d30: HorizonMomentum,
    pub d90: HorizonMomentum,
    pub d180: HorizonMomentum,
    pub volatility_30d: Option<f64>,
    pub volume_avg_30d: Option<i64>,
}

impl MomentumRecord {
    pub fn horizon(&self, horizon: Horizon) -> &HorizonMomentum {
        match horizon {
            Horizon::Days30 => &self.d30,
            Horizon::Days90 => &self.d90,
            Horizon::Days180 => &self.d180,
        }
    }

    pub fn horizon_mut(&mut self, horizon: Horizon) -> &mut HorizonMomentum {
        match horizon {
            Horizon::Days30 => &mut self.d30,
            Horizon::Days90 => &mut self.d90,
            Horizon::Days180 => &mut self.d180,
        }
    }

    /// Apply storage bounds.
    ///
    /// A missing symbol/name or an invalid current price rejects the record;
    /// every other field is clamped or nulled.
    pub fn validate(mut self) -> Result<Self, CalcError> {
        if self.symbol.trim().is_empty() {
            return Err(CalcError::NonFiniteResult { field: "symbol" });
        }
        if self.entity_name.trim().is_empty() {
            return Err(CalcError::NonFiniteResult {
                field: "entity_name",
            });
        }

        self.current_price = bound_price(Some(self.current_price)).ok_or(
            CalcError::NonFiniteResult {
                field: "current_price",
            },
        )?;

        for horizon in Horizon::ALL {
            let h = self.horizon_mut(horizon);
            h.price = bound_price(h.price);
            h.momentum = bound_abs_momentum(h.momentum);
            h.momentum_pct = bound_percent(h.momentum_pct);
        }

        self.volatility_30d = bound_volatility(self.volatility_30d);
        self.volume_avg_30d = bound_volume(self.volume_avg_30d);

        Ok(self)
    }
}
