use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Rotation quadrant from 30-day momentum and 30-day relative strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quadrant {
    Leaders,
    Improving,
    Weakening,
    Laggards,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::Leaders,
        Quadrant::Improving,
        Quadrant::Weakening,
        Quadrant::Laggards,
    ];

    pub fn classify(momentum_pct: f64, relative_strength: f64) -> Self {
        match (momentum_pct >= 0.0, relative_strength >= 100.0) {
            (true, true) => Quadrant::Leaders,
            (true, false) => Quadrant::Improving,
            (false, true) => Quadrant::Weakening,
            (false, false) => Quadrant::Laggards,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::Leaders => "leaders",
            Quadrant::Improving => "improving",
            Quadrant::Weakening => "weakening",
            Quadrant::Laggards => "laggards",
        }
    }
}

/// One entity's position on the rotation chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadrantPoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub price: f64,
    pub momentum_pct: f64,
    pub relative_strength: f64,
    pub quadrant: Quadrant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadrantTransition {
    pub date: NaiveDate,
    pub from: Quadrant,
    pub to: Quadrant,
}

/// Summary of a path through the quadrants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadrantJourney {
    pub symbol: String,
    /// Share of points spent in each quadrant, in `Quadrant::ALL` order
    pub time_pct: Vec<(Quadrant, f64)>,
    pub transitions: Vec<QuadrantTransition>,
    pub start_quadrant: Quadrant,
    pub end_quadrant: Quadrant,
    pub price_change_pct: f64,
    pub momentum_change: f64,
    pub rs_change: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant_boundaries() {
        assert_eq!(Quadrant::classify(0.0, 100.0), Quadrant::Leaders);
        assert_eq!(Quadrant::classify(5.0, 99.9), Quadrant::Improving);
        assert_eq!(Quadrant::classify(-0.1, 100.0), Quadrant::Weakening);
        assert_eq!(Quadrant::classify(-3.0, 80.0), Quadrant::Laggards);
    }
}
