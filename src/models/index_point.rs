use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{PriceObservation, PriceSeries};

/// Equal-weighted index value for one industry on one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryIndexPoint {
    pub industry: String,
    pub date: NaiveDate,
    pub index_value: f64,
    /// Constituents with a real (not carried forward) price that day
    pub stock_count: usize,
    pub base_value: f64,
}

/// Convert stored index points into a close-only series for the engines
pub fn index_points_to_series(points: &[IndustryIndexPoint]) -> PriceSeries {
    PriceSeries::new(
        points
            .iter()
            .map(|p| PriceObservation::close_only(p.date, p.index_value))
            .collect(),
    )
}

/// Per-industry outcome of a full index rebuild
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexBuildSummary {
    pub industries_built: usize,
    pub points_written: usize,
    pub skipped: Vec<String>,
    pub errors: Vec<(String, String)>,
}
