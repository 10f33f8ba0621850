use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::models::{
    MomentumRecord, Quadrant, QuadrantJourney, QuadrantPoint, QuadrantTransition,
    RelativeStrengthRecord,
};
use crate::services::store::Stores;
use crate::utils::round_to;

/// Pair a momentum and a relative strength record into a chart point.
///
/// Returns `None` when either 30-day value is missing.
pub fn quadrant_point(
    momentum: &MomentumRecord,
    strength: &RelativeStrengthRecord,
) -> Option<QuadrantPoint> {
    let momentum_pct = momentum.d30.momentum_pct?;
    let relative_strength = strength.d30.relative_strength?;
    Some(QuadrantPoint {
        symbol: momentum.symbol.clone(),
        date: momentum.date,
        price: momentum.current_price,
        momentum_pct,
        relative_strength,
        quadrant: Quadrant::classify(momentum_pct, relative_strength),
    })
}

/// Summarise a path of points (any order) through the quadrants
pub fn quadrant_journey(symbol: &str, points: &[QuadrantPoint]) -> Option<QuadrantJourney> {
    let mut path: Vec<&QuadrantPoint> = points.iter().collect();
    path.sort_by_key(|p| p.date);
    let (first, last) = (*path.first()?, *path.last()?);

    let time_pct = Quadrant::ALL
        .iter()
        .map(|q| {
            let n = path.iter().filter(|p| p.quadrant == *q).count();
            (*q, round_to(n as f64 / path.len() as f64 * 100.0, 2))
        })
        .collect();

    let transitions = path
        .windows(2)
        .filter(|w| w[0].quadrant != w[1].quadrant)
        .map(|w| QuadrantTransition {
            date: w[1].date,
            from: w[0].quadrant,
            to: w[1].quadrant,
        })
        .collect();

    let price_change_pct = if first.price > 0.0 {
        round_to((last.price - first.price) / first.price * 100.0, 4)
    } else {
        0.0
    };

    Some(QuadrantJourney {
        symbol: symbol.to_string(),
        time_pct,
        transitions,
        start_quadrant: first.quadrant,
        end_quadrant: last.quadrant,
        price_change_pct,
        momentum_change: round_to(last.momentum_pct - first.momentum_pct, 4),
        rs_change: round_to(last.relative_strength - first.relative_strength, 4),
    })
}

/// Rotation chart queries over stored momentum and relative strength
pub struct QuadrantAnalyzer {
    stores: Stores,
    benchmark_symbol: String,
}

impl QuadrantAnalyzer {
    pub fn new(stores: Stores, benchmark_symbol: impl Into<String>) -> Self {
        Self {
            stores,
            benchmark_symbol: benchmark_symbol.into(),
        }
    }

    /// Every industry with both records on `date`, grouped by quadrant
    pub async fn industry_quadrants(
        &self,
        date: NaiveDate,
    ) -> Result<BTreeMap<&'static str, Vec<QuadrantPoint>>> {
        let industries = self.stores.indices.latest_index_values().await?;

        let mut grouped: BTreeMap<&'static str, Vec<QuadrantPoint>> = Quadrant::ALL
            .iter()
            .map(|q| (q.as_str(), Vec::new()))
            .collect();

        for point in industries {
            let industry = point.industry;
            let momentum = self.stores.momentum.get_momentum(&industry, date).await?;
            let strength = self
                .stores
                .relative_strength
                .get_relative_strength(&industry, date, &self.benchmark_symbol)
                .await?;

            match momentum.zip(strength).and_then(|(m, s)| quadrant_point(&m, &s)) {
                Some(point) => grouped.entry(point.quadrant.as_str()).or_default().push(point),
                None => debug!(industry = %industry, date = %date, "Quadrants: incomplete data"),
            }
        }

        for points in grouped.values_mut() {
            points.sort_by(|a, b| {
                b.relative_strength
                    .partial_cmp(&a.relative_strength)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        Ok(grouped)
    }

    /// Journey over the most recent `limit` dates with both records
    pub async fn journey(&self, symbol: &str, limit: usize) -> Result<Option<QuadrantJourney>> {
        let momentum = self.stores.momentum.momentum_history(symbol, limit).await?;
        let strength: BTreeMap<NaiveDate, RelativeStrengthRecord> = self
            .stores
            .relative_strength
            .relative_strength_history(symbol, &self.benchmark_symbol, limit)
            .await?
            .into_iter()
            .map(|r| (r.date, r))
            .collect();

        let points: Vec<QuadrantPoint> = momentum
            .iter()
            .filter_map(|m| strength.get(&m.date).and_then(|s| quadrant_point(m, s)))
            .collect();
        Ok(quadrant_journey(symbol, &points))
    }
}
