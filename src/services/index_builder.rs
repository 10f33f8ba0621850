use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::constants::{INDEX_DECIMALS, MIN_INDEX_CONSTITUENTS};
use crate::error::{CalcError, Result};
use crate::models::{
    index_points_to_series, ConstituentSeries, IndexBuildSummary, IndustryIndexPoint, PriceSeries,
};
use crate::services::store::Stores;
use crate::utils::round_to;

/// One point of a freshly built equal-weighted index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexValue {
    pub date: NaiveDate,
    pub index_value: f64,
    pub stock_count: usize,
}

/// Build an equal-weighted index from constituent price histories.
///
/// Constituents are aligned on the union of their dates and carried
/// forward across gaps. Each day's index return is the plain mean of the
/// simple returns of every constituent with data in the window. Before its
/// first valid price, on that first day and on carried-forward days a
/// constituent contributes a 0 return. The first date equals `base_value`
/// exactly.
///
/// Closes that are not finite or not positive are treated as missing.
/// Returns an empty series when no constituent has data.
pub fn build_index(constituents: &ConstituentSeries, base_value: f64) -> Vec<IndexValue> {
    let cleaned: Vec<PriceSeries> = constituents
        .values()
        .map(|series| {
            PriceSeries::new(
                series
                    .observations()
                    .iter()
                    .filter(|o| o.close.is_finite() && o.close > 0.0)
                    .cloned()
                    .collect(),
            )
        })
        .filter(|series| !series.is_empty())
        .collect();

    if cleaned.is_empty() {
        return Vec::new();
    }

    let dates: BTreeSet<NaiveDate> = cleaned
        .iter()
        .flat_map(|s| s.observations().iter().map(|o| o.date))
        .collect();

    let mut cursors = vec![0usize; cleaned.len()];
    let mut last_close: Vec<Option<f64>> = vec![None; cleaned.len()];
    let mut index_value = base_value;
    let mut output = Vec::with_capacity(dates.len());

    let participants = cleaned.len() as f64;

    for (day, date) in dates.into_iter().enumerate() {
        let mut return_sum = 0.0;
        let mut real_count = 0usize;

        for (k, series) in cleaned.iter().enumerate() {
            let observations = series.observations();
            let today = observations
                .get(cursors[k])
                .filter(|o| o.date == date)
                .map(|o| o.close);

            // Not started, first price or carried forward: 0 return
            if let (Some(close), Some(prev)) = (today, last_close[k]) {
                return_sum += close / prev - 1.0;
            }

            if let Some(close) = today {
                cursors[k] += 1;
                real_count += 1;
                last_close[k] = Some(close);
            }
        }

        if day > 0 {
            index_value *= 1.0 + return_sum / participants;
        }

        output.push(IndexValue {
            date,
            index_value,
            stock_count: real_count,
        });
    }

    output
}

/// Builds and persists equal-weighted industry indices
pub struct IndexBuilder {
    stores: Stores,
}

impl IndexBuilder {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Build one industry's index over `[start, end]` (not persisted).
    ///
    /// Fails with `InsufficientConstituents` below 3 members; returns an
    /// empty list when the members have no prices in the window.
    pub async fn build_industry_index(
        &self,
        industry: &str,
        start: NaiveDate,
        end: NaiveDate,
        base_value: f64,
    ) -> Result<Vec<IndustryIndexPoint>> {
        let constituents = self.stores.membership.get_constituents(industry).await?;
        if constituents.len() < MIN_INDEX_CONSTITUENTS {
            return Err(CalcError::InsufficientConstituents {
                industry: industry.to_string(),
                required: MIN_INDEX_CONSTITUENTS,
                available: constituents.len(),
            }
            .into());
        }

        // Constituent reads are independent and read-only
        let loads = constituents.iter().map(|symbol| async move {
            let series = self.stores.prices.get_prices(symbol, start, end).await;
            (symbol.clone(), series)
        });

        let mut series_by_symbol = ConstituentSeries::new();
        for (symbol, series) in join_all(loads).await {
            series_by_symbol.insert(symbol, series?);
        }

        let points: Vec<IndustryIndexPoint> = build_index(&series_by_symbol, base_value)
            .into_iter()
            .map(|v| IndustryIndexPoint {
                industry: industry.to_string(),
                date: v.date,
                index_value: round_to(v.index_value, INDEX_DECIMALS),
                stock_count: v.stock_count,
                base_value,
            })
            .collect();

        debug!(
            industry = industry,
            constituents = constituents.len(),
            points = points.len(),
            "Index builder: industry built"
        );
        Ok(points)
    }

    /// Stored index points for `industry` as a price series
    pub async fn get_index_series(
        &self,
        industry: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let points = self.stores.indices.get_index_points(industry, start, end).await?;
        Ok(index_points_to_series(&points))
    }

    /// Rebuild every industry with enough constituents over
    /// `[end - period_days, end]` and upsert the points
    pub async fn build_all_industry_indices(
        &self,
        end: NaiveDate,
        period_days: i64,
        base_value: f64,
    ) -> Result<IndexBuildSummary> {
        let start = end - Duration::days(period_days);
        let industries = self
            .stores
            .membership
            .get_industries(MIN_INDEX_CONSTITUENTS)
            .await?;

        info!(
            industries = industries.len(),
            start = %start,
            end = %end,
            "Index builder: building industry indices"
        );

        let mut summary = IndexBuildSummary::default();
        for industry in industries {
            let name = industry.industry;
            let points = match self.build_industry_index(&name, start, end, base_value).await {
                Ok(points) => points,
                Err(e) => {
                    warn!(industry = %name, error = %e, "Index builder: build failed");
                    summary.errors.push((name, e.to_string()));
                    continue;
                }
            };

            if points.is_empty() {
                warn!(industry = %name, "Index builder: no price data in window");
                summary.skipped.push(name);
                continue;
            }

            match self.stores.indices.upsert_index_points(&points).await {
                Ok(written) => {
                    summary.industries_built += 1;
                    summary.points_written += written;
                }
                Err(e) => {
                    warn!(industry = %name, error = %e, "Index builder: persistence failed");
                    summary.errors.push((name, e.to_string()));
                }
            }
        }

        info!(
            built = summary.industries_built,
            points = summary.points_written,
            skipped = summary.skipped.len(),
            errors = summary.errors.len(),
            "Index builder: completed"
        );
        Ok(summary)
    }
}
