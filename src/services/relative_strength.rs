use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::constants::{MAX_PERCENT, MIN_INDEX_CONSTITUENTS, RS_LOOKBACK_DAYS};
use crate::error::{CalcError, Result};
use crate::models::indicators::{ma_trend_up, moving_average, percent_change};
use crate::models::{
    closes, BatchStats, Horizon, HorizonStrength, PriceSeries, PricedEntity,
    RelativeStrengthConfig, RelativeStrengthRecord, WeinsteinStage,
};
use crate::services::series::{find_value_at_offset, target_date};
use crate::services::store::{EntityRef, Stores};

/// Mansfield relative strength: `(price / ma) / (benchmark_price / benchmark_ma) * 100`.
///
/// 100 means in line with the benchmark relative to both long-term trends.
/// Any zero or non-finite input yields `None`; the result is clamped to ±9999.
pub fn mansfield_rs(price: f64, ma: f64, benchmark_price: f64, benchmark_ma: f64) -> Option<f64> {
    let inputs = [price, ma, benchmark_price, benchmark_ma];
    if inputs.iter().any(|v| *v == 0.0 || !v.is_finite()) {
        return None;
    }

    let entity_ratio = price / ma;
    let benchmark_ratio = benchmark_price / benchmark_ma;
    let rs = entity_ratio / benchmark_ratio * 100.0;

    rs.is_finite().then(|| rs.clamp(-MAX_PERCENT, MAX_PERCENT))
}

/// Shared MA window for two series, per the configured mode
fn common_window(
    config: &RelativeStrengthConfig,
    entity_len: usize,
    benchmark_len: usize,
) -> std::result::Result<usize, CalcError> {
    let shorter = entity_len.min(benchmark_len);
    config
        .ma_window_for(shorter)
        .ok_or(CalcError::InsufficientHistory {
            required: config.required_observations(),
            available: shorter,
        })
}

/// Re-derive the whole Mansfield formula from observations dated on or
/// before `as_of`. The benchmark side is read as of the entity's last
/// observation on or before `as_of`. `None` when either series is too
/// short at that point.
pub fn historical_mansfield_rs(
    entity: &PriceSeries,
    benchmark: &PriceSeries,
    as_of: NaiveDate,
    config: &RelativeStrengthConfig,
) -> Option<f64> {
    let entity_hist = entity.up_to(as_of);
    let current = entity_hist.last()?;
    let benchmark_hist = benchmark.up_to(current.date);
    let window = common_window(config, entity_hist.len(), benchmark_hist.len()).ok()?;

    let price = current.close;
    let benchmark_price = benchmark_hist.last()?.close;
    let ma = moving_average(&closes(entity_hist), window)?;
    let benchmark_ma = moving_average(&closes(benchmark_hist), window)?;

    mansfield_rs(price, ma, benchmark_price, benchmark_ma)
}

/// Relative strength of `entity` against `benchmark` as of `as_of`.
///
/// Historical RS at each horizon is a full re-derivation as of
/// `as_of - horizon`; when that is unavailable the current RS is
/// substituted and the horizon is flagged `is_fallback`.
pub fn compute_relative_strength(
    entity: &dyn PricedEntity,
    benchmark: &PriceSeries,
    benchmark_symbol: &str,
    as_of: NaiveDate,
    config: &RelativeStrengthConfig,
) -> std::result::Result<RelativeStrengthRecord, CalcError> {
    let series = entity.series();
    let entity_hist = series.up_to(as_of);
    let missing_benchmark = || CalcError::MissingBenchmarkData {
        benchmark: benchmark_symbol.to_string(),
        date: as_of,
    };

    if benchmark.up_to(as_of).is_empty() {
        return Err(missing_benchmark());
    }

    let current = entity_hist.last().ok_or(CalcError::InsufficientHistory {
        required: config.required_observations(),
        available: 0,
    })?;
    let current_price = current.close;

    // Benchmark price, MA and trend all as of the entity's last trading date
    let benchmark_hist = benchmark.up_to(current.date);
    let benchmark_price = benchmark_hist.last().map(|o| o.close).ok_or_else(missing_benchmark)?;

    let window = common_window(config, entity_hist.len(), benchmark_hist.len())?;

    let entity_closes = closes(entity_hist);
    let benchmark_closes = closes(benchmark_hist);

    let entity_ma = moving_average(&entity_closes, window);
    let benchmark_ma = moving_average(&benchmark_closes, window);
    let entity_trend = ma_trend_up(&entity_closes, window, config.trend_period);
    let benchmark_trend = ma_trend_up(&benchmark_closes, window, config.trend_period);

    let current_rs = match (entity_ma, benchmark_ma) {
        (Some(ma), Some(bma)) => mansfield_rs(current_price, ma, benchmark_price, bma),
        _ => None,
    };

    let mut record = RelativeStrengthRecord {
        symbol: entity.symbol().to_string(),
        entity_type: entity.entity_type(),
        entity_name: entity.name().to_string(),
        date: as_of,
        benchmark_symbol: benchmark_symbol.to_string(),
        current_price,
        benchmark_price,
        current_rs,
        d30: HorizonStrength::default(),
        d90: HorizonStrength::default(),
        d180: HorizonStrength::default(),
        entity_ma_200: entity_ma,
        entity_ma_trend_up: entity_trend,
        entity_stage: entity_ma.map(|ma| WeinsteinStage::classify(current_price, ma, entity_trend)),
        benchmark_ma_200: benchmark_ma,
        benchmark_ma_trend_up: benchmark_trend,
        benchmark_stage: benchmark_ma
            .map(|ma| WeinsteinStage::classify(benchmark_price, ma, benchmark_trend)),
        ma_window: window,
    };

    for horizon in Horizon::ALL {
        let historical = historical_mansfield_rs(
            series,
            benchmark,
            target_date(as_of, horizon.days()),
            config,
        );
        let (relative_strength, is_fallback) = match historical {
            Some(rs) => (Some(rs), false),
            None => (current_rs, current_rs.is_some()),
        };

        let price = find_value_at_offset(series, as_of, horizon.days());
        let benchmark_past = find_value_at_offset(benchmark, as_of, horizon.days());

        *record.horizon_mut(horizon) = HorizonStrength {
            price,
            benchmark_price: benchmark_past,
            symbol_return: price.and_then(|p| percent_change(current_price, p)),
            benchmark_return: benchmark_past.and_then(|p| percent_change(benchmark_price, p)),
            relative_strength,
            is_fallback,
        };
    }

    record.validate()
}

/// Loads entity and benchmark series and runs the relative strength engine
pub struct RelativeStrengthCalculator {
    stores: Stores,
    config: RelativeStrengthConfig,
}

impl RelativeStrengthCalculator {
    pub fn new(stores: Stores, config: RelativeStrengthConfig) -> Self {
        Self { stores, config }
    }

    pub fn config(&self) -> &RelativeStrengthConfig {
        &self.config
    }

    fn window_start(as_of: NaiveDate) -> NaiveDate {
        as_of - Duration::days(RS_LOOKBACK_DAYS)
    }

    /// Benchmark series ending at `as_of`; an empty series is an error
    pub async fn load_benchmark(&self, as_of: NaiveDate) -> Result<PriceSeries> {
        let series = self
            .stores
            .prices
            .get_prices(&self.config.benchmark_symbol, Self::window_start(as_of), as_of)
            .await?;
        if series.is_empty() {
            return Err(CalcError::MissingBenchmarkData {
                benchmark: self.config.benchmark_symbol.clone(),
                date: as_of,
            }
            .into());
        }
        Ok(series)
    }

    /// Compute against an already loaded benchmark (batch runs reuse it per date)
    pub async fn compute_with_benchmark(
        &self,
        entity: &EntityRef,
        benchmark: &PriceSeries,
        as_of: NaiveDate,
    ) -> Result<RelativeStrengthRecord> {
        let loaded = self
            .stores
            .load_entity(entity, Self::window_start(as_of), as_of)
            .await?;
        Ok(compute_relative_strength(
            loaded.as_ref(),
            benchmark,
            &self.config.benchmark_symbol,
            as_of,
            &self.config,
        )?)
    }

    /// Load `entity` and the benchmark and compute RS as of `as_of` (not persisted)
    pub async fn compute_relative_strength_for(
        &self,
        entity: &EntityRef,
        as_of: NaiveDate,
    ) -> Result<RelativeStrengthRecord> {
        let benchmark = self.load_benchmark(as_of).await?;
        self.compute_with_benchmark(entity, &benchmark, as_of).await
    }

    /// Compute and upsert relative strength for one entity
    pub async fn update_relative_strength_for(
        &self,
        entity: &EntityRef,
        as_of: NaiveDate,
    ) -> Result<RelativeStrengthRecord> {
        let record = self.compute_relative_strength_for(entity, as_of).await?;
        self.stores
            .relative_strength
            .upsert_relative_strength(std::slice::from_ref(&record))
            .await?;
        Ok(record)
    }

    /// Stocks and industry indices; market indices are never benchmarked
    pub async fn strength_universe(&self) -> Result<Vec<EntityRef>> {
        let listings = self.stores.membership.list_listings().await?;
        let industries = self
            .stores
            .membership
            .get_industries(MIN_INDEX_CONSTITUENTS)
            .await?;

        let mut entities: Vec<EntityRef> = listings
            .iter()
            .filter(|l| !l.is_index)
            .map(EntityRef::from_listing)
            .collect();
        entities.extend(industries.into_iter().map(|i| EntityRef::industry(i.industry)));
        Ok(entities)
    }

    /// Daily run for every stock and industry index on `as_of`
    pub async fn calculate_all_relative_strength(&self, as_of: NaiveDate) -> Result<BatchStats> {
        let entities = self.strength_universe().await?;
        let mut stats = BatchStats {
            total: entities.len(),
            ..Default::default()
        };

        info!(
            date = %as_of,
            entities = entities.len(),
            benchmark = %self.config.benchmark_symbol,
            strict_mode = self.config.strict_mode,
            "Relative strength: starting daily calculation"
        );

        let benchmark = match self.load_benchmark(as_of).await {
            Ok(series) => series,
            Err(e) => {
                warn!(date = %as_of, error = %e, "Relative strength: benchmark unavailable");
                stats.failed = entities.len();
                stats.missing_benchmark_dates.push(as_of);
                return Ok(stats);
            }
        };

        let mut records = Vec::with_capacity(entities.len());
        for entity in &entities {
            match self.compute_with_benchmark(entity, &benchmark, as_of).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(symbol = %entity.symbol, error = %e, "Relative strength: skipped");
                    stats.failed += 1;
                }
            }
        }

        match self
            .stores
            .relative_strength
            .upsert_relative_strength(&records)
            .await
        {
            Ok(written) => {
                stats.successful = records.len();
                stats.records_written = written;
            }
            Err(e) => {
                warn!(date = %as_of, error = %e, "Relative strength: persistence failed");
                stats.failed += records.len();
                stats.persistence_failed_dates.push(as_of);
            }
        }

        info!(
            date = %as_of,
            successful = stats.successful,
            failed = stats.failed,
            success_rate = stats.success_rate(),
            "Relative strength: daily calculation completed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, IndustryIndex, MarketIndex, Stock};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn daily(days: i64, price: impl Fn(i64) -> f64) -> PriceSeries {
        PriceSeries::from_closes(
            (0..days).map(|back| (as_of() - Duration::days(back), price(back))),
        )
    }

    fn stock(series: PriceSeries) -> Stock {
        Stock {
            symbol: "HDFCBANK".to_string(),
            name: "HDFC Bank".to_string(),
            industry: Some("Banks".to_string()),
            series,
        }
    }

    #[test]
    fn test_mansfield_baseline_is_exactly_100() {
        assert_eq!(mansfield_rs(110.0, 100.0, 110.0, 100.0), Some(100.0));
        assert_eq!(mansfield_rs(3.7, 3.1, 3.7, 3.1), Some(100.0));
    }

    #[test]
    fn test_mansfield_rejects_zero_and_caps() {
        assert_eq!(mansfield_rs(0.0, 100.0, 110.0, 100.0), None);
        assert_eq!(mansfield_rs(110.0, 100.0, 110.0, 0.0), None);
        assert_eq!(mansfield_rs(1e9, 1.0, 1.0, 1.0), Some(9999.0));
        assert_eq!(mansfield_rs(f64::NAN, 1.0, 1.0, 1.0), None);
    }

    #[test]
    fn test_identical_series_give_rs_100() {
        let series = daily(500, |back| 100.0 + (back % 7) as f64);
        let entity = stock(series.clone());
        let record = compute_relative_strength(
            &entity,
            &series,
            "^CRSLDX",
            as_of(),
            &RelativeStrengthConfig::default(),
        )
        .unwrap();

        assert_eq!(record.current_rs, Some(100.0));
        for horizon in Horizon::ALL {
            let h = record.horizon(horizon);
            assert_eq!(h.relative_strength, Some(100.0));
            assert!(!h.is_fallback);
        }
        assert_eq!(record.ma_window, 200);
        assert_eq!(record.entity_type, EntityType::Stock);
    }

    #[test]
    fn test_outperformer_above_100_and_stage_two() {
        // Entity rises steadily, benchmark flat
        let entity = stock(daily(500, |back| 1000.0 - back as f64));
        let benchmark = daily(500, |_| 100.0);
        let record = compute_relative_strength(
            &entity,
            &benchmark,
            "^CRSLDX",
            as_of(),
            &RelativeStrengthConfig::default(),
        )
        .unwrap();

        assert!(record.current_rs.unwrap() > 100.0);
        assert_eq!(record.entity_ma_trend_up, Some(true));
        assert_eq!(record.entity_stage, Some(WeinsteinStage::Advancing));
        // Flat benchmark: price == MA, trend not rising
        assert_eq!(record.benchmark_stage, Some(WeinsteinStage::Declining));
        assert_eq!(record.d30.benchmark_return, Some(0.0));
        assert!(record.d30.symbol_return.unwrap() > 0.0);
    }

    #[test]
    fn test_stale_entity_reads_benchmark_as_of_its_last_date() {
        // Entity stopped trading 20 days ago; the benchmark doubled since
        let entity = stock(PriceSeries::from_closes(
            (20..500).map(|back| (as_of() - Duration::days(back), 100.0)),
        ));
        let benchmark = daily(500, |back| if back < 20 { 200.0 } else { 100.0 });
        let record = compute_relative_strength(
            &entity,
            &benchmark,
            "^CRSLDX",
            as_of(),
            &RelativeStrengthConfig::default(),
        )
        .unwrap();

        assert_eq!(record.benchmark_price, 100.0);
        assert_eq!(record.benchmark_ma_200, Some(100.0));
        assert_eq!(record.current_rs, Some(100.0));
    }

    #[test]
    fn test_historical_shortfall_falls_back_with_flag() {
        // 250 daily observations: enough today, not 90 or 180 days ago
        let series = daily(250, |back| 200.0 - (back as f64) * 0.1);
        let entity = stock(series.clone());
        let benchmark = daily(250, |_| 50.0);
        let record = compute_relative_strength(
            &entity,
            &benchmark,
            "^CRSLDX",
            as_of(),
            &RelativeStrengthConfig::default(),
        )
        .unwrap();

        assert!(!record.d30.is_fallback);
        assert!(record.d90.is_fallback);
        assert!(record.d180.is_fallback);
        assert_eq!(record.d90.relative_strength, record.current_rs);
        assert_ne!(record.d30.relative_strength, record.current_rs);
    }

    #[test]
    fn test_insufficient_history_strict_and_relaxed() {
        let short = daily(10, |_| 10.0);
        let benchmark = daily(500, |_| 10.0);
        let entity = stock(short);

        let strict = compute_relative_strength(
            &entity,
            &benchmark,
            "^CRSLDX",
            as_of(),
            &RelativeStrengthConfig::default(),
        );
        assert_eq!(
            strict,
            Err(CalcError::InsufficientHistory {
                required: 200,
                available: 10
            })
        );

        let relaxed = compute_relative_strength(
            &entity,
            &benchmark,
            "^CRSLDX",
            as_of(),
            &RelativeStrengthConfig::default().relaxed(15),
        );
        assert!(matches!(relaxed, Err(CalcError::InsufficientHistory { .. })));
    }

    #[test]
    fn test_relaxed_mode_records_window() {
        let entity = IndustryIndex::new("Banks", daily(120, |back| 1000.0 + back as f64));
        let benchmark = daily(500, |_| 10.0);
        let config = RelativeStrengthConfig::default().relaxed(15);

        let record =
            compute_relative_strength(&entity, &benchmark, "^CRSLDX", as_of(), &config).unwrap();
        assert_eq!(record.ma_window, 60);
        assert_eq!(record.entity_type, EntityType::IndustryIndex);
    }

    #[test]
    fn test_missing_benchmark_and_market_index_rejected() {
        let series = daily(300, |_| 10.0);
        let entity = stock(series.clone());
        let result = compute_relative_strength(
            &entity,
            &PriceSeries::default(),
            "^CRSLDX",
            as_of(),
            &RelativeStrengthConfig::default(),
        );
        assert!(matches!(result, Err(CalcError::MissingBenchmarkData { .. })));

        let index = MarketIndex {
            symbol: "^NSEI".to_string(),
            name: "Nifty 50".to_string(),
            series: series.clone(),
        };
        let result = compute_relative_strength(
            &index,
            &series,
            "^CRSLDX",
            as_of(),
            &RelativeStrengthConfig::default(),
        );
        assert_eq!(
            result,
            Err(CalcError::NonFiniteResult {
                field: "entity_type"
            })
        );
    }

    #[tokio::test]
    async fn test_daily_pipeline_skips_market_indices() {
        use crate::models::Listing;
        use crate::services::memory_store::MemoryStore;
        use crate::services::store::RelativeStrengthStore;
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let listing = |symbol: &str, is_index: bool| Listing {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            industry: (!is_index).then(|| "Banks".to_string()),
            is_index,
        };
        store
            .upsert_listings(&[listing("HDFCBANK", false), listing("^CRSLDX", true)])
            .await;
        store
            .upsert_prices("HDFCBANK", daily(300, |back| 1600.0 - back as f64).observations())
            .await;

        let calculator = RelativeStrengthCalculator::new(
            Stores::from_backend(store.clone()),
            RelativeStrengthConfig::new("^CRSLDX"),
        );

        // No benchmark prices yet: the whole date fails without an error
        let stats = calculator.calculate_all_relative_strength(as_of()).await.unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.missing_benchmark_dates, vec![as_of()]);

        store
            .upsert_prices("^CRSLDX", daily(300, |_| 18000.0).observations())
            .await;
        let stats = calculator.calculate_all_relative_strength(as_of()).await.unwrap();
        assert_eq!(stats.successful, 1);

        let record = store
            .get_relative_strength("HDFCBANK", as_of(), "^CRSLDX")
            .await
            .unwrap()
            .unwrap();
        assert!(record.current_rs.unwrap() > 100.0);
        assert!(store
            .get_relative_strength("^CRSLDX", as_of(), "^CRSLDX")
            .await
            .unwrap()
            .is_none());
    }
}
