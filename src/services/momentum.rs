use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::constants::{
    MAX_ABS_MOMENTUM, MAX_PERCENT, MIN_INDEX_CONSTITUENTS, MIN_MOMENTUM_OBSERVATIONS,
    MOMENTUM_LOOKBACK_DAYS, VOLATILITY_WINDOW_DAYS,
};
use crate::error::{CalcError, Result};
use crate::models::indicators::volatility;
use crate::models::{
    closes, BatchStats, Horizon, HorizonMomentum, MomentumRecord, PricedEntity,
};
use crate::services::series::{average_volume, find_value_at_offset, trailing_window};
use crate::services::store::{EntityRef, Stores};

/// Absolute and percentage change from `historical` to `current`.
///
/// Absolute change is capped at ±999999 and percentage at ±9999. A missing,
/// zero or negative historical price yields no momentum.
pub fn price_momentum(current: f64, historical: Option<f64>) -> (Option<f64>, Option<f64>) {
    let Some(historical) = historical.filter(|h| *h > 0.0 && h.is_finite()) else {
        return (None, None);
    };

    let momentum = current - historical;
    let momentum_pct = momentum / historical * 100.0;
    if !momentum.is_finite() || !momentum_pct.is_finite() {
        return (None, None);
    }

    (
        Some(momentum.clamp(-MAX_ABS_MOMENTUM, MAX_ABS_MOMENTUM)),
        Some(momentum_pct.clamp(-MAX_PERCENT, MAX_PERCENT)),
    )
}

/// Momentum of one entity as of `as_of`.
///
/// Only observations dated on or before `as_of` are considered; at least
/// 30 of them are required. The result has already passed validation.
pub fn compute_momentum(
    entity: &dyn PricedEntity,
    as_of: NaiveDate,
) -> std::result::Result<MomentumRecord, CalcError> {
    let series = entity.series();
    let history = series.up_to(as_of);
    if history.len() < MIN_MOMENTUM_OBSERVATIONS {
        return Err(CalcError::InsufficientHistory {
            required: MIN_MOMENTUM_OBSERVATIONS,
            available: history.len(),
        });
    }

    let current_price = history
        .last()
        .map(|o| o.close)
        .ok_or(CalcError::InsufficientHistory {
            required: MIN_MOMENTUM_OBSERVATIONS,
            available: 0,
        })?;

    let mut record = MomentumRecord {
        symbol: entity.symbol().to_string(),
        entity_type: entity.entity_type(),
        entity_name: entity.name().to_string(),
        date: as_of,
        current_price,
        d30: HorizonMomentum::default(),
        d90: HorizonMomentum::default(),
        d180: HorizonMomentum::default(),
        volatility_30d: None,
        volume_avg_30d: None,
    };

    for horizon in Horizon::ALL {
        let price = find_value_at_offset(series, as_of, horizon.days());
        let (momentum, momentum_pct) = price_momentum(current_price, price);
        *record.horizon_mut(horizon) = HorizonMomentum {
            price,
            momentum,
            momentum_pct,
        };
    }

    let window = trailing_window(series, as_of, VOLATILITY_WINDOW_DAYS);
    if window.len() >= 2 {
        record.volatility_30d = volatility(&closes(window));
    }
    record.volume_avg_30d = average_volume(window);

    record.validate()
}

/// Loads price series through the stores and runs the momentum engine
pub struct MomentumCalculator {
    stores: Stores,
}

impl MomentumCalculator {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Load `entity` and compute its momentum as of `as_of` (not persisted)
    pub async fn compute_momentum_for(
        &self,
        entity: &EntityRef,
        as_of: NaiveDate,
    ) -> Result<MomentumRecord> {
        let start = as_of - Duration::days(MOMENTUM_LOOKBACK_DAYS);
        let loaded = self.stores.load_entity(entity, start, as_of).await?;
        Ok(compute_momentum(loaded.as_ref(), as_of)?)
    }

    /// Compute and upsert momentum for one entity
    pub async fn update_momentum_for(
        &self,
        entity: &EntityRef,
        as_of: NaiveDate,
    ) -> Result<MomentumRecord> {
        let record = self.compute_momentum_for(entity, as_of).await?;
        self.stores
            .momentum
            .upsert_momentum(std::slice::from_ref(&record))
            .await?;
        Ok(record)
    }

    /// Every entity that receives a momentum record: stocks, industry
    /// indices with enough constituents, then market indices
    pub async fn momentum_universe(&self) -> Result<Vec<EntityRef>> {
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
        entities.extend(
            listings
                .iter()
                .filter(|l| l.is_index)
                .map(EntityRef::from_listing),
        );
        Ok(entities)
    }

    /// Daily run: compute every entity for `as_of` and upsert them in one batch
    pub async fn calculate_all_momentum(&self, as_of: NaiveDate) -> Result<BatchStats> {
        let entities = self.momentum_universe().await?;
        info!(date = %as_of, entities = entities.len(), "Momentum: starting daily calculation");

        let mut stats = BatchStats {
            total: entities.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(entities.len());

        for entity in &entities {
            match self.compute_momentum_for(entity, as_of).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(symbol = %entity.symbol, error = %e, "Momentum: skipped");
                    stats.failed += 1;
                }
            }
        }

        match self.stores.momentum.upsert_momentum(&records).await {
            Ok(written) => {
                stats.successful = records.len();
                stats.records_written = written;
            }
            Err(e) => {
                warn!(date = %as_of, error = %e, "Momentum: persistence failed");
                stats.failed += records.len();
                stats.persistence_failed_dates.push(as_of);
            }
        }

        info!(
            date = %as_of,
            successful = stats.successful,
            failed = stats.failed,
            success_rate = stats.success_rate(),
            "Momentum: daily calculation completed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, IndustryIndex, PriceObservation, PriceSeries, Stock};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    /// One observation per calendar day going back `days`, price = f(days_back)
    fn daily_stock(days: i64, price: impl Fn(i64) -> f64) -> Stock {
        let observations = (0..days)
            .map(|back| {
                PriceObservation::close_only(as_of() - Duration::days(back), price(back))
                    .with_volume(1000 + back)
            })
            .collect();
        Stock {
            symbol: "INFY".to_string(),
            name: "Infosys".to_string(),
            industry: Some("IT".to_string()),
            series: PriceSeries::new(observations),
        }
    }

    #[test]
    fn test_price_momentum_caps_percentage() {
        let (momentum, pct) = price_momentum(10000.0, Some(0.0001));
        assert_eq!(pct, Some(9999.0));
        assert!((momentum.unwrap() - 9999.9999).abs() < 1e-9);
        assert_eq!(price_momentum(100.0, Some(0.0)), (None, None));
        assert_eq!(price_momentum(100.0, None), (None, None));
    }

    #[test]
    fn test_momentum_bound_through_engine() {
        // 0.0001 until 30 days ago, 10000 afterwards
        let stock = daily_stock(200, |back| if back >= 30 { 0.0001 } else { 10000.0 });
        let record = compute_momentum(&stock, as_of()).unwrap();
        assert_eq!(record.d30.momentum_pct, Some(9999.0));
        assert_eq!(record.current_price, 10000.0);
    }

    #[test]
    fn test_momentum_horizons_use_calendar_lookup() {
        let stock = daily_stock(200, |back| 1000.0 - back as f64);
        let record = compute_momentum(&stock, as_of()).unwrap();

        assert_eq!(record.entity_type, EntityType::Stock);
        assert_eq!(record.d30.price, Some(970.0));
        assert_eq!(record.d30.momentum, Some(30.0));
        assert_eq!(record.d90.price, Some(910.0));
        assert_eq!(record.d180.price, Some(820.0));
        assert!(record.volatility_30d.unwrap() > 0.0);
        // Window covers 31 days (back 0..=30), volumes 1000..=1030
        assert_eq!(record.volume_avg_30d, Some(1015));
    }

    #[test]
    fn test_short_history_leaves_long_horizons_empty() {
        let stock = daily_stock(60, |_| 50.0);
        let record = compute_momentum(&stock, as_of()).unwrap();
        assert_eq!(record.d30.momentum_pct, Some(0.0));
        assert_eq!(record.d90, HorizonMomentum::default());
        assert_eq!(record.d180, HorizonMomentum::default());
        assert_eq!(record.volatility_30d, Some(0.0));
    }

    #[test]
    fn test_insufficient_history_is_skipped() {
        let stock = daily_stock(10, |_| 50.0);
        assert_eq!(
            compute_momentum(&stock, as_of()),
            Err(CalcError::InsufficientHistory {
                required: 30,
                available: 10
            })
        );
    }

    #[test]
    fn test_future_observations_are_ignored() {
        let stock = daily_stock(100, |back| 100.0 + back as f64);
        let earlier = as_of() - Duration::days(5);
        let record = compute_momentum(&stock, earlier).unwrap();
        assert_eq!(record.date, earlier);
        assert_eq!(record.current_price, 105.0);
    }

    #[test]
    fn test_industry_index_has_no_volume() {
        let series = PriceSeries::from_closes(
            (0..60).map(|back| (as_of() - Duration::days(back), 1000.0 + back as f64)),
        );
        let index = IndustryIndex::new("IT", series);
        let record = compute_momentum(&index, as_of()).unwrap();
        assert_eq!(record.entity_type, EntityType::IndustryIndex);
        assert_eq!(record.entity_name, "IT Industry Index");
        assert_eq!(record.volume_avg_30d, None);
    }

    #[tokio::test]
    async fn test_daily_pipeline_covers_every_entity_type() {
        use crate::models::{IndustryIndexPoint, Listing};
        use crate::services::memory_store::MemoryStore;
        use crate::services::store::{IndexStore, MomentumStore};
        use std::sync::Arc;

        let store = Arc::new(MemoryStore::new());
        let listing = |symbol: &str, industry: Option<&str>, is_index: bool| Listing {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            industry: industry.map(str::to_string),
            is_index,
        };
        store
            .upsert_listings(&[
                listing("TCS", Some("IT"), false),
                listing("INFY", Some("IT"), false),
                listing("WIPRO", Some("IT"), false),
                listing("NEWCO", Some("IT"), false),
                listing("^CRSLDX", None, true),
            ])
            .await;

        for symbol in ["TCS", "INFY", "WIPRO", "^CRSLDX"] {
            let stock = daily_stock(100, |back| 500.0 - back as f64);
            store.upsert_prices(symbol, stock.series.observations()).await;
        }
        // Too short to qualify
        let short = daily_stock(5, |_| 10.0);
        store.upsert_prices("NEWCO", short.series.observations()).await;

        let points: Vec<IndustryIndexPoint> = (0..100)
            .map(|back| IndustryIndexPoint {
                industry: "IT".to_string(),
                date: as_of() - Duration::days(back),
                index_value: 1000.0 + back as f64,
                stock_count: 4,
                base_value: 1000.0,
            })
            .collect();
        store.upsert_index_points(&points).await.unwrap();

        let calculator = MomentumCalculator::new(Stores::from_backend(store.clone()));
        let stats = calculator.calculate_all_momentum(as_of()).await.unwrap();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.successful, 5);
        assert_eq!(stats.failed, 1);

        let industry = store.get_momentum("IT", as_of()).await.unwrap().unwrap();
        assert_eq!(industry.entity_type, EntityType::IndustryIndex);
        let index = store.get_momentum("^CRSLDX", as_of()).await.unwrap().unwrap();
        assert_eq!(index.entity_type, EntityType::MarketIndex);
    }
}
