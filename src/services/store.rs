//! Persistence ports consumed by the analytics components.
//!
//! Every component receives its ports explicitly through [`Stores`];
//! there is no shared global connection.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{
    index_points_to_series, EntityType, Horizon, IndustryIndex, IndustryIndexPoint,
    IndustrySummary, Listing, MarketIndex, MomentumRecord, PriceSeries, PricedEntity,
    RelativeStrengthRecord, Stock,
};

/// Source of raw daily prices (stocks and market indices)
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Observations for `symbol` dated within `[start, end]`, ascending
    async fn get_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries>;
}

/// Listing metadata and industry membership
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn list_listings(&self) -> Result<Vec<Listing>>;

    /// Industries with at least `min_constituents` stocks
    async fn get_industries(&self, min_constituents: usize) -> Result<Vec<IndustrySummary>>;

    async fn get_constituents(&self, industry: &str) -> Result<Vec<String>>;
}

/// Equal-weighted industry index points, keyed by (industry, date)
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn upsert_index_points(&self, points: &[IndustryIndexPoint]) -> Result<usize>;

    async fn get_index_points(
        &self,
        industry: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<IndustryIndexPoint>>;

    /// Distinct industries with points in `[start, end]`
    async fn index_industries(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>>;

    /// Distinct dates with points in `[start, end]`, ascending
    async fn index_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>>;

    /// Latest point per industry
    async fn latest_index_values(&self) -> Result<Vec<IndustryIndexPoint>>;
}

/// Momentum records, keyed by (symbol, date)
#[async_trait]
pub trait MomentumStore: Send + Sync {
    async fn upsert_momentum(&self, records: &[MomentumRecord]) -> Result<usize>;

    async fn momentum_exists(&self, symbol: &str, date: NaiveDate) -> Result<bool>;

    async fn get_momentum(&self, symbol: &str, date: NaiveDate) -> Result<Option<MomentumRecord>>;

    /// Top `limit` records on the latest date, by pct momentum descending, nulls skipped
    async fn top_momentum(
        &self,
        horizon: Horizon,
        limit: usize,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<MomentumRecord>>;

    /// Most recent `limit` records for one symbol, newest first
    async fn momentum_history(&self, symbol: &str, limit: usize) -> Result<Vec<MomentumRecord>>;

    /// Per entity type statistics on the latest date
    async fn momentum_statistics(&self) -> Result<Vec<MomentumStatistics>>;

    async fn delete_momentum_before(&self, date: NaiveDate) -> Result<u64>;
}

/// Relative strength records, keyed by (symbol, date, benchmark_symbol)
#[async_trait]
pub trait RelativeStrengthStore: Send + Sync {
    async fn upsert_relative_strength(&self, records: &[RelativeStrengthRecord]) -> Result<usize>;

    async fn relative_strength_exists(
        &self,
        symbol: &str,
        date: NaiveDate,
        benchmark_symbol: &str,
    ) -> Result<bool>;

    async fn get_relative_strength(
        &self,
        symbol: &str,
        date: NaiveDate,
        benchmark_symbol: &str,
    ) -> Result<Option<RelativeStrengthRecord>>;

    async fn top_relative_strength(
        &self,
        query: &StrengthRankingQuery,
    ) -> Result<Vec<RelativeStrengthRecord>>;

    async fn relative_strength_history(
        &self,
        symbol: &str,
        benchmark_symbol: &str,
        limit: usize,
    ) -> Result<Vec<RelativeStrengthRecord>>;

    async fn delete_relative_strength_before(&self, date: NaiveDate) -> Result<u64>;
}

/// Top-N relative strength query on the latest date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthRankingQuery {
    pub horizon: Horizon,
    pub limit: usize,
    pub entity_type: Option<EntityType>,
    pub benchmark_symbol: String,
    /// Rank values that are current RS substituted for a missing historical RS
    pub include_fallback: bool,
}

impl StrengthRankingQuery {
    pub fn new(horizon: Horizon, limit: usize, benchmark_symbol: impl Into<String>) -> Self {
        Self {
            horizon,
            limit,
            entity_type: None,
            benchmark_symbol: benchmark_symbol.into(),
            include_fallback: false,
        }
    }

    /// Does a record qualify under this query's filters?
    pub fn accepts(&self, record: &RelativeStrengthRecord) -> bool {
        let h = record.horizon(self.horizon);
        record.benchmark_symbol == self.benchmark_symbol
            && self.entity_type.map_or(true, |t| record.entity_type == t)
            && h.relative_strength.is_some()
            && (self.include_fallback || !h.is_fallback)
    }
}

/// 30-day momentum statistics for one entity type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumStatistics {
    pub entity_type: EntityType,
    pub date: NaiveDate,
    pub count: usize,
    pub avg_momentum_30d_pct: Option<f64>,
    pub max_momentum_30d_pct: Option<f64>,
    pub min_momentum_30d_pct: Option<f64>,
    pub avg_volatility_30d: Option<f64>,
}

/// Identifies an entity to load and analyse
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub symbol: String,
    pub name: String,
    pub entity_type: EntityType,
}

impl EntityRef {
    pub fn industry(industry: impl Into<String>) -> Self {
        let industry = industry.into();
        Self {
            name: format!("{} Industry Index", industry),
            symbol: industry,
            entity_type: EntityType::IndustryIndex,
        }
    }

    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            symbol: listing.symbol.clone(),
            name: listing.name.clone(),
            entity_type: listing.entity_type(),
        }
    }
}

/// Bundle of ports handed to every analytics component
#[derive(Clone)]
pub struct Stores {
    pub prices: Arc<dyn PriceProvider>,
    pub membership: Arc<dyn MembershipProvider>,
    pub indices: Arc<dyn IndexStore>,
    pub momentum: Arc<dyn MomentumStore>,
    pub relative_strength: Arc<dyn RelativeStrengthStore>,
}

impl Stores {
    /// Use one backend for every port
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: PriceProvider
            + MembershipProvider
            + IndexStore
            + MomentumStore
            + RelativeStrengthStore
            + 'static,
    {
        Self {
            prices: backend.clone(),
            membership: backend.clone(),
            indices: backend.clone(),
            momentum: backend.clone(),
            relative_strength: backend,
        }
    }

    /// Replace the price provider (e.g. with a caching or failing wrapper)
    pub fn with_prices(mut self, prices: Arc<dyn PriceProvider>) -> Self {
        self.prices = prices;
        self
    }

    /// Load an entity's series over `[start, end]` as a typed priced entity
    pub async fn load_entity(
        &self,
        entity: &EntityRef,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Box<dyn PricedEntity>> {
        let loaded: Box<dyn PricedEntity> = match entity.entity_type {
            EntityType::IndustryIndex => {
                let points = self
                    .indices
                    .get_index_points(&entity.symbol, start, end)
                    .await?;
                Box::new(IndustryIndex::new(
                    entity.symbol.clone(),
                    index_points_to_series(&points),
                ))
            }
            EntityType::Stock => Box::new(Stock {
                symbol: entity.symbol.clone(),
                name: entity.name.clone(),
                industry: None,
                series: self.prices.get_prices(&entity.symbol, start, end).await?,
            }),
            EntityType::MarketIndex => Box::new(MarketIndex {
                symbol: entity.symbol.clone(),
                name: entity.name.clone(),
                series: self.prices.get_prices(&entity.symbol, start, end).await?,
            }),
        };
        Ok(loaded)
    }
}
