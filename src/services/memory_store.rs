use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{
    EntityType, Horizon, IndustryIndexPoint, IndustrySummary, Listing, MomentumRecord,
    PriceObservation, PriceSeries, RelativeStrengthRecord,
};
use crate::services::store::{
    IndexStore, MembershipProvider, MomentumStatistics, MomentumStore, PriceProvider,
    RelativeStrengthStore, StrengthRankingQuery,
};

type StrengthKey = (String, NaiveDate, String);

#[derive(Default)]
struct MemoryData {
    listings: BTreeMap<String, Listing>,
    prices: HashMap<String, BTreeMap<NaiveDate, PriceObservation>>,
    index_points: BTreeMap<(String, NaiveDate), IndustryIndexPoint>,
    momentum: BTreeMap<(String, NaiveDate), MomentumRecord>,
    strength: BTreeMap<StrengthKey, RelativeStrengthRecord>,
}

/// In-memory backend implementing every port, with the same upsert and
/// ranking semantics as the SQLite store
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_listings(&self, listings: &[Listing]) -> usize {
        let mut data = self.data.write().await;
        for listing in listings {
            data.listings.insert(listing.symbol.clone(), listing.clone());
        }
        listings.len()
    }

    pub async fn upsert_prices(&self, symbol: &str, observations: &[PriceObservation]) -> usize {
        let mut data = self.data.write().await;
        let entry = data.prices.entry(symbol.to_string()).or_default();
        for obs in observations {
            entry.insert(obs.date, obs.clone());
        }
        observations.len()
    }

    pub async fn momentum_count(&self) -> usize {
        self.data.read().await.momentum.len()
    }

    pub async fn relative_strength_count(&self) -> usize {
        self.data.read().await.strength.len()
    }
}

fn latest_date<'a, T: 'a>(
    records: impl Iterator<Item = &'a T>,
    date_of: impl Fn(&T) -> NaiveDate,
) -> Option<NaiveDate> {
    records.map(date_of).max()
}

fn sort_desc_by<T>(records: &mut [T], key: impl Fn(&T) -> Option<f64>) {
    records.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[async_trait]
impl PriceProvider for MemoryStore {
    async fn get_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let data = self.data.read().await;
        let observations = match data.prices.get(symbol) {
            Some(prices) if start <= end => {
                prices.range(start..=end).map(|(_, o)| o.clone()).collect()
            }
            _ => Vec::new(),
        };
        Ok(PriceSeries::new(observations))
    }
}

#[async_trait]
impl MembershipProvider for MemoryStore {
    async fn list_listings(&self) -> Result<Vec<Listing>> {
        Ok(self.data.read().await.listings.values().cloned().collect())
    }

    async fn get_industries(&self, min_constituents: usize) -> Result<Vec<IndustrySummary>> {
        let data = self.data.read().await;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for listing in data.listings.values().filter(|l| !l.is_index) {
            if let Some(industry) = &listing.industry {
                *counts.entry(industry.as_str()).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .filter(|(_, count)| *count >= min_constituents)
            .map(|(industry, constituent_count)| IndustrySummary {
                industry: industry.to_string(),
                constituent_count,
            })
            .collect())
    }

    async fn get_constituents(&self, industry: &str) -> Result<Vec<String>> {
        let data = self.data.read().await;
        Ok(data
            .listings
            .values()
            .filter(|l| !l.is_index && l.industry.as_deref() == Some(industry))
            .map(|l| l.symbol.clone())
            .collect())
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn upsert_index_points(&self, points: &[IndustryIndexPoint]) -> Result<usize> {
        let mut data = self.data.write().await;
        for point in points {
            data.index_points
                .insert((point.industry.clone(), point.date), point.clone());
        }
        Ok(points.len())
    }

    async fn get_index_points(
        &self,
        industry: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<IndustryIndexPoint>> {
        let data = self.data.read().await;
        Ok(data
            .index_points
            .values()
            .filter(|p| p.industry == industry && p.date >= start && p.date <= end)
            .cloned()
            .collect())
    }

    async fn index_industries(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>> {
        let data = self.data.read().await;
        let industries: BTreeSet<String> = data
            .index_points
            .values()
            .filter(|p| p.date >= start && p.date <= end)
            .map(|p| p.industry.clone())
            .collect();
        Ok(industries.into_iter().collect())
    }

    async fn index_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let data = self.data.read().await;
        let dates: BTreeSet<NaiveDate> = data
            .index_points
            .keys()
            .map(|(_, date)| *date)
            .filter(|d| *d >= start && *d <= end)
            .collect();
        Ok(dates.into_iter().collect())
    }

    async fn latest_index_values(&self) -> Result<Vec<IndustryIndexPoint>> {
        let data = self.data.read().await;
        let mut latest: BTreeMap<&str, &IndustryIndexPoint> = BTreeMap::new();
        for point in data.index_points.values() {
            // Keys are ordered by (industry, date), so the last write per industry wins
            latest.insert(point.industry.as_str(), point);
        }
        Ok(latest.into_values().cloned().collect())
    }
}

#[async_trait]
impl MomentumStore for MemoryStore {
    async fn upsert_momentum(&self, records: &[MomentumRecord]) -> Result<usize> {
        let mut data = self.data.write().await;
        for record in records {
            data.momentum
                .insert((record.symbol.clone(), record.date), record.clone());
        }
        Ok(records.len())
    }

    async fn momentum_exists(&self, symbol: &str, date: NaiveDate) -> Result<bool> {
        let data = self.data.read().await;
        Ok(data.momentum.contains_key(&(symbol.to_string(), date)))
    }

    async fn get_momentum(&self, symbol: &str, date: NaiveDate) -> Result<Option<MomentumRecord>> {
        let data = self.data.read().await;
        Ok(data.momentum.get(&(symbol.to_string(), date)).cloned())
    }

    async fn top_momentum(
        &self,
        horizon: Horizon,
        limit: usize,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<MomentumRecord>> {
        let data = self.data.read().await;
        let matching: Vec<&MomentumRecord> = data
            .momentum
            .values()
            .filter(|r| entity_type.map_or(true, |t| r.entity_type == t))
            .collect();
        let Some(latest) = latest_date(matching.iter().copied(), |r| r.date) else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<MomentumRecord> = matching
            .into_iter()
            .filter(|r| r.date == latest && r.horizon(horizon).momentum_pct.is_some())
            .cloned()
            .collect();
        sort_desc_by(&mut ranked, |r| r.horizon(horizon).momentum_pct);
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn momentum_history(&self, symbol: &str, limit: usize) -> Result<Vec<MomentumRecord>> {
        let data = self.data.read().await;
        Ok(data
            .momentum
            .values()
            .filter(|r| r.symbol == symbol)
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn momentum_statistics(&self) -> Result<Vec<MomentumStatistics>> {
        let data = self.data.read().await;
        let mut stats = Vec::new();
        for entity_type in [EntityType::Stock, EntityType::IndustryIndex, EntityType::MarketIndex] {
            let of_type: Vec<&MomentumRecord> = data
                .momentum
                .values()
                .filter(|r| r.entity_type == entity_type)
                .collect();
            let Some(latest) = latest_date(of_type.iter().copied(), |r| r.date) else {
                continue;
            };
            let on_latest: Vec<&MomentumRecord> =
                of_type.into_iter().filter(|r| r.date == latest).collect();

            let pcts: Vec<f64> = on_latest.iter().filter_map(|r| r.d30.momentum_pct).collect();
            let vols: Vec<f64> = on_latest.iter().filter_map(|r| r.volatility_30d).collect();
            let mean = |v: &[f64]| (!v.is_empty()).then(|| v.iter().sum::<f64>() / v.len() as f64);

            stats.push(MomentumStatistics {
                entity_type,
                date: latest,
                count: on_latest.len(),
                avg_momentum_30d_pct: mean(&pcts),
                max_momentum_30d_pct: pcts.iter().copied().reduce(f64::max),
                min_momentum_30d_pct: pcts.iter().copied().reduce(f64::min),
                avg_volatility_30d: mean(&vols),
            });
        }
        Ok(stats)
    }

    async fn delete_momentum_before(&self, date: NaiveDate) -> Result<u64> {
        let mut data = self.data.write().await;
        let before = data.momentum.len();
        data.momentum.retain(|(_, d), _| *d >= date);
        Ok((before - data.momentum.len()) as u64)
    }
}

#[async_trait]
impl RelativeStrengthStore for MemoryStore {
    async fn upsert_relative_strength(&self, records: &[RelativeStrengthRecord]) -> Result<usize> {
        let mut data = self.data.write().await;
        for record in records {
            data.strength.insert(
                (record.symbol.clone(), record.date, record.benchmark_symbol.clone()),
                record.clone(),
            );
        }
        Ok(records.len())
    }

    async fn relative_strength_exists(
        &self,
        symbol: &str,
        date: NaiveDate,
        benchmark_symbol: &str,
    ) -> Result<bool> {
        let data = self.data.read().await;
        Ok(data
            .strength
            .contains_key(&(symbol.to_string(), date, benchmark_symbol.to_string())))
    }

    async fn get_relative_strength(
        &self,
        symbol: &str,
        date: NaiveDate,
        benchmark_symbol: &str,
    ) -> Result<Option<RelativeStrengthRecord>> {
        let data = self.data.read().await;
        Ok(data
            .strength
            .get(&(symbol.to_string(), date, benchmark_symbol.to_string()))
            .cloned())
    }

    async fn top_relative_strength(
        &self,
        query: &StrengthRankingQuery,
    ) -> Result<Vec<RelativeStrengthRecord>> {
        let data = self.data.read().await;
        let matching: Vec<&RelativeStrengthRecord> = data
            .strength
            .values()
            .filter(|r| {
                r.benchmark_symbol == query.benchmark_symbol
                    && query.entity_type.map_or(true, |t| r.entity_type == t)
            })
            .collect();
        let Some(latest) = latest_date(matching.iter().copied(), |r| r.date) else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<RelativeStrengthRecord> = matching
            .into_iter()
            .filter(|r| r.date == latest && query.accepts(r))
            .cloned()
            .collect();
        sort_desc_by(&mut ranked, |r| r.horizon(query.horizon).relative_strength);
        ranked.truncate(query.limit);
        Ok(ranked)
    }

    async fn relative_strength_history(
        &self,
        symbol: &str,
        benchmark_symbol: &str,
        limit: usize,
    ) -> Result<Vec<RelativeStrengthRecord>> {
        let data = self.data.read().await;
        let mut history: Vec<RelativeStrengthRecord> = data
            .strength
            .values()
            .filter(|r| r.symbol == symbol && r.benchmark_symbol == benchmark_symbol)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.date.cmp(&a.date));
        history.truncate(limit);
        Ok(history)
    }

    async fn delete_relative_strength_before(&self, date: NaiveDate) -> Result<u64> {
        let mut data = self.data.write().await;
        let before = data.strength.len();
        data.strength.retain(|(_, d, _), _| *d >= date);
        Ok((before - data.strength.len()) as u64)
    }
}
