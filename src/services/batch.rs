use chrono::{Duration, NaiveDate};
use futures::future::join_all;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::models::{
    BatchConfig, BatchStats, MomentumRecord, PriceSeries, RelativeStrengthConfig,
    RelativeStrengthRecord,
};
use crate::services::momentum::MomentumCalculator;
use crate::services::relative_strength::RelativeStrengthCalculator;
use crate::services::store::{EntityRef, Stores};

/// Which analytic a batch run produces
#[derive(Debug, Clone, PartialEq)]
pub enum BatchKind {
    Momentum,
    RelativeStrength(RelativeStrengthConfig),
}

impl BatchKind {
    pub fn label(&self) -> &'static str {
        match self {
            BatchKind::Momentum => "momentum",
            BatchKind::RelativeStrength(_) => "relative_strength",
        }
    }
}

/// Drives the engines over a date range with resume checks.
///
/// Each worker owns one date: it loads the benchmark once, sweeps every
/// entity, and persists that date's records in a single upsert.
pub struct HistoricalBatch {
    stores: Stores,
    config: BatchConfig,
    progress: Option<ProgressBar>,
    stop: Arc<AtomicBool>,
}

impl HistoricalBatch {
    pub fn new(stores: Stores, config: BatchConfig) -> Self {
        Self {
            stores,
            config,
            progress: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Advance `progress` by one per completed date
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Once set, no new date groups are launched
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Distinct industries present in the index table within `[start, end]`
    pub async fn industries_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<String>> {
        self.stores.indices.index_industries(start, end).await
    }

    /// Trading dates are the distinct index dates, not a generated calendar
    pub async fn trading_dates_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        self.stores.indices.index_dates(start, end).await
    }

    /// Backfill every industry over `[end - lookback_days, end]`
    pub async fn generate_industry_history(
        &self,
        kind: &BatchKind,
        end: NaiveDate,
    ) -> Result<BatchStats> {
        let start = end - Duration::days(self.config.lookback_days);
        let industries = self.industries_in_range(start, end).await?;
        if industries.is_empty() {
            return Err(AppError::NotFound(format!(
                "No industry index data between {} and {}",
                start, end
            )));
        }

        let entities: Vec<EntityRef> = industries.into_iter().map(EntityRef::industry).collect();
        self.generate_range(kind, &entities, start, end).await
    }

    /// Compute `kind` for every (entity, trading date) pair in `[start, end]`.
    ///
    /// Pairs whose record already exists count as successful without being
    /// recomputed, so interrupted runs resume where they stopped.
    pub async fn generate_range(
        &self,
        kind: &BatchKind,
        entities: &[EntityRef],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BatchStats> {
        let dates = self.trading_dates_in_range(start, end).await?;
        let entities = Arc::new(entities.to_vec());
        let concurrent_dates = self.config.concurrent_dates.max(1);

        info!(
            kind = kind.label(),
            entities = entities.len(),
            dates = dates.len(),
            start = %start,
            end = %end,
            concurrent_dates = concurrent_dates,
            "Batch: starting historical generation"
        );

        if let Some(pb) = &self.progress {
            pb.set_length(dates.len() as u64);
        }

        let mut stats = BatchStats::default();

        for (group_idx, date_group) in dates.chunks(concurrent_dates).enumerate() {
            if self.stop.load(Ordering::Relaxed) {
                warn!(
                    completed_groups = group_idx,
                    "Batch: stop requested, not launching further dates"
                );
                break;
            }

            let mut tasks = Vec::with_capacity(date_group.len());
            for date in date_group {
                let worker = DateWorker {
                    stores: self.stores.clone(),
                    kind: kind.clone(),
                    entities: entities.clone(),
                    date: *date,
                    persist_retries: self.config.persist_retries,
                };
                tasks.push(tokio::spawn(async move { worker.run().await }));
            }

            let results = join_all(tasks).await;
            for (date, task_result) in date_group.iter().zip(results) {
                match task_result {
                    Ok(date_stats) => stats.merge(date_stats),
                    Err(e) => {
                        error!(date = %date, error = %e, "Batch: date worker panicked");
                        stats.merge(BatchStats {
                            failed: entities.len(),
                            total: entities.len(),
                            ..Default::default()
                        });
                    }
                }
                if let Some(pb) = &self.progress {
                    pb.inc(1);
                }
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_with_message("Batch complete");
        }

        info!(
            kind = kind.label(),
            successful = stats.successful,
            failed = stats.failed,
            total = stats.total,
            already_satisfied = stats.already_satisfied,
            success_rate = stats.success_rate(),
            "Batch: historical generation completed"
        );
        Ok(stats)
    }
}

/// Records produced for one date
enum DateRecords {
    Momentum(Vec<MomentumRecord>),
    RelativeStrength(Vec<RelativeStrengthRecord>),
}

impl DateRecords {
    fn len(&self) -> usize {
        match self {
            DateRecords::Momentum(r) => r.len(),
            DateRecords::RelativeStrength(r) => r.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One date's full entity sweep
struct DateWorker {
    stores: Stores,
    kind: BatchKind,
    entities: Arc<Vec<EntityRef>>,
    date: NaiveDate,
    persist_retries: usize,
}

impl DateWorker {
    async fn exists(&self, entity: &EntityRef) -> Result<bool> {
        match &self.kind {
            BatchKind::Momentum => {
                self.stores
                    .momentum
                    .momentum_exists(&entity.symbol, self.date)
                    .await
            }
            BatchKind::RelativeStrength(config) => {
                self.stores
                    .relative_strength
                    .relative_strength_exists(&entity.symbol, self.date, &config.benchmark_symbol)
                    .await
            }
        }
    }

    async fn run(self) -> BatchStats {
        let mut stats = BatchStats {
            total: self.entities.len(),
            ..Default::default()
        };

        // Resume check first: a fully satisfied date needs no benchmark
        let mut pending = Vec::new();
        for entity in self.entities.iter() {
            match self.exists(entity).await {
                Ok(true) => {
                    stats.successful += 1;
                    stats.already_satisfied += 1;
                }
                Ok(false) => pending.push(entity),
                Err(e) => {
                    warn!(
                        date = %self.date,
                        symbol = %entity.symbol,
                        error = %e,
                        "Batch: existence check failed"
                    );
                    stats.failed += 1;
                }
            }
        }

        if pending.is_empty() {
            debug!(date = %self.date, "Batch: date already satisfied");
            return stats;
        }

        let records = match &self.kind {
            BatchKind::Momentum => {
                let calculator = MomentumCalculator::new(self.stores.clone());
                let mut records = Vec::with_capacity(pending.len());
                for entity in &pending {
                    match calculator.compute_momentum_for(entity, self.date).await {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            debug!(
                                date = %self.date,
                                symbol = %entity.symbol,
                                error = %e,
                                "Batch: momentum skipped"
                            );
                            stats.failed += 1;
                        }
                    }
                }
                DateRecords::Momentum(records)
            }
            BatchKind::RelativeStrength(config) => {
                let calculator =
                    RelativeStrengthCalculator::new(self.stores.clone(), config.clone());
                let benchmark: PriceSeries = match calculator.load_benchmark(self.date).await {
                    Ok(series) => series,
                    Err(e) => {
                        warn!(
                            date = %self.date,
                            error = %e,
                            "Batch: benchmark unavailable,
                            failing date"
                        );
                        stats.failed += pending.len();
                        stats.missing_benchmark_dates.push(self.date);
                        return stats;
                    }
                };

                let mut records = Vec::with_capacity(pending.len());
                for entity in &pending {
                    match calculator
                        .compute_with_benchmark(entity, &benchmark, self.date)
                        .await
                    {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            debug!(
                                date = %self.date,
                                symbol = %entity.symbol,
                                error = %e,
                                "Batch: relative strength skipped"
                            );
                            stats.failed += 1;
                        }
                    }
                }
                DateRecords::RelativeStrength(records)
            }
        };

        if records.is_empty() {
            return stats;
        }

        match self.persist(&records).await {
            Ok(written) => {
                stats.successful += records.len();
                stats.records_written += written;
            }
            Err(e) => {
                error!(
                    date = %self.date,
                    records = records.len(),
                    error = %e,
                    "Batch: persistence failed"
                );
                stats.failed += records.len();
                stats.persistence_failed_dates.push(self.date);
            }
        }

        debug!(
            date = %self.date,
            successful = stats.successful,
            failed = stats.failed,
            "Batch: date complete"
        );
        stats
    }

    /// One upsert per date, retried `persist_retries` times
    async fn persist(&self, records: &DateRecords) -> Result<usize> {
        let mut attempt = 0;
        loop {
            let result = match records {
                DateRecords::Momentum(r) => self.stores.momentum.upsert_momentum(r).await,
                DateRecords::RelativeStrength(r) => {
                    self.stores.relative_strength.upsert_relative_strength(r).await
                }
            };
            match result {
                Ok(written) => return Ok(written),
                Err(e) if attempt < self.persist_retries => {
                    attempt += 1;
                    warn!(
                        date = %self.date,
                        attempt = attempt,
                        error = %e,
                        "Batch: retrying persistence"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, Horizon, IndustryIndexPoint, PriceObservation};
    use crate::services::memory_store::MemoryStore;
    use crate::services::store::{
        IndexStore, MomentumStatistics, MomentumStore, PriceProvider, RelativeStrengthStore,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    const BENCHMARK: &str = "^CRSLDX";
    const INDUSTRIES: [&str; 5] = ["Banks", "Cement", "IT", "Pharma", "Power"];

    fn end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    /// 320 consecutive daily index points per industry plus the benchmark
    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let days = 320;

        let mut points = Vec::new();
        for (i, industry) in INDUSTRIES.iter().enumerate() {
            for back in 0..days {
                let step = (days - back) as f64;
                points.push(IndustryIndexPoint {
                    industry: industry.to_string(),
                    date: end() - Duration::days(back),
                    index_value: 1000.0 + step * (i as f64 + 1.0) * 0.5,
                    stock_count: 3,
                    base_value: 1000.0,
                });
            }
        }
        store.upsert_index_points(&points).await.unwrap();

        let benchmark: Vec<PriceObservation> = (0..days)
            .map(|back| {
                PriceObservation::close_only(
                    end() - Duration::days(back),
                    18000.0 + (days - back) as f64 * 2.0,
                )
            })
            .collect();
        store.upsert_prices(BENCHMARK, &benchmark).await;
        store
    }

    fn industries() -> Vec<EntityRef> {
        INDUSTRIES.iter().map(|i| EntityRef::industry(*i)).collect()
    }

    fn rs_kind() -> BatchKind {
        BatchKind::RelativeStrength(RelativeStrengthConfig::new(BENCHMARK))
    }

    /// Serves an empty benchmark for one date
    struct BenchmarkGap {
        inner: Arc<MemoryStore>,
        missing_on: NaiveDate,
    }

    #[async_trait]
    impl PriceProvider for BenchmarkGap {
        async fn get_prices(
            &self,
            symbol: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceSeries> {
            if symbol == BENCHMARK && end == self.missing_on {
                return Ok(PriceSeries::default());
            }
            self.inner.get_prices(symbol, start, end).await
        }
    }

    /// Fails the first `failures` upserts
    struct FlakyMomentum {
        inner: Arc<MemoryStore>,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl MomentumStore for FlakyMomentum {
        async fn upsert_momentum(&self, records: &[MomentumRecord]) -> Result<usize> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(AppError::Database("database is locked".to_string()));
            }
            self.inner.upsert_momentum(records).await
        }

        async fn momentum_exists(&self, symbol: &str, date: NaiveDate) -> Result<bool> {
            self.inner.momentum_exists(symbol, date).await
        }

        async fn get_momentum(
            &self,
            symbol: &str,
            date: NaiveDate,
        ) -> Result<Option<MomentumRecord>> {
            self.inner.get_momentum(symbol, date).await
        }

        async fn top_momentum(
            &self,
            horizon: Horizon,
            limit: usize,
            entity_type: Option<EntityType>,
        ) -> Result<Vec<MomentumRecord>> {
            self.inner.top_momentum(horizon, limit, entity_type).await
        }

        async fn momentum_history(
            &self,
            symbol: &str,
            limit: usize,
        ) -> Result<Vec<MomentumRecord>> {
            self.inner.momentum_history(symbol, limit).await
        }

        async fn momentum_statistics(&self) -> Result<Vec<MomentumStatistics>> {
            self.inner.momentum_statistics().await
        }

        async fn delete_momentum_before(&self, date: NaiveDate) -> Result<u64> {
            self.inner.delete_momentum_before(date).await
        }
    }

    #[tokio::test]
    async fn test_missing_benchmark_fails_only_that_date() {
        let store = seeded_store().await;
        let bad_date = end() - Duration::days(4);
        let stores = Stores::from_backend(store.clone()).with_prices(Arc::new(BenchmarkGap {
            inner: store.clone(),
            missing_on: bad_date,
        }));

        let batch = HistoricalBatch::new(stores, BatchConfig::default());
        let start = end() - Duration::days(9);
        let stats = batch
            .generate_range(&rs_kind(), &industries(), start, end())
            .await
            .unwrap();

        // Every entity of the gap date fails; the other nine dates complete
        assert_eq!(stats.total, 50);
        assert_eq!(stats.successful, 45);
        assert_eq!(stats.failed, 5);
        assert_eq!(stats.success_rate(), 90.0);
        assert_eq!(stats.missing_benchmark_dates, vec![bad_date]);
        assert_eq!(store.relative_strength_count().await, 45);
        assert!(!store
            .relative_strength_exists("IT", bad_date, BENCHMARK)
            .await
            .unwrap());

        // A healthy rerun only fills the gap
        let batch =
            HistoricalBatch::new(Stores::from_backend(store.clone()), BatchConfig::default());
        let stats = batch
            .generate_range(&rs_kind(), &industries(), start, end())
            .await
            .unwrap();
        assert_eq!(stats.already_satisfied, 45);
        assert_eq!(stats.successful, 50);
        assert_eq!(stats.records_written, 5);
        assert_eq!(store.relative_strength_count().await, 50);
    }

    #[tokio::test]
    async fn test_second_run_is_fully_satisfied() {
        let store = seeded_store().await;
        let batch = HistoricalBatch::new(
            Stores::from_backend(store.clone()),
            BatchConfig::default().with_lookback_days(9),
        );

        let first = batch
            .generate_industry_history(&BatchKind::Momentum, end())
            .await
            .unwrap();
        assert_eq!(first.total, 50);
        assert_eq!(first.successful, 50);
        assert_eq!(first.already_satisfied, 0);

        let mut stored = Vec::new();
        for industry in INDUSTRIES {
            stored.push(store.momentum_history(industry, 20).await.unwrap());
        }
        assert!(stored.iter().all(|history| history.len() == 10));

        let second = batch
            .generate_industry_history(&BatchKind::Momentum, end())
            .await
            .unwrap();
        assert_eq!(second.already_satisfied, second.total);
        assert_eq!(second.records_written, 0);
        assert_eq!(second.success_rate(), 100.0);
        assert_eq!(store.momentum_count().await, 50);

        for (industry, before) in INDUSTRIES.iter().zip(&stored) {
            let after = store.momentum_history(industry, 20).await.unwrap();
            assert_eq!(&after, before);
        }
    }

    #[tokio::test]
    async fn test_persistence_is_retried_then_counted_failed() {
        let store = seeded_store().await;
        let date = end();

        let mut stores = Stores::from_backend(store.clone());
        stores.momentum = Arc::new(FlakyMomentum {
            inner: store.clone(),
            failures: AtomicUsize::new(1),
        });
        let batch = HistoricalBatch::new(stores, BatchConfig::default().with_persist_retries(1));
        let stats = batch
            .generate_range(&BatchKind::Momentum, &industries(), date, date)
            .await
            .unwrap();
        assert_eq!(stats.successful, 5);
        assert!(stats.persistence_failed_dates.is_empty());

        let mut stores = Stores::from_backend(store.clone());
        stores.momentum = Arc::new(FlakyMomentum {
            inner: store.clone(),
            failures: AtomicUsize::new(usize::MAX),
        });
        let batch = HistoricalBatch::new(stores, BatchConfig::default().with_persist_retries(2));
        let earlier = date - Duration::days(1);
        let stats = batch
            .generate_range(&BatchKind::Momentum, &industries(), earlier, earlier)
            .await
            .unwrap();
        assert_eq!(stats.failed, 5);
        assert_eq!(stats.persistence_failed_dates, vec![earlier]);
    }

    #[tokio::test]
    async fn test_stop_handle_prevents_new_dates() {
        let store = seeded_store().await;
        let batch =
            HistoricalBatch::new(Stores::from_backend(store.clone()), BatchConfig::default());
        batch.stop_handle().store(true, Ordering::Relaxed);

        let stats = batch
            .generate_range(&BatchKind::Momentum, &industries(), end() - Duration::days(5), end())
            .await
            .unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(store.momentum_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_industries_is_not_found() {
        let batch = HistoricalBatch::new(
            Stores::from_backend(Arc::new(MemoryStore::new())),
            BatchConfig::default(),
        );
        let err = batch
            .generate_industry_history(&BatchKind::Momentum, end())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
