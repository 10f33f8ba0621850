use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::{
    EntityType, Horizon, HorizonMomentum, HorizonStrength, IndustryIndexPoint, IndustrySummary,
    Listing, MomentumRecord, PriceObservation, PriceSeries, RelativeStrengthRecord,
    WeinsteinStage,
};
use crate::services::store::{
    IndexStore, MembershipProvider, MomentumStatistics, MomentumStore, PriceProvider,
    RelativeStrengthStore, StrengthRankingQuery,
};

/// Database schema version for migrations
const DB_SCHEMA_VERSION: &str = "1";

const MOMENTUM_COLUMNS: &[&str] = &[
    "symbol",
    "entity_type",
    "entity_name",
    "date",
    "current_price",
    "price_30d",
    "momentum_30d",
    "momentum_30d_pct",
    "price_90d",
    "momentum_90d",
    "momentum_90d_pct",
    "price_180d",
    "momentum_180d",
    "momentum_180d_pct",
    "volatility_30d",
    "volume_avg_30d",
];

const STRENGTH_COLUMNS: &[&str] = &[
    "symbol",
    "entity_type",
    "entity_name",
    "date",
    "benchmark_symbol",
    "current_price",
    "benchmark_price",
    "current_rs",
    "price_30d",
    "benchmark_price_30d",
    "symbol_return_30d",
    "benchmark_return_30d",
    "rs_30d",
    "rs_30d_is_fallback",
    "price_90d",
    "benchmark_price_90d",
    "symbol_return_90d",
    "benchmark_return_90d",
    "rs_90d",
    "rs_90d_is_fallback",
    "price_180d",
    "benchmark_price_180d",
    "symbol_return_180d",
    "benchmark_return_180d",
    "rs_180d",
    "rs_180d_is_fallback",
    "entity_ma_200",
    "entity_ma_trend_up",
    "entity_stage",
    "benchmark_ma_200",
    "benchmark_ma_trend_up",
    "benchmark_stage",
    "ma_window",
];

/// `INSERT .. ON CONFLICT(key) DO UPDATE` over every non-key column
fn upsert_statement(table: &str, columns: &[&str], key: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !key.contains(c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        key.join(", "),
        updates.join(", ")
    )
}

/// SQLite backend implementing every persistence port
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    database_path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database with WAL and a 30s busy timeout
    pub async fn new(database_path: PathBuf) -> Result<Self> {
        info!("Initializing SQLite database at: {:?}", database_path);

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(connect_options).await?;

        let store = Self {
            pool,
            database_path,
        };
        store.initialize_database().await?;

        info!("SQLite database initialized successfully");
        Ok(store)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    async fn initialize_database(&self) -> Result<()> {
        let tables = [
            r#"
            CREATE TABLE IF NOT EXISTS stocks (
                symbol TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                industry TEXT,
                is_index INTEGER NOT NULL DEFAULT 0,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS stock_prices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                date DATE NOT NULL,
                open REAL,
                high REAL,
                low REAL,
                close REAL NOT NULL,
                volume INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS equiweighted_index (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                industry TEXT NOT NULL,
                date DATE NOT NULL,
                index_value REAL NOT NULL,
                stock_count INTEGER NOT NULL,
                base_value REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS momentum_analysis (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_name TEXT NOT NULL,
                date DATE NOT NULL,
                current_price REAL NOT NULL,
                price_30d REAL,
                momentum_30d REAL,
                momentum_30d_pct REAL,
                price_90d REAL,
                momentum_90d REAL,
                momentum_90d_pct REAL,
                price_180d REAL,
                momentum_180d REAL,
                momentum_180d_pct REAL,
                volatility_30d REAL,
                volume_avg_30d INTEGER,
                calculated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS relative_strength_analysis (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_name TEXT NOT NULL,
                date DATE NOT NULL,
                benchmark_symbol TEXT NOT NULL,
                current_price REAL NOT NULL,
                benchmark_price REAL NOT NULL,
                current_rs REAL,
                price_30d REAL,
                benchmark_price_30d REAL,
                symbol_return_30d REAL,
                benchmark_return_30d REAL,
                rs_30d REAL,
                rs_30d_is_fallback INTEGER NOT NULL DEFAULT 0,
                price_90d REAL,
                benchmark_price_90d REAL,
                symbol_return_90d REAL,
                benchmark_return_90d REAL,
                rs_90d REAL,
                rs_90d_is_fallback INTEGER NOT NULL DEFAULT 0,
                price_180d REAL,
                benchmark_price_180d REAL,
                symbol_return_180d REAL,
                benchmark_return_180d REAL,
                rs_180d REAL,
                rs_180d_is_fallback INTEGER NOT NULL DEFAULT 0,
                entity_ma_200 REAL,
                entity_ma_trend_up INTEGER,
                entity_stage INTEGER,
                benchmark_ma_200 REAL,
                benchmark_ma_trend_up INTEGER,
                benchmark_stage INTEGER,
                ma_window INTEGER NOT NULL,
                calculated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        ];
        for table in tables {
            sqlx::query(table).execute(&self.pool).await?;
        }

        let indexes = [
            // Natural keys
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_stock_prices_unique ON stock_prices(symbol, date)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_equiweighted_index_unique ON equiweighted_index(industry, date)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_momentum_unique ON momentum_analysis(symbol, date)",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_relative_strength_unique ON relative_strength_analysis(symbol, date, benchmark_symbol)",
            // Latest-date rankings
            "CREATE INDEX IF NOT EXISTS idx_equiweighted_index_date ON equiweighted_index(date DESC)",
            "CREATE INDEX IF NOT EXISTS idx_momentum_type_date ON momentum_analysis(entity_type, date DESC)",
            "CREATE INDEX IF NOT EXISTS idx_relative_strength_bench_date ON relative_strength_analysis(benchmark_symbol, date DESC)",
            "CREATE INDEX IF NOT EXISTS idx_stocks_industry ON stocks(industry)",
        ];
        for index in indexes {
            sqlx::query(index).execute(&self.pool).await?;
        }

        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)")
            .bind(DB_SCHEMA_VERSION)
            .execute(&self.pool)
            .await?;

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Insert or update listing metadata
    pub async fn upsert_listings(&self, listings: &[Listing]) -> Result<usize> {
        if listings.is_empty() {
            return Ok(0);
        }

        let mut transaction = self.pool.begin().await?;
        let mut affected_rows = 0;
        for listing in listings {
            let result = sqlx::query(
                r#"
                INSERT INTO stocks (symbol, name, industry, is_index)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(symbol) DO UPDATE SET
                    name = excluded.name,
                    industry = excluded.industry,
                    is_index = excluded.is_index,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&listing.symbol)
            .bind(&listing.name)
            .bind(&listing.industry)
            .bind(listing.is_index)
            .execute(&mut *transaction)
            .await?;
            affected_rows += result.rows_affected() as usize;
        }
        transaction.commit().await?;
        Ok(affected_rows)
    }

    /// Insert or update daily prices for one symbol
    pub async fn upsert_prices(
        &self,
        symbol: &str,
        observations: &[PriceObservation],
    ) -> Result<usize> {
        if observations.is_empty() {
            return Ok(0);
        }

        let mut transaction = self.pool.begin().await?;
        let mut affected_rows = 0;
        for obs in observations {
            let result = sqlx::query(
                r#"
                INSERT INTO stock_prices (symbol, date, open, high, low, close, volume)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(symbol, date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume
                "#,
            )
            .bind(symbol)
            .bind(obs.date)
            .bind(obs.open)
            .bind(obs.high)
            .bind(obs.low)
            .bind(obs.close)
            .bind(obs.volume)
            .execute(&mut *transaction)
            .await?;
            affected_rows += result.rows_affected() as usize;
        }
        transaction.commit().await?;
        Ok(affected_rows)
    }

    /// Row counts and latest dates per table
    pub async fn get_database_stats(&self) -> Result<DatabaseStats> {
        let count = |table: &'static str| {
            let pool = self.pool.clone();
            async move {
                let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                    .fetch_one(&pool)
                    .await?;
                Ok::<i64, AppError>(n)
            }
        };
        let latest = |table: &'static str| {
            let pool = self.pool.clone();
            async move {
                let row = sqlx::query(&format!("SELECT MAX(date) AS latest FROM {}", table))
                    .fetch_one(&pool)
                    .await?;
                let latest: Option<NaiveDate> = row.try_get("latest").ok().flatten();
                Ok::<Option<NaiveDate>, AppError>(latest)
            }
        };

        Ok(DatabaseStats {
            listings: count("stocks").await?,
            price_rows: count("stock_prices").await?,
            index_points: count("equiweighted_index").await?,
            momentum_records: count("momentum_analysis").await?,
            relative_strength_records: count("relative_strength_analysis").await?,
            latest_price_date: latest("stock_prices").await?,
            latest_index_date: latest("equiweighted_index").await?,
            latest_momentum_date: latest("momentum_analysis").await?,
            latest_relative_strength_date: latest("relative_strength_analysis").await?,
        })
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite database connection pool closed");
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub listings: i64,
    pub price_rows: i64,
    pub index_points: i64,
    pub momentum_records: i64,
    pub relative_strength_records: i64,
    pub latest_price_date: Option<NaiveDate>,
    pub latest_index_date: Option<NaiveDate>,
    pub latest_momentum_date: Option<NaiveDate>,
    pub latest_relative_strength_date: Option<NaiveDate>,
}

/// Check if database exists
pub fn database_exists(database_path: &Path) -> bool {
    database_path.exists() && database_path.is_file()
}

fn parse_entity_type(row: &SqliteRow) -> Result<EntityType> {
    let raw: String = row.try_get("entity_type")?;
    EntityType::from_str(&raw).map_err(AppError::Parse)
}

fn row_to_index_point(row: &SqliteRow) -> Result<IndustryIndexPoint> {
    Ok(IndustryIndexPoint {
        industry: row.try_get("industry")?,
        date: row.try_get("date")?,
        index_value: row.try_get("index_value")?,
        stock_count: row.try_get::<i64, _>("stock_count")? as usize,
        base_value: row.try_get("base_value")?,
    })
}

fn row_to_momentum(row: &SqliteRow) -> Result<MomentumRecord> {
    let horizon = |h: Horizon| -> Result<HorizonMomentum> {
        Ok(HorizonMomentum {
            price: row.try_get(format!("price_{}", h.suffix()).as_str())?,
            momentum: row.try_get(format!("momentum_{}", h.suffix()).as_str())?,
            momentum_pct: row.try_get(format!("momentum_{}_pct", h.suffix()).as_str())?,
        })
    };

    Ok(MomentumRecord {
        symbol: row.try_get("symbol")?,
        entity_type: parse_entity_type(row)?,
        entity_name: row.try_get("entity_name")?,
        date: row.try_get("date")?,
        current_price: row.try_get("current_price")?,
        d30: horizon(Horizon::Days30)?,
        d90: horizon(Horizon::Days90)?,
        d180: horizon(Horizon::Days180)?,
        volatility_30d: row.try_get("volatility_30d")?,
        volume_avg_30d: row.try_get("volume_avg_30d")?,
    })
}

fn row_to_strength(row: &SqliteRow) -> Result<RelativeStrengthRecord> {
    let horizon = |h: Horizon| -> Result<HorizonStrength> {
        let s = h.suffix();
        Ok(HorizonStrength {
            price: row.try_get(format!("price_{}", s).as_str())?,
            benchmark_price: row.try_get(format!("benchmark_price_{}", s).as_str())?,
            symbol_return: row.try_get(format!("symbol_return_{}", s).as_str())?,
            benchmark_return: row.try_get(format!("benchmark_return_{}", s).as_str())?,
            relative_strength: row.try_get(format!("rs_{}", s).as_str())?,
            is_fallback: row.try_get(format!("rs_{}_is_fallback", s).as_str())?,
        })
    };
    let stage = |column: &str| -> Result<Option<WeinsteinStage>> {
        let n: Option<i64> = row.try_get(column)?;
        Ok(n.and_then(WeinsteinStage::from_number))
    };

    Ok(RelativeStrengthRecord {
        symbol: row.try_get("symbol")?,
        entity_type: parse_entity_type(row)?,
        entity_name: row.try_get("entity_name")?,
        date: row.try_get("date")?,
        benchmark_symbol: row.try_get("benchmark_symbol")?,
        current_price: row.try_get("current_price")?,
        benchmark_price: row.try_get("benchmark_price")?,
        current_rs: row.try_get("current_rs")?,
        d30: horizon(Horizon::Days30)?,
        d90: horizon(Horizon::Days90)?,
        d180: horizon(Horizon::Days180)?,
        entity_ma_200: row.try_get("entity_ma_200")?,
        entity_ma_trend_up: row.try_get("entity_ma_trend_up")?,
        entity_stage: stage("entity_stage")?,
        benchmark_ma_200: row.try_get("benchmark_ma_200")?,
        benchmark_ma_trend_up: row.try_get("benchmark_ma_trend_up")?,
        benchmark_stage: stage("benchmark_stage")?,
        ma_window: row.try_get::<i64, _>("ma_window")? as usize,
    })
}

#[async_trait]
impl PriceProvider for SqliteStore {
    async fn get_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let rows = sqlx::query(
            r#"
            SELECT date, open, high, low, close, volume
            FROM stock_prices
            WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
            ORDER BY date ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut observations = Vec::with_capacity(rows.len());
        for row in rows {
            observations.push(PriceObservation {
                date: row.try_get("date")?,
                close: row.try_get("close")?,
                volume: row.try_get("volume")?,
                high: row.try_get("high")?,
                low: row.try_get("low")?,
                open: row.try_get("open")?,
            });
        }
        Ok(PriceSeries::new(observations))
    }
}

#[async_trait]
impl MembershipProvider for SqliteStore {
    async fn list_listings(&self) -> Result<Vec<Listing>> {
        let rows =
            sqlx::query("SELECT symbol, name, industry, is_index FROM stocks ORDER BY symbol")
                .fetch_all(&self.pool)
                .await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            listings.push(Listing {
                symbol: row.try_get("symbol")?,
                name: row.try_get("name")?,
                industry: row.try_get("industry")?,
                is_index: row.try_get("is_index")?,
            });
        }
        Ok(listings)
    }

    async fn get_industries(&self, min_constituents: usize) -> Result<Vec<IndustrySummary>> {
        let rows = sqlx::query(
            r#"
            SELECT industry, COUNT(*) AS constituent_count
            FROM stocks
            WHERE industry IS NOT NULL AND is_index = 0
            GROUP BY industry
            HAVING COUNT(*) >= ?1
            ORDER BY industry
            "#,
        )
        .bind(min_constituents as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut industries = Vec::with_capacity(rows.len());
        for row in rows {
            industries.push(IndustrySummary {
                industry: row.try_get("industry")?,
                constituent_count: row.try_get::<i64, _>("constituent_count")? as usize,
            });
        }
        Ok(industries)
    }

    async fn get_constituents(&self, industry: &str) -> Result<Vec<String>> {
        let symbols = sqlx::query_scalar(
            "SELECT symbol FROM stocks WHERE industry = ?1 AND is_index = 0 ORDER BY symbol",
        )
        .bind(industry)
        .fetch_all(&self.pool)
        .await?;
        Ok(symbols)
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn upsert_index_points(&self, points: &[IndustryIndexPoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let mut transaction = self.pool.begin().await?;
        let mut affected_rows = 0;
        for point in points {
            let result = sqlx::query(
                r#"
                INSERT INTO equiweighted_index (industry, date, index_value, stock_count, base_value)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(industry, date) DO UPDATE SET
                    index_value = excluded.index_value,
                    stock_count = excluded.stock_count,
                    base_value = excluded.base_value
                "#,
            )
            .bind(&point.industry)
            .bind(point.date)
            .bind(point.index_value)
            .bind(point.stock_count as i64)
            .bind(point.base_value)
            .execute(&mut *transaction)
            .await?;
            affected_rows += result.rows_affected() as usize;
        }
        transaction.commit().await?;
        Ok(affected_rows)
    }

    async fn get_index_points(
        &self,
        industry: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<IndustryIndexPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT industry, date, index_value, stock_count, base_value
            FROM equiweighted_index
            WHERE industry = ?1 AND date >= ?2 AND date <= ?3
            ORDER BY date ASC
            "#,
        )
        .bind(industry)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_index_point).collect()
    }

    async fn index_industries(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<String>> {
        let industries = sqlx::query_scalar(
            r#"
            SELECT DISTINCT industry FROM equiweighted_index
            WHERE date >= ?1 AND date <= ?2
            ORDER BY industry
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(industries)
    }

    async fn index_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT date FROM equiweighted_index
            WHERE date >= ?1 AND date <= ?2
            ORDER BY date ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut dates = Vec::with_capacity(rows.len());
        for row in rows {
            dates.push(row.try_get("date")?);
        }
        Ok(dates)
    }

    async fn latest_index_values(&self) -> Result<Vec<IndustryIndexPoint>> {
        let rows = sqlx::query(
            r#"
            SELECT e.industry, e.date, e.index_value, e.stock_count, e.base_value
            FROM equiweighted_index e
            JOIN (
                SELECT industry, MAX(date) AS latest FROM equiweighted_index GROUP BY industry
            ) l ON e.industry = l.industry AND e.date = l.latest
            ORDER BY e.industry
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_index_point).collect()
    }
}

#[async_trait]
impl MomentumStore for SqliteStore {
    async fn upsert_momentum(&self, records: &[MomentumRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let statement =
            upsert_statement("momentum_analysis", MOMENTUM_COLUMNS, &["symbol", "date"]);
        let mut transaction = self.pool.begin().await?;
        let mut affected_rows = 0;

        for record in records {
            let mut query = sqlx::query(&statement)
                .bind(&record.symbol)
                .bind(record.entity_type.as_str())
                .bind(&record.entity_name)
                .bind(record.date)
                .bind(record.current_price);
            for horizon in Horizon::ALL {
                let h = record.horizon(horizon);
                query = query.bind(h.price).bind(h.momentum).bind(h.momentum_pct);
            }
            let result = query
                .bind(record.volatility_30d)
                .bind(record.volume_avg_30d)
                .execute(&mut *transaction)
                .await?;
            affected_rows += result.rows_affected() as usize;
        }

        transaction.commit().await?;
        Ok(affected_rows)
    }

    async fn momentum_exists(&self, symbol: &str, date: NaiveDate) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM momentum_analysis WHERE symbol = ?1 AND date = ?2",
        )
        .bind(symbol)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn get_momentum(&self, symbol: &str, date: NaiveDate) -> Result<Option<MomentumRecord>> {
        let row = sqlx::query("SELECT * FROM momentum_analysis WHERE symbol = ?1 AND date = ?2")
            .bind(symbol)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_momentum).transpose()
    }

    async fn top_momentum(
        &self,
        horizon: Horizon,
        limit: usize,
        entity_type: Option<EntityType>,
    ) -> Result<Vec<MomentumRecord>> {
        // Column names come from the Horizon enum, never from input
        let column = format!("momentum_{}_pct", horizon.suffix());
        let sql = format!(
            r#"
            SELECT * FROM momentum_analysis
            WHERE date = (
                SELECT MAX(date) FROM momentum_analysis WHERE (?1 IS NULL OR entity_type = ?1)
            )
              AND (?1 IS NULL OR entity_type = ?1)
              AND {column} IS NOT NULL
            ORDER BY {column} DESC
            LIMIT ?2
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(entity_type.map(|t| t.as_str()))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_momentum).collect()
    }

    async fn momentum_history(&self, symbol: &str, limit: usize) -> Result<Vec<MomentumRecord>> {
        let rows = sqlx::query(
            "SELECT * FROM momentum_analysis WHERE symbol = ?1 ORDER BY date DESC LIMIT ?2",
        )
        .bind(symbol)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_momentum).collect()
    }

    async fn momentum_statistics(&self) -> Result<Vec<MomentumStatistics>> {
        let rows = sqlx::query(
            r#"
            SELECT m.entity_type, m.date,
                   COUNT(*) AS count,
                   AVG(m.momentum_30d_pct) AS avg_pct,
                   MAX(m.momentum_30d_pct) AS max_pct,
                   MIN(m.momentum_30d_pct) AS min_pct,
                   AVG(m.volatility_30d) AS avg_vol
            FROM momentum_analysis m
            JOIN (
                SELECT entity_type, MAX(date) AS latest FROM momentum_analysis GROUP BY entity_type
            ) l ON m.entity_type = l.entity_type AND m.date = l.latest
            GROUP BY m.entity_type, m.date
            ORDER BY m.entity_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            stats.push(MomentumStatistics {
                entity_type: parse_entity_type(&row)?,
                date: row.try_get("date")?,
                count: row.try_get::<i64, _>("count")? as usize,
                avg_momentum_30d_pct: row.try_get("avg_pct")?,
                max_momentum_30d_pct: row.try_get("max_pct")?,
                min_momentum_30d_pct: row.try_get("min_pct")?,
                avg_volatility_30d: row.try_get("avg_vol")?,
            });
        }
        Ok(stats)
    }

    async fn delete_momentum_before(&self, date: NaiveDate) -> Result<u64> {
        let result = sqlx::query("DELETE FROM momentum_analysis WHERE date < ?1")
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RelativeStrengthStore for SqliteStore {
    async fn upsert_relative_strength(&self, records: &[RelativeStrengthRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let statement = upsert_statement(
            "relative_strength_analysis",
            STRENGTH_COLUMNS,
            &["symbol", "date", "benchmark_symbol"],
        );
        let mut transaction = self.pool.begin().await?;
        let mut affected_rows = 0;

        for record in records {
            let mut query = sqlx::query(&statement)
                .bind(&record.symbol)
                .bind(record.entity_type.as_str())
                .bind(&record.entity_name)
                .bind(record.date)
                .bind(&record.benchmark_symbol)
                .bind(record.current_price)
                .bind(record.benchmark_price)
                .bind(record.current_rs);
            for horizon in Horizon::ALL {
                let h = record.horizon(horizon);
                query = query
                    .bind(h.price)
                    .bind(h.benchmark_price)
                    .bind(h.symbol_return)
                    .bind(h.benchmark_return)
                    .bind(h.relative_strength)
                    .bind(h.is_fallback);
            }
            let result = query
                .bind(record.entity_ma_200)
                .bind(record.entity_ma_trend_up)
                .bind(record.entity_stage.map(|s| s.number() as i64))
                .bind(record.benchmark_ma_200)
                .bind(record.benchmark_ma_trend_up)
                .bind(record.benchmark_stage.map(|s| s.number() as i64))
                .bind(record.ma_window as i64)
                .execute(&mut *transaction)
                .await?;
            affected_rows += result.rows_affected() as usize;
        }

        transaction.commit().await?;
        Ok(affected_rows)
    }

    async fn relative_strength_exists(
        &self,
        symbol: &str,
        date: NaiveDate,
        benchmark_symbol: &str,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM relative_strength_analysis
            WHERE symbol = ?1 AND date = ?2 AND benchmark_symbol = ?3
            "#,
        )
        .bind(symbol)
        .bind(date)
        .bind(benchmark_symbol)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn get_relative_strength(
        &self,
        symbol: &str,
        date: NaiveDate,
        benchmark_symbol: &str,
    ) -> Result<Option<RelativeStrengthRecord>> {
        let row = sqlx::query(
            r#"
            SELECT * FROM relative_strength_analysis
            WHERE symbol = ?1 AND date = ?2 AND benchmark_symbol = ?3
            "#,
        )
        .bind(symbol)
        .bind(date)
        .bind(benchmark_symbol)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_strength).transpose()
    }

    async fn top_relative_strength(
        &self,
        query: &StrengthRankingQuery,
    ) -> Result<Vec<RelativeStrengthRecord>> {
        let column = format!("rs_{}", query.horizon.suffix());
        let sql = format!(
            r#"
            SELECT * FROM relative_strength_analysis
            WHERE benchmark_symbol = ?1
              AND date = (
                SELECT MAX(date) FROM relative_strength_analysis
                WHERE benchmark_symbol = ?1 AND (?2 IS NULL OR entity_type = ?2)
              )
              AND (?2 IS NULL OR entity_type = ?2)
              AND {column} IS NOT NULL
              AND (?3 OR {column}_is_fallback = 0)
            ORDER BY {column} DESC
            LIMIT ?4
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(&query.benchmark_symbol)
            .bind(query.entity_type.map(|t| t.as_str()))
            .bind(query.include_fallback)
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_strength).collect()
    }

    async fn relative_strength_history(
        &self,
        symbol: &str,
        benchmark_symbol: &str,
        limit: usize,
    ) -> Result<Vec<RelativeStrengthRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM relative_strength_analysis
            WHERE symbol = ?1 AND benchmark_symbol = ?2
            ORDER BY date DESC
            LIMIT ?3
            "#,
        )
        .bind(symbol)
        .bind(benchmark_symbol)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_strength).collect()
    }

    async fn delete_relative_strength_before(&self, date: NaiveDate) -> Result<u64> {
        let result = sqlx::query("DELETE FROM relative_strength_analysis WHERE date < ?1")
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::closes;
    use tempfile::tempdir;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn momentum(symbol: &str, date: NaiveDate, pct: Option<f64>) -> MomentumRecord {
        MomentumRecord {
            symbol: symbol.to_string(),
            entity_type: EntityType::IndustryIndex,
            entity_name: format!("{} Industry Index", symbol),
            date,
            current_price: 1100.0,
            d30: HorizonMomentum {
                price: Some(1000.0),
                momentum: Some(100.0),
                momentum_pct: pct,
            },
            d90: HorizonMomentum::default(),
            d180: HorizonMomentum::default(),
            volatility_30d: Some(12.5),
            volume_avg_30d: None,
        }
    }

    fn strength(
        symbol: &str,
        date: NaiveDate,
        rs_30d: f64,
        fallback: bool,
    ) -> RelativeStrengthRecord {
        RelativeStrengthRecord {
            symbol: symbol.to_string(),
            entity_type: EntityType::Stock,
            entity_name: symbol.to_string(),
            date,
            benchmark_symbol: "^CRSLDX".to_string(),
            current_price: 250.0,
            benchmark_price: 18000.0,
            current_rs: Some(rs_30d),
            d30: HorizonStrength {
                price: Some(240.0),
                benchmark_price: Some(17500.0),
                symbol_return: Some(4.1667),
                benchmark_return: Some(2.8571),
                relative_strength: Some(rs_30d),
                is_fallback: fallback,
            },
            d90: HorizonStrength::default(),
            d180: HorizonStrength::default(),
            entity_ma_200: Some(230.0),
            entity_ma_trend_up: Some(true),
            entity_stage: Some(WeinsteinStage::Advancing),
            benchmark_ma_200: Some(18500.0),
            benchmark_ma_trend_up: None,
            benchmark_stage: Some(WeinsteinStage::Declining),
            ma_window: 200,
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::new(dir.path().join("test.db")).await.unwrap()
    }

    #[tokio::test]
    async fn test_database_creation() {
        let temp_dir = tempdir().unwrap();
        let store = open_store(&temp_dir).await;
        assert!(database_exists(store.database_path()));

        let stats = store.get_database_stats().await.unwrap();
        assert_eq!(stats.momentum_records, 0);
        assert_eq!(stats.latest_index_date, None);
        store.close().await;
    }

    #[tokio::test]
    async fn test_prices_and_membership() {
        let temp_dir = tempdir().unwrap();
        let store = open_store(&temp_dir).await;

        let listings: Vec<Listing> = ["TCS", "INFY", "WIPRO"]
            .iter()
            .map(|s| Listing {
                symbol: s.to_string(),
                name: s.to_string(),
                industry: Some("IT".to_string()),
                is_index: false,
            })
            .chain(std::iter::once(Listing {
                symbol: "^CRSLDX".to_string(),
                name: "Nifty 500".to_string(),
                industry: None,
                is_index: true,
            }))
            .collect();
        store.upsert_listings(&listings).await.unwrap();

        store
            .upsert_prices(
                "TCS",
                &[
                    PriceObservation::close_only(d(2), 3500.0).with_volume(1000),
                    PriceObservation::close_only(d(3), 3550.0),
                ],
            )
            .await
            .unwrap();
        // Same key overwrites
        store
            .upsert_prices("TCS", &[PriceObservation::close_only(d(3), 3600.0)])
            .await
            .unwrap();

        let series = store.get_prices("TCS", d(1), d(31)).await.unwrap();
        assert_eq!(closes(series.observations()), vec![3500.0, 3600.0]);
        assert_eq!(series.first().unwrap().volume, Some(1000));

        let industries = store.get_industries(3).await.unwrap();
        assert_eq!(industries.len(), 1);
        assert_eq!(industries[0].constituent_count, 3);
        assert_eq!(
            store.get_constituents("IT").await.unwrap(),
            vec!["INFY", "TCS", "WIPRO"]
        );
        assert_eq!(store.list_listings().await.unwrap().len(), 4);
        store.close().await;
    }

    #[tokio::test]
    async fn test_index_points_upsert_and_latest() {
        let temp_dir = tempdir().unwrap();
        let store = open_store(&temp_dir).await;

        let point = |industry: &str, date: NaiveDate, value: f64| IndustryIndexPoint {
            industry: industry.to_string(),
            date,
            index_value: value,
            stock_count: 3,
            base_value: 1000.0,
        };
        store
            .upsert_index_points(&[
                point("IT", d(1), 1000.0),
                point("IT", d(2), 1010.0),
                point("Banks", d(1), 1000.0),
            ])
            .await
            .unwrap();
        store
            .upsert_index_points(&[point("IT", d(2), 1020.0)])
            .await
            .unwrap();

        let it = store.get_index_points("IT", d(1), d(31)).await.unwrap();
        assert_eq!(it.len(), 2);
        assert_eq!(it[1].index_value, 1020.0);

        let latest = store.latest_index_values().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[1].industry, "IT");
        assert_eq!(latest[1].date, d(2));

        assert_eq!(store.index_dates(d(1), d(31)).await.unwrap(), vec![d(1), d(2)]);
        assert_eq!(
            store.index_industries(d(2), d(2)).await.unwrap(),
            vec!["IT".to_string()]
        );
        store.close().await;
    }

    #[tokio::test]
    async fn test_momentum_round_trip_and_ranking() {
        let temp_dir = tempdir().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert_momentum(&[
                momentum("IT", d(1), Some(90.0)),
                momentum("IT", d(2), Some(10.0)),
                momentum("Banks", d(2), Some(20.0)),
                momentum("Pharma", d(2), None),
            ])
            .await
            .unwrap();

        assert!(store.momentum_exists("IT", d(2)).await.unwrap());
        assert!(!store.momentum_exists("IT", d(3)).await.unwrap());
        let loaded = store.get_momentum("IT", d(2)).await.unwrap().unwrap();
        assert_eq!(loaded, momentum("IT", d(2), Some(10.0)));

        let top = store
            .top_momentum(Horizon::Days30, 5, Some(EntityType::IndustryIndex))
            .await
            .unwrap();
        let symbols: Vec<&str> = top.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["Banks", "IT"]);

        let none = store
            .top_momentum(Horizon::Days30, 5, Some(EntityType::Stock))
            .await
            .unwrap();
        assert!(none.is_empty());

        let stats = store.momentum_statistics().await.unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].count, 3);
        assert_eq!(stats[0].avg_momentum_30d_pct, Some(15.0));

        assert_eq!(store.delete_momentum_before(d(2)).await.unwrap(), 1);
        assert_eq!(store.momentum_history("IT", 10).await.unwrap().len(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_relative_strength_round_trip_and_fallback_ranking() {
        let temp_dir = tempdir().unwrap();
        let store = open_store(&temp_dir).await;

        let real = strength("TCS", d(2), 110.0, false);
        let fallback = strength("INFY", d(2), 150.0, true);
        store
            .upsert_relative_strength(&[real.clone(), fallback.clone()])
            .await
            .unwrap();

        let loaded = store
            .get_relative_strength("TCS", d(2), "^CRSLDX")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, real);
        assert!(store
            .relative_strength_exists("INFY", d(2), "^CRSLDX")
            .await
            .unwrap());
        assert!(!store
            .relative_strength_exists("INFY", d(2), "^OTHER")
            .await
            .unwrap());

        let mut query = StrengthRankingQuery::new(Horizon::Days30, 10, "^CRSLDX");
        let ranked = store.top_relative_strength(&query).await.unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].symbol, "TCS");

        query.include_fallback = true;
        let ranked = store.top_relative_strength(&query).await.unwrap();
        let symbols: Vec<&str> = ranked.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["INFY", "TCS"]);

        assert_eq!(
            store.delete_relative_strength_before(d(3)).await.unwrap(),
            2
        );
        store.close().await;
    }

    #[test]
    fn test_upsert_statement_skips_key_columns() {
        let sql = upsert_statement("t", &["a", "b", "c"], &["a"]);
        assert_eq!(
            sql,
            "INSERT INTO t (a, b, c) VALUES (?1, ?2, ?3) ON CONFLICT(a) DO UPDATE SET b = excluded.b, c = excluded.c"
        );
    }
}
