use chrono::NaiveDate;
use csv::Reader;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::{MAX_PRICE, MAX_VOLUME};
use crate::error::{AppError, Result};
use crate::models::{IndustryGroups, Listing, PriceObservation};
use crate::services::database::SqliteStore;
use crate::utils::is_market_index;

/// One row of a daily price file (`ticker,time,open,high,low,close,volume`)
#[derive(Debug, Deserialize)]
struct PriceRow {
    ticker: String,
    time: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

/// Parsed contents of one price file
#[derive(Debug, Default)]
pub struct ParsedPrices {
    pub by_symbol: BTreeMap<String, Vec<PriceObservation>>,
    /// Rows with an unparseable date or an unusable close
    pub skipped_rows: usize,
}

/// Accepts `2024-01-31` and timestamps that start with a date
fn parse_date(time: &str) -> Option<NaiveDate> {
    let time = time.trim();
    let date_part = time.get(..10).unwrap_or(time);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn row_to_observation(row: &PriceRow) -> Option<PriceObservation> {
    let date = parse_date(&row.time)?;
    let close = row
        .close
        .filter(|c| c.is_finite() && *c > 0.0 && *c <= MAX_PRICE)?;
    let usable = |v: Option<f64>| v.filter(|p| p.is_finite() && *p > 0.0 && *p <= MAX_PRICE);

    Some(PriceObservation {
        date,
        close,
        volume: row
            .volume
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| (v.round() as i64).min(MAX_VOLUME)),
        high: usable(row.high),
        low: usable(row.low),
        open: usable(row.open),
    })
}

/// Read a daily price CSV. The ticker column decides the symbol of each row.
pub fn read_price_csv(path: &Path) -> Result<ParsedPrices> {
    let mut reader = Reader::from_path(path)?;
    let mut parsed = ParsedPrices::default();

    for result in reader.deserialize::<PriceRow>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Import: malformed row");
                parsed.skipped_rows += 1;
                continue;
            }
        };

        let symbol = row.ticker.trim().to_uppercase();
        match row_to_observation(&row) {
            Some(obs) if !symbol.is_empty() => {
                parsed.by_symbol.entry(symbol).or_default().push(obs);
            }
            _ => parsed.skipped_rows += 1,
        }
    }

    Ok(parsed)
}

/// Price files under `dir`: `<dir>/<TICKER>/daily.csv` or `<dir>/<name>.csv`
pub fn find_price_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AppError::NotFound(format!(
            "Market data directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            let daily = path.join("daily.csv");
            if daily.is_file() {
                files.push(daily);
            }
        } else if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Outcome of an import run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportStats {
    pub files: usize,
    pub symbols: usize,
    pub rows_imported: usize,
    pub rows_skipped: usize,
    pub listings: usize,
    pub errors: Vec<(String, String)>,
}

/// Loads price files and industry membership into the SQLite store
pub struct Importer<'a> {
    store: &'a SqliteStore,
}

impl<'a> Importer<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Import every price file under `data_dir`, then register listings.
    ///
    /// Symbols present in `groups` get their industry; imported symbols
    /// missing from it are listed without one.
    pub async fn import_all(
        &self,
        data_dir: &Path,
        groups: Option<&IndustryGroups>,
    ) -> Result<ImportStats> {
        let files = find_price_files(data_dir)?;
        info!(dir = %data_dir.display(), files = files.len(), "Import: starting");

        let mut stats = ImportStats::default();
        let mut imported_symbols = BTreeSet::new();

        for file in &files {
            stats.files += 1;
            let parsed = match read_price_csv(file) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(file = %file.display(), error = %e, "Import: unreadable file");
                    stats.errors.push((file.display().to_string(), e.to_string()));
                    continue;
                }
            };
            stats.rows_skipped += parsed.skipped_rows;

            for (symbol, observations) in parsed.by_symbol {
                match self.store.upsert_prices(&symbol, &observations).await {
                    Ok(_) => {
                        stats.rows_imported += observations.len();
                        imported_symbols.insert(symbol);
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "Import: price upsert failed");
                        stats.errors.push((symbol, e.to_string()));
                    }
                }
            }
        }
        stats.symbols = imported_symbols.len();

        let mut listings: BTreeMap<String, Listing> = groups
            .map(|g| g.listings())
            .unwrap_or_default()
            .into_iter()
            .map(|l| (l.symbol.clone(), l))
            .collect();
        for symbol in imported_symbols {
            listings.entry(symbol.clone()).or_insert_with(|| Listing {
                name: symbol.clone(),
                is_index: is_market_index(&symbol),
                industry: None,
                symbol,
            });
        }

        let listings: Vec<Listing> = listings.into_values().collect();
        self.store.upsert_listings(&listings).await?;
        stats.listings = listings.len();

        info!(
            files = stats.files,
            symbols = stats.symbols,
            rows = stats.rows_imported,
            skipped = stats.rows_skipped,
            listings = stats.listings,
            errors = stats.errors.len(),
            "Import: completed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::closes;
    use crate::services::store::{MembershipProvider, PriceProvider};
    use tempfile::tempdir;

    const CSV: &str = "ticker,time,open,high,low,close,volume\n\
        TCS,2024-01-01,3500,3550,3490,3540,120000\n\
        TCS,2024-01-02 00:00:00,3540,3600,3530,3590,150000\n\
        TCS,not-a-date,1,1,1,1,1\n\
        TCS,2024-01-03,3590,3600,3580,0,1000\n";

    #[test]
    fn test_read_price_csv_skips_bad_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("TCS.csv");
        fs::write(&path, CSV).unwrap();

        let parsed = read_price_csv(&path).unwrap();
        let tcs = &parsed.by_symbol["TCS"];
        assert_eq!(tcs.len(), 2);
        assert_eq!(tcs[1].close, 3590.0);
        assert_eq!(tcs[1].volume, Some(150000));
        assert_eq!(parsed.skipped_rows, 2);
    }

    #[test]
    fn test_find_price_files_layouts() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("INFY")).unwrap();
        fs::write(dir.path().join("INFY").join("daily.csv"), CSV).unwrap();
        fs::write(dir.path().join("TCS.csv"), CSV).unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = find_price_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(find_price_files(&dir.path().join("missing")).is_err());
    }

    #[tokio::test]
    async fn test_import_all_registers_prices_and_listings() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("market_data");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join("TCS.csv"), CSV).unwrap();
        fs::write(
            data_dir.join("BENCH.csv"),
            "ticker,time,open,high,low,close,volume\n^CRSLDX,2024-01-01,,,,18000,\n",
        )
        .unwrap();

        let store = SqliteStore::new(dir.path().join("test.db")).await.unwrap();
        let mut groups = IndustryGroups::default();
        groups.groups.insert(
            "IT".to_string(),
            vec!["TCS".to_string(), "INFY".to_string(), "WIPRO".to_string()],
        );

        let stats = Importer::new(&store)
            .import_all(&data_dir, Some(&groups))
            .await
            .unwrap();
        assert_eq!(stats.rows_imported, 3);
        assert_eq!(stats.symbols, 2);
        assert_eq!(stats.listings, 4);

        let listings = store.list_listings().await.unwrap();
        let bench = listings.iter().find(|l| l.symbol == "^CRSLDX").unwrap();
        assert!(bench.is_index);

        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let series = store.get_prices("^CRSLDX", start, end).await.unwrap();
        assert_eq!(closes(series.observations()), vec![18000.0]);
        assert_eq!(series.first().unwrap().volume, None);
        store.close().await;
    }
}
