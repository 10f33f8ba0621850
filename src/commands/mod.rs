pub mod backfill;
pub mod build_indices;
pub mod import;
pub mod momentum;
pub mod prune;
pub mod quadrants;
pub mod relative_strength;
pub mod status;
pub mod top;

use chrono::{Local, NaiveDate};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::EntityType;
use crate::services::{EntityRef, MembershipProvider, SqliteStore, Stores};
use crate::utils::get_database_path;

/// Build a Tokio runtime or exit with an error message
pub(crate) fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ Failed to create async runtime: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the error and exit non-zero
pub(crate) fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("\n❌ {}: {}", context, e);
    std::process::exit(1);
}

/// Parse `YYYY-MM-DD`, defaulting to today
pub(crate) fn parse_date_or_today(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| AppError::InvalidInput(format!("Invalid date '{}': {}", s, e))),
        None => Ok(Local::now().date_naive()),
    }
}

pub(crate) async fn open_store() -> Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::new(get_database_path()).await?))
}

pub(crate) fn stores_for(store: &Arc<SqliteStore>) -> Stores {
    Stores::from_backend(store.clone())
}

/// Resolve a symbol (or industry name) to an entity reference
pub(crate) async fn resolve_entity(
    stores: &Stores,
    symbol: &str,
    entity_type: Option<EntityType>,
) -> Result<EntityRef> {
    if entity_type == Some(EntityType::IndustryIndex) {
        return Ok(EntityRef::industry(symbol));
    }

    let listings = stores.membership.list_listings().await?;
    match listings.iter().find(|l| l.symbol.eq_ignore_ascii_case(symbol)) {
        Some(listing) => Ok(EntityRef::from_listing(listing)),
        None => Err(AppError::NotFound(format!(
            "Unknown symbol '{}' (use --entity-type industry for industry indices)",
            symbol
        ))),
    }
}

/// Two-decimal display for optional values
pub(crate) fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

pub(crate) fn print_batch_stats(label: &str, stats: &crate::models::BatchStats) {
    println!("\n✅ {} complete", label);
    println!("   ✅ Successful: {}", stats.successful);
    if stats.already_satisfied > 0 {
        println!("   ⏭️  Already present: {}", stats.already_satisfied);
    }
    println!("   ❌ Failed:     {}", stats.failed);
    println!("   📊 Total:      {}", stats.total);
    println!("   📈 Success rate: {:.1}%", stats.success_rate());
    if !stats.missing_benchmark_dates.is_empty() {
        println!(
            "   ⚠️  Dates without benchmark data: {}",
            stats.missing_benchmark_dates.len()
        );
    }
    if !stats.persistence_failed_dates.is_empty() {
        println!(
            "   ⚠️  Dates that failed to persist: {}",
            stats.persistence_failed_dates.len()
        );
    }
}
