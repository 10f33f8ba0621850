use super::{fail, fmt_opt, open_store, runtime, stores_for};
use crate::error::Result;
use crate::models::{EntityType, Horizon, MomentumRecord, RelativeStrengthRecord};
use crate::services::{Stores, StrengthRankingQuery};

use super::backfill::AnalyticKind;

/// Ranking (or one symbol's history) to show
pub struct TopOptions {
    pub kind: AnalyticKind,
    pub horizon: Horizon,
    pub limit: usize,
    pub entity_type: Option<EntityType>,
    pub benchmark_symbol: String,
    pub include_fallback: bool,
    pub symbol: Option<String>,
    pub stats: bool,
    pub json: bool,
}

enum Rows {
    Momentum(Vec<MomentumRecord>),
    Strength(Vec<RelativeStrengthRecord>),
}

async fn load(stores: &Stores, options: &TopOptions) -> Result<Rows> {
    let listing = match (options.kind, &options.symbol) {
        (AnalyticKind::Momentum, Some(symbol)) => Rows::Momentum(
            stores.momentum.momentum_history(symbol, options.limit).await?,
        ),
        (AnalyticKind::Momentum, None) => Rows::Momentum(
            stores
                .momentum
                .top_momentum(options.horizon, options.limit, options.entity_type)
                .await?,
        ),
        (AnalyticKind::RelativeStrength, Some(symbol)) => Rows::Strength(
            stores
                .relative_strength
                .relative_strength_history(symbol, &options.benchmark_symbol, options.limit)
                .await?,
        ),
        (AnalyticKind::RelativeStrength, None) => {
            let query = StrengthRankingQuery {
                entity_type: options.entity_type,
                include_fallback: options.include_fallback,
                ..StrengthRankingQuery::new(
                    options.horizon,
                    options.limit,
                    options.benchmark_symbol.clone(),
                )
            };
            Rows::Strength(stores.relative_strength.top_relative_strength(&query).await?)
        }
    };
    Ok(listing)
}

pub fn run(options: TopOptions) {
    let result = runtime().block_on(async {
        let store = open_store().await?;
        let stores = stores_for(&store);
        let listing = load(&stores, &options).await?;
        let statistics = if options.stats {
            stores.momentum.momentum_statistics().await?
        } else {
            Vec::new()
        };
        store.close().await;
        Ok::<_, crate::error::AppError>((listing, statistics))
    });

    let (listing, statistics) = match result {
        Ok(r) => r,
        Err(e) => fail("Query failed", e),
    };

    if options.json {
        let rendered = match &listing {
            Rows::Momentum(records) => serde_json::to_string_pretty(records),
            Rows::Strength(records) => serde_json::to_string_pretty(records),
        };
        match rendered {
            Ok(s) => println!("{}", s),
            Err(e) => fail("Serialization failed", e),
        }
        return;
    }

    let h = options.horizon;
    match listing {
        Rows::Momentum(records) => {
            println!("🚀 Momentum ({})\n", h.suffix());
            println!(
                "{:<24} {:<15} {:<10} {:>12} {:>10}",
                "Symbol", "Type", "Date", "Price", "Pct"
            );
            for r in &records {
                println!(
                    "{:<24} {:<15} {:<10} {:>12.2} {:>10}",
                    r.symbol,
                    r.entity_type.as_str(),
                    r.date,
                    r.current_price,
                    fmt_opt(r.horizon(h).momentum_pct)
                );
            }
            if records.is_empty() {
                println!("⚠️  No momentum records found");
            }
        }
        Rows::Strength(records) => {
            println!("📐 Relative strength vs {} ({})\n", options.benchmark_symbol, h.suffix());
            println!("{:<24} {:<15} {:<10} {:>10} {:>6}", "Symbol", "Type", "Date", "RS", "Stage");
            for r in &records {
                let hs = r.horizon(h);
                println!(
                    "{:<24} {:<15} {:<10} {:>10}{} {:>6}",
                    r.symbol,
                    r.entity_type.as_str(),
                    r.date,
                    fmt_opt(hs.relative_strength),
                    if hs.is_fallback { "*" } else { " " },
                    r.entity_stage.map_or("-".to_string(), |s| s.number().to_string())
                );
            }
            if records.iter().any(|r| r.horizon(h).is_fallback) {
                println!("\n   * current RS substituted for a missing historical value");
            }
            if records.is_empty() {
                println!("⚠️  No relative strength records found");
            }
        }
    }

    for s in &statistics {
        println!(
            "\n📊 {} on {}: {} records, 30d pct avg {} / max {} / min {}, volatility avg {}",
            s.entity_type,
            s.date,
            s.count,
            fmt_opt(s.avg_momentum_30d_pct),
            fmt_opt(s.max_momentum_30d_pct),
            fmt_opt(s.min_momentum_30d_pct),
            fmt_opt(s.avg_volatility_30d)
        );
    }
}
