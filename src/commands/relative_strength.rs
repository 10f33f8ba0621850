use super::{
    fail, fmt_opt, open_store, parse_date_or_today, print_batch_stats, resolve_entity, runtime,
    stores_for,
};
use crate::models::{EntityType, Horizon, RelativeStrengthConfig};
use crate::services::RelativeStrengthCalculator;

pub fn run(
    date: Option<String>,
    symbol: Option<String>,
    entity_type: Option<EntityType>,
    config: RelativeStrengthConfig,
    json: bool,
) {
    let as_of = match parse_date_or_today(date.as_deref()) {
        Ok(d) => d,
        Err(e) => fail("Invalid arguments", e),
    };

    let rt = runtime();

    if let Some(symbol) = symbol {
        let result = rt.block_on(async {
            let store = open_store().await?;
            let stores = stores_for(&store);
            let entity = resolve_entity(&stores, &symbol, entity_type).await?;
            let record = RelativeStrengthCalculator::new(stores, config)
                .update_relative_strength_for(&entity, as_of)
                .await;
            store.close().await;
            record
        });

        match result {
            Ok(record) if json => match serde_json::to_string_pretty(&record) {
                Ok(s) => println!("{}", s),
                Err(e) => fail("Serialization failed", e),
            },
            Ok(record) => {
                println!(
                    "📐 {} vs {} on {} (MA window {})",
                    record.entity_name, record.benchmark_symbol, record.date, record.ma_window
                );
                println!("   Current RS: {}", fmt_opt(record.current_rs));
                for horizon in Horizon::ALL {
                    let h = record.horizon(horizon);
                    println!(
                        "   {:>4}: RS {:>8}{}  return {}% vs {}%",
                        horizon.suffix(),
                        fmt_opt(h.relative_strength),
                        if h.is_fallback { " (fallback)" } else { "" },
                        fmt_opt(h.symbol_return),
                        fmt_opt(h.benchmark_return)
                    );
                }
                if let Some(stage) = record.entity_stage {
                    println!("   Stage: {} ({:?})", stage.number(), stage);
                }
            }
            Err(e) => fail("Relative strength calculation failed", e),
        }
        return;
    }

    println!(
        "📐 Calculating relative strength vs {} on {} ({} mode)",
        config.benchmark_symbol,
        as_of,
        if config.strict_mode { "strict" } else { "relaxed" }
    );
    let result = rt.block_on(async {
        let store = open_store().await?;
        let stats = RelativeStrengthCalculator::new(stores_for(&store), config)
            .calculate_all_relative_strength(as_of)
            .await;
        store.close().await;
        stats
    });

    match result {
        Ok(stats) => print_batch_stats("Relative strength", &stats),
        Err(e) => fail("Relative strength calculation failed", e),
    }
}
