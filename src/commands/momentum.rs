use super::{
    fail, fmt_opt, open_store, parse_date_or_today, print_batch_stats, resolve_entity, runtime,
    stores_for,
};
use crate::models::{EntityType, Horizon};
use crate::services::MomentumCalculator;

pub fn run(
    date: Option<String>,
    symbol: Option<String>,
    entity_type: Option<EntityType>,
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
            let record = MomentumCalculator::new(stores)
                .update_momentum_for(&entity, as_of)
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
                println!("🚀 {} ({}) on {}", record.entity_name, record.entity_type, record.date);
                println!("   Price: {:.2}", record.current_price);
                for horizon in Horizon::ALL {
                    let h = record.horizon(horizon);
                    println!(
                        "   {:>4}: {:>10}  ({}%)",
                        horizon.suffix(),
                        fmt_opt(h.momentum),
                        fmt_opt(h.momentum_pct)
                    );
                }
                println!("   Volatility 30d: {}", fmt_opt(record.volatility_30d));
            }
            Err(e) => fail("Momentum calculation failed", e),
        }
        return;
    }

    println!("🚀 Calculating momentum for all entities on {}", as_of);
    let result = rt.block_on(async {
        let store = open_store().await?;
        let stats = MomentumCalculator::new(stores_for(&store))
            .calculate_all_momentum(as_of)
            .await;
        store.close().await;
        stats
    });

    match result {
        Ok(stats) => print_batch_stats("Momentum", &stats),
        Err(e) => fail("Momentum calculation failed", e),
    }
}
