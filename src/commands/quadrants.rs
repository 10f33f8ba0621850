use super::{fail, open_store, parse_date_or_today, runtime, stores_for};
use crate::models::Quadrant;
use crate::services::{IndexStore, QuadrantAnalyzer};

pub fn run(
    date: Option<String>,
    symbol: Option<String>,
    limit: usize,
    benchmark_symbol: String,
    json: bool,
) {
    let rt = runtime();

    if let Some(symbol) = symbol {
        let result = rt.block_on(async {
            let store = open_store().await?;
            let journey = QuadrantAnalyzer::new(stores_for(&store), benchmark_symbol)
                .journey(&symbol, limit)
                .await;
            store.close().await;
            journey
        });

        match result {
            Ok(Some(journey)) if json => match serde_json::to_string_pretty(&journey) {
                Ok(s) => println!("{}", s),
                Err(e) => fail("Serialization failed", e),
            },
            Ok(Some(journey)) => {
                println!("🧭 Quadrant journey for {}", journey.symbol);
                println!(
                    "   {} → {}",
                    journey.start_quadrant.as_str(),
                    journey.end_quadrant.as_str()
                );
                for (quadrant, pct) in &journey.time_pct {
                    println!("   {:<10} {:>6.2}%", quadrant.as_str(), pct);
                }
                for t in &journey.transitions {
                    println!("   {} {} → {}", t.date, t.from.as_str(), t.to.as_str());
                }
                println!(
                    "   Price {:+.2}%, momentum {:+.2}, RS {:+.2}",
                    journey.price_change_pct, journey.momentum_change, journey.rs_change
                );
            }
            Ok(None) => println!(
                "⚠️  No dates with both momentum and relative strength for {}",
                symbol
            ),
            Err(e) => fail("Quadrant journey failed", e),
        }
        return;
    }

    let result = rt.block_on(async {
        let store = open_store().await?;
        let stores = stores_for(&store);

        // Default to the latest index date
        let date = match date {
            Some(d) => parse_date_or_today(Some(&d))?,
            None => {
                let latest = store.latest_index_values().await?;
                match latest.iter().map(|p| p.date).max() {
                    Some(d) => d,
                    None => parse_date_or_today(None)?,
                }
            }
        };

        let grouped = QuadrantAnalyzer::new(stores, benchmark_symbol)
            .industry_quadrants(date)
            .await;
        store.close().await;
        grouped.map(|g| (date, g))
    });

    let (date, grouped) = match result {
        Ok(r) => r,
        Err(e) => fail("Quadrant analysis failed", e),
    };

    if json {
        match serde_json::to_string_pretty(&grouped) {
            Ok(s) => println!("{}", s),
            Err(e) => fail("Serialization failed", e),
        }
        return;
    }

    println!("🧭 Industry quadrants on {}\n", date);
    for quadrant in Quadrant::ALL {
        let points = grouped.get(quadrant.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        println!("{} ({})", quadrant.as_str().to_uppercase(), points.len());
        for p in points {
            println!(
                "   {:<32} momentum {:>8.2}%  RS {:>8.2}",
                p.symbol, p.momentum_pct, p.relative_strength
            );
        }
    }
}
