use super::{fail, open_store, parse_date_or_today, runtime, stores_for};
use crate::services::IndexBuilder;

pub fn run(date: Option<String>, days: i64, base_value: f64) {
    let end = match parse_date_or_today(date.as_deref()) {
        Ok(d) => d,
        Err(e) => fail("Invalid arguments", e),
    };

    println!(
        "🏗️  Building equal-weighted industry indices ({} days ending {}, base {})",
        days, end, base_value
    );

    let result = runtime().block_on(async {
        let store = open_store().await?;
        let summary = IndexBuilder::new(stores_for(&store))
            .build_all_industry_indices(end, days, base_value)
            .await;
        store.close().await;
        summary
    });

    match result {
        Ok(summary) => {
            println!("\n✅ Built {} industries", summary.industries_built);
            println!("   📊 Points written: {}", summary.points_written);
            if !summary.skipped.is_empty() {
                println!("   ⏭️  No data: {}", summary.skipped.join(", "));
            }
            for (industry, error) in &summary.errors {
                println!("   ❌ {}: {}", industry, error);
            }
        }
        Err(e) => fail("Index build failed", e),
    }
}
