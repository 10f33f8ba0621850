use super::{fail, open_store, runtime};
use crate::services::{database_exists, IndexStore};
use crate::utils::get_database_path;

pub fn run() {
    println!("📊 Analytics Database Status\n");

    let path = get_database_path();
    if !database_exists(&path) {
        println!("⚠️  No database at {}. Run 'import' first.", path.display());
        return;
    }

    let result = runtime().block_on(async {
        let store = open_store().await?;
        let stats = store.get_database_stats().await?;
        let latest = store.latest_index_values().await?;
        store.close().await;
        Ok::<_, crate::error::AppError>((stats, latest))
    });

    let (stats, latest) = match result {
        Ok(r) => r,
        Err(e) => fail("Status failed", e),
    };

    let date = |d: Option<chrono::NaiveDate>| d.map_or("-".to_string(), |d| d.to_string());

    println!("🗄️  Database: {}", path.display());
    println!("   Listings:            {:>10}", format_number(stats.listings));
    println!(
        "   Price rows:          {:>10}  (latest {})",
        format_number(stats.price_rows),
        date(stats.latest_price_date)
    );
    println!(
        "   Index points:        {:>10}  (latest {})",
        format_number(stats.index_points),
        date(stats.latest_index_date)
    );
    println!(
        "   Momentum records:    {:>10}  (latest {})",
        format_number(stats.momentum_records),
        date(stats.latest_momentum_date)
    );
    println!(
        "   Relative strength:   {:>10}  (latest {})",
        format_number(stats.relative_strength_records),
        date(stats.latest_relative_strength_date)
    );

    if !latest.is_empty() {
        println!("\n🏭 Latest industry index values");
        for point in &latest {
            println!(
                "   {:<32} {:>12.2}  {} ({} stocks)",
                point.industry, point.index_value, point.date, point.stock_count
            );
        }
    }
}

fn format_number(n: i64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
