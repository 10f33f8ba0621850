use std::path::PathBuf;
use std::time::Instant;

use super::{fail, open_store, runtime};
use crate::models::IndustryGroups;
use crate::services::Importer;
use crate::utils::{get_market_data_dir, get_ticker_group_path};

pub fn run(data_dir: Option<PathBuf>, groups_path: Option<PathBuf>) {
    let start_time = Instant::now();
    let data_dir = data_dir.unwrap_or_else(get_market_data_dir);
    let groups_path = groups_path.unwrap_or_else(get_ticker_group_path);

    println!("🚀 Importing daily prices from: {}", data_dir.display());

    let groups = if groups_path.exists() {
        match IndustryGroups::from_file(&groups_path) {
            Ok(groups) => {
                println!(
                    "🏭 Loaded {} industries from {}",
                    groups.industry_names().len(),
                    groups_path.display()
                );
                Some(groups)
            }
            Err(e) => fail("Failed to load industry groups", e),
        }
    } else {
        println!(
            "⚠️  No industry groups at {}; symbols will have no industry",
            groups_path.display()
        );
        None
    };

    let result = runtime().block_on(async {
        let store = open_store().await?;
        let stats = Importer::new(&store)
            .import_all(&data_dir, groups.as_ref())
            .await;
        store.close().await;
        stats
    });

    match result {
        Ok(stats) => {
            println!("\n✨ Import complete in {:.1}s", start_time.elapsed().as_secs_f64());
            println!("   📄 Files:    {}", stats.files);
            println!("   📈 Symbols:  {}", stats.symbols);
            println!("   ✅ Rows:     {}", stats.rows_imported);
            println!("   ⏭️  Skipped:  {}", stats.rows_skipped);
            println!("   🏷️  Listings: {}", stats.listings);
            if !stats.errors.is_empty() {
                println!("   ❌ Errors:   {}", stats.errors.len());
                for (source, error) in stats.errors.iter().take(10) {
                    println!("      {}: {}", source, error);
                }
            }
        }
        Err(e) => fail("Import failed", e),
    }
}
