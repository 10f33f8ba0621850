use chrono::Duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::Ordering;
use std::time::Instant;

use super::{fail, open_store, parse_date_or_today, print_batch_stats, runtime, stores_for};
use crate::models::{BatchConfig, RelativeStrengthConfig};
use crate::services::{BatchKind, EntityRef, HistoricalBatch};

/// Which stored analytic a command works on
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AnalyticKind {
    Momentum,
    RelativeStrength,
}

pub fn run(
    kind: AnalyticKind,
    start: Option<String>,
    end: Option<String>,
    batch_config: BatchConfig,
    rs_config: RelativeStrengthConfig,
) {
    let start_time = Instant::now();
    let end = match parse_date_or_today(end.as_deref()) {
        Ok(d) => d,
        Err(e) => fail("Invalid arguments", e),
    };
    let start = match start {
        Some(s) => match parse_date_or_today(Some(&s)) {
            Ok(d) => d,
            Err(e) => fail("Invalid arguments", e),
        },
        None => end - Duration::days(batch_config.lookback_days),
    };
    if start > end {
        fail("Invalid arguments", format!("start {} is after end {}", start, end));
    }

    let batch_kind = match kind {
        AnalyticKind::Momentum => BatchKind::Momentum,
        AnalyticKind::RelativeStrength => BatchKind::RelativeStrength(rs_config),
    };

    println!(
        "🕰️  Backfilling {} for industry indices from {} to {}",
        batch_kind.label(),
        start,
        end
    );
    println!(
        "   ⚡ Concurrent dates: {}, persistence retries: {}",
        batch_config.concurrent_dates, batch_config.persist_retries
    );

    let pb = ProgressBar::new(0);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} dates ({eta})")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => tracing::debug!(error = %e, "Backfill: default progress style"),
    }

    let result = runtime().block_on(async {
        let store = open_store().await?;
        let batch = HistoricalBatch::new(stores_for(&store), batch_config).with_progress(pb);

        // Ctrl+C stops launching new dates; in-flight dates still persist
        let stop = batch.stop_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n⚠️  Interrupt received, finishing in-flight dates...");
                stop.store(true, Ordering::Relaxed);
            }
        });

        let industries = batch.industries_in_range(start, end).await?;
        let entities: Vec<EntityRef> = industries.into_iter().map(EntityRef::industry).collect();
        println!("   🏭 Industries: {}", entities.len());

        let stats = batch.generate_range(&batch_kind, &entities, start, end).await;
        store.close().await;
        stats
    });

    match result {
        Ok(stats) => {
            print_batch_stats("Backfill", &stats);
            println!("   ⏱️  Elapsed: {:.1}s", start_time.elapsed().as_secs_f64());
        }
        Err(e) => fail("Backfill failed", e),
    }
}
