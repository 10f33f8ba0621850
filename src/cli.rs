use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::commands::backfill::AnalyticKind;
use crate::constants::{
    DEFAULT_INDEX_BASE, DEFAULT_INDEX_PERIOD_DAYS, MA_LONG_PERIOD, MA_TREND_PERIOD,
    MIN_RELAXED_MA_WINDOW,
};
use crate::models::{BatchConfig, EntityType, Horizon, RelativeStrengthConfig};
use crate::utils::get_benchmark_symbol;

#[derive(Parser)]
#[command(name = "stocktools")]
#[command(about = "Industry index, momentum and relative strength analytics", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Relative strength options shared by several subcommands
#[derive(clap::Args, Debug, Clone)]
pub struct StrengthArgs {
    /// Benchmark symbol (default: BENCHMARK_SYMBOL or ^CRSLDX)
    #[arg(long)]
    pub benchmark: Option<String>,

    /// Shrink the MA window for short histories instead of skipping them
    #[arg(long)]
    pub relaxed: bool,

    /// Smallest MA window accepted in relaxed mode
    #[arg(long, default_value_t = MIN_RELAXED_MA_WINDOW)]
    pub min_window: usize,

    /// Long moving average period
    #[arg(long, default_value_t = MA_LONG_PERIOD)]
    pub ma_period: usize,

    /// Observations between the MA readings of the trend test
    #[arg(long, default_value_t = MA_TREND_PERIOD)]
    pub trend_period: usize,
}

impl StrengthArgs {
    fn benchmark_symbol(&self) -> String {
        self.benchmark.clone().unwrap_or_else(get_benchmark_symbol)
    }

    fn config(&self) -> RelativeStrengthConfig {
        let config = RelativeStrengthConfig::new(self.benchmark_symbol())
            .with_ma_period(self.ma_period)
            .with_trend_period(self.trend_period);
        if self.relaxed {
            config.relaxed(self.min_window)
        } else {
            config
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import daily price CSVs and industry membership into the database
    Import {
        /// Directory of price files (default: MARKET_DATA_DIR)
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Industry membership JSON (default: TICKER_GROUP_PATH)
        #[arg(short, long)]
        groups: Option<PathBuf>,
    },
    /// Build equal-weighted industry indices
    BuildIndices {
        /// End date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
        /// Calendar days of history to build
        #[arg(long, default_value_t = DEFAULT_INDEX_PERIOD_DAYS)]
        days: i64,
        /// Index value on the first date
        #[arg(long, default_value_t = DEFAULT_INDEX_BASE)]
        base: f64,
    },
    /// Calculate momentum for every entity, or one symbol
    Momentum {
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long)]
        symbol: Option<String>,
        /// Entity type of --symbol: stock, industry or index
        #[arg(long, value_parser = EntityType::from_str)]
        entity_type: Option<EntityType>,
        #[arg(long)]
        json: bool,
    },
    /// Calculate Mansfield relative strength for every entity, or one symbol
    RelativeStrength {
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long)]
        symbol: Option<String>,
        #[arg(long, value_parser = EntityType::from_str)]
        entity_type: Option<EntityType>,
        #[command(flatten)]
        strength: StrengthArgs,
        #[arg(long)]
        json: bool,
    },
    /// Generate historical industry analytics over a date range (resumable)
    Backfill {
        #[arg(value_enum)]
        kind: AnalyticKind,
        /// First date (default: end minus --days)
        #[arg(long)]
        start: Option<String>,
        /// Last date (default today)
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value_t = BatchConfig::default().lookback_days)]
        days: i64,
        /// Dates processed concurrently
        #[arg(long, default_value_t = BatchConfig::default().concurrent_dates)]
        concurrency: usize,
        #[arg(long, default_value_t = BatchConfig::default().persist_retries)]
        retries: usize,
        #[command(flatten)]
        strength: StrengthArgs,
    },
    /// Show top entities on the latest date, or one symbol's history
    Top {
        #[arg(value_enum)]
        kind: AnalyticKind,
        /// Horizon: 30d, 90d or 180d
        #[arg(long, default_value = "30d", value_parser = Horizon::from_str)]
        horizon: Horizon,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        #[arg(long, value_parser = EntityType::from_str)]
        entity_type: Option<EntityType>,
        /// Rank relative strength values substituted from the current RS
        #[arg(long)]
        include_fallback: bool,
        /// Show this symbol's history instead of the ranking
        #[arg(short, long)]
        symbol: Option<String>,
        /// Also print momentum statistics per entity type
        #[arg(long)]
        stats: bool,
        #[arg(long)]
        benchmark: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Rotation quadrants for industries, or one symbol's journey
    Quadrants {
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long)]
        symbol: Option<String>,
        /// Dates in the journey
        #[arg(short, long, default_value_t = 90)]
        limit: usize,
        #[arg(long)]
        benchmark: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show database contents
    Status,
    /// Delete analytic records older than a date
    Prune {
        /// Delete records dated before this day (YYYY-MM-DD)
        #[arg(long)]
        before: String,
        #[arg(value_enum)]
        kind: Option<AnalyticKind>,
    },
}

pub fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { dir, groups } => {
            commands::import::run(dir, groups);
        }
        Commands::BuildIndices { date, days, base } => {
            commands::build_indices::run(date, days, base);
        }
        Commands::Momentum {
            date,
            symbol,
            entity_type,
            json,
        } => {
            commands::momentum::run(date, symbol, entity_type, json);
        }
        Commands::RelativeStrength {
            date,
            symbol,
            entity_type,
            strength,
            json,
        } => {
            commands::relative_strength::run(date, symbol, entity_type, strength.config(), json);
        }
        Commands::Backfill {
            kind,
            start,
            end,
            days,
            concurrency,
            retries,
            strength,
        } => {
            let batch_config = BatchConfig::default()
                .with_lookback_days(days)
                .with_concurrency(concurrency)
                .with_persist_retries(retries);
            commands::backfill::run(kind, start, end, batch_config, strength.config());
        }
        Commands::Top {
            kind,
            horizon,
            limit,
            entity_type,
            include_fallback,
            symbol,
            stats,
            benchmark,
            json,
        } => {
            commands::top::run(commands::top::TopOptions {
                kind,
                horizon,
                limit,
                entity_type,
                benchmark_symbol: benchmark.unwrap_or_else(get_benchmark_symbol),
                include_fallback,
                symbol,
                stats,
                json,
            });
        }
        Commands::Quadrants {
            date,
            symbol,
            limit,
            benchmark,
            json,
        } => {
            let benchmark = benchmark.unwrap_or_else(get_benchmark_symbol);
            commands::quadrants::run(date, symbol, limit, benchmark, json);
        }
        Commands::Status => {
            commands::status::run();
        }
        Commands::Prune { before, kind } => {
            commands::prune::run(before, kind);
        }
    }
}
