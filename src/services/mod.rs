pub mod batch;
pub mod database;
pub mod importer;
pub mod index_builder;
pub mod memory_store;
pub mod momentum;
pub mod quadrants;
pub mod relative_strength;
pub mod series;
pub mod store;

pub use batch::{BatchKind, HistoricalBatch};
pub use database::{database_exists, DatabaseStats, SqliteStore};
pub use importer::{ImportStats, Importer};
pub use index_builder::{build_index, IndexBuilder, IndexValue};
pub use memory_store::MemoryStore;
pub use momentum::{compute_momentum, MomentumCalculator};
pub use quadrants::{quadrant_journey, QuadrantAnalyzer};
pub use relative_strength::{compute_relative_strength, mansfield_rs, RelativeStrengthCalculator};
pub use store::{
    EntityRef, IndexStore, MembershipProvider, MomentumStatistics, MomentumStore, PriceProvider,
    RelativeStrengthStore, StrengthRankingQuery, Stores,
};
