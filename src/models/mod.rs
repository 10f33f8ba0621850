mod analytics_config;
mod batch;
mod entity;
mod horizon;
mod index_point;
mod industry_groups;
mod momentum;
mod price;
mod quadrant;
mod relative_strength;
pub mod indicators;
pub mod validation;

pub use analytics_config::{BatchConfig, RelativeStrengthConfig};
pub use batch::BatchStats;
pub use entity::{
    EntityType, IndustryIndex, IndustrySummary, Listing, MarketIndex, PricedEntity, Stock,
};
pub use horizon::Horizon;
pub use index_point::{index_points_to_series, IndexBuildSummary, IndustryIndexPoint};
pub use industry_groups::IndustryGroups;
pub use momentum::{HorizonMomentum, MomentumRecord};
pub use price::{closes, PriceObservation, PriceSeries};
pub use quadrant::{Quadrant, QuadrantJourney, QuadrantPoint, QuadrantTransition};
pub use relative_strength::{HorizonStrength, RelativeStrengthRecord, WeinsteinStage};

use std::collections::BTreeMap;

/// Constituent price histories of one industry (symbol -> series)
pub type ConstituentSeries = BTreeMap<String, PriceSeries>;
