use serde::{Deserialize, Serialize};
use std::fmt;

use super::PriceSeries;

/// Classification of a priced entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Stock,
    IndustryIndex,
    MarketIndex,
}

impl EntityType {
    /// Storage representation ("STOCK", "INDUSTRY_INDEX", "MARKET_INDEX")
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Stock => "STOCK",
            EntityType::IndustryIndex => "INDUSTRY_INDEX",
            EntityType::MarketIndex => "MARKET_INDEX",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "STOCK" => Ok(EntityType::Stock),
            "INDUSTRY_INDEX" | "INDUSTRY" => Ok(EntityType::IndustryIndex),
            "MARKET_INDEX" | "INDEX" => Ok(EntityType::MarketIndex),
            _ => Err(format!(
                "Invalid entity type: {}. Valid options: stock, industry, index",
                s
            )),
        }
    }

    /// Entity types stored in the relative strength table
    pub fn is_benchmarkable(&self) -> bool {
        matches!(self, EntityType::Stock | EntityType::IndustryIndex)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything with a price series the analytics engines can consume.
///
/// The engines only see this interface, so one algorithm serves stocks,
/// industry indices and market indices alike.
pub trait PricedEntity: Send + Sync {
    /// Natural key (symbol or industry name)
    fn id(&self) -> &str;

    /// Symbol under which analytic records are stored
    fn symbol(&self) -> &str {
        self.id()
    }

    fn name(&self) -> &str;

    fn entity_type(&self) -> EntityType;

    fn series(&self) -> &PriceSeries;
}

#[derive(Debug, Clone)]
pub struct Stock {
    pub symbol: String,
    pub name: String,
    pub industry: Option<String>,
    pub series: PriceSeries,
}

#[derive(Debug, Clone)]
pub struct IndustryIndex {
    pub industry: String,
    pub name: String,
    pub series: PriceSeries,
}

impl IndustryIndex {
    pub fn new(industry: impl Into<String>, series: PriceSeries) -> Self {
        let industry = industry.into();
        Self {
            name: format!("{} Industry Index", industry),
            industry,
            series,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketIndex {
    pub symbol: String,
    pub name: String,
    pub series: PriceSeries,
}

impl PricedEntity for Stock {
    fn id(&self) -> &str {
        &self.symbol
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Stock
    }

    fn series(&self) -> &PriceSeries {
        &self.series
    }
}

impl PricedEntity for IndustryIndex {
    fn id(&self) -> &str {
        &self.industry
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::IndustryIndex
    }

    fn series(&self) -> &PriceSeries {
        &self.series
    }
}

impl PricedEntity for MarketIndex {
    fn id(&self) -> &str {
        &self.symbol
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> EntityType {
        EntityType::MarketIndex
    }

    fn series(&self) -> &PriceSeries {
        &self.series
    }
}

/// Listing metadata from the membership provider (no prices attached)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub symbol: String,
    pub name: String,
    pub industry: Option<String>,
    pub is_index: bool,
}

impl Listing {
    pub fn entity_type(&self) -> EntityType {
        if self.is_index {
            EntityType::MarketIndex
        } else {
            EntityType::Stock
        }
    }
}

/// Industry with its constituent count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndustrySummary {
    pub industry: String,
    pub constituent_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_round_trip_strings() {
        for t in [EntityType::Stock, EntityType::IndustryIndex, EntityType::MarketIndex] {
            assert_eq!(EntityType::from_str(t.as_str()).unwrap(), t);
        }
        assert_eq!(EntityType::from_str("industry").unwrap(), EntityType::IndustryIndex);
        assert!(EntityType::from_str("bond").is_err());
    }

    #[test]
    fn test_only_stocks_and_industries_are_benchmarkable() {
        assert!(EntityType::Stock.is_benchmarkable());
        assert!(EntityType::IndustryIndex.is_benchmarkable());
        assert!(!EntityType::MarketIndex.is_benchmarkable());
    }

    #[test]
    fn test_industry_index_uses_industry_as_symbol() {
        let idx = IndustryIndex::new("Banks", PriceSeries::default());
        assert_eq!(idx.symbol(), "Banks");
        assert_eq!(idx.name(), "Banks Industry Index");
        assert_eq!(idx.entity_type(), EntityType::IndustryIndex);
    }
}
