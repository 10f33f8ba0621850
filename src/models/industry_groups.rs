use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::Listing;
use crate::error::Result;
use crate::utils::is_market_index;

/// Industry membership: industry name -> constituent symbols
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndustryGroups {
    #[serde(flatten)]
    pub groups: HashMap<String, Vec<String>>,
}

impl IndustryGroups {
    /// Load industry groups from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let groups: HashMap<String, Vec<String>> = serde_json::from_str(&content)?;
        Ok(Self { groups })
    }

    /// Get all industry names
    pub fn industry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().cloned().collect();
        names.sort();
        names
    }

    /// Listings for every symbol; market indices carry no industry
    pub fn listings(&self) -> Vec<Listing> {
        let mut listings = Vec::new();
        for industry in self.industry_names() {
            let Some(symbols) = self.groups.get(&industry) else {
                continue;
            };
            for symbol in symbols {
                let is_index = is_market_index(symbol);
                listings.push(Listing {
                    symbol: symbol.clone(),
                    name: symbol.clone(),
                    industry: if is_index { None } else { Some(industry.clone()) },
                    is_index,
                });
            }
        }
        listings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        listings.dedup_by(|a, b| a.symbol == b.symbol);
        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> IndustryGroups {
        let mut groups = HashMap::new();
        groups.insert(
            "IT".to_string(),
            vec!["TCS".to_string(), "INFY".to_string(), "WIPRO".to_string()],
        );
        groups.insert("BANK".to_string(), vec!["HDFCBANK".to_string(), "SBIN".to_string()]);
        groups.insert("INDEX".to_string(), vec!["^CRSLDX".to_string()]);
        IndustryGroups { groups }
    }

    #[test]
    fn test_industry_groups_structure() {
        let g = groups();
        assert_eq!(g.industry_names(), vec!["BANK", "INDEX", "IT"]);
    }

    #[test]
    fn test_listings_classify_market_indices() {
        let listings = groups().listings();
        let benchmark = listings.iter().find(|l| l.symbol == "^CRSLDX").unwrap();
        assert!(benchmark.is_index);
        assert_eq!(benchmark.industry, None);
        let tcs = listings.iter().find(|l| l.symbol == "TCS").unwrap();
        assert_eq!(tcs.industry.as_deref(), Some("IT"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticker_group.json");
        fs::write(&path, r#"{"IT": ["TCS", "INFY", "WIPRO"]}"#).unwrap();
        let g = IndustryGroups::from_file(&path).unwrap();
        assert_eq!(g.groups.get("IT").map(|v| v.len()), Some(3));
    }
}
