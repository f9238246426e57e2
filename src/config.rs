//! Tier ladder configuration.
//!
//! The ladder is read from a TOML file of `[[tiers]]` tables:
//!
//! ```toml
//! [[tiers]]
//! name = "Curious Beginner"
//! min_points = 0
//! max_points = 99
//! color = "#9CA3AF"
//! icon = "🌱"
//! description = "Just starting to ask questions"
//! ```
//!
//! Without a file the built-in ladder is used.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::Result;
use crate::models::Tier;
use crate::tiers::TierTable;

#[derive(Debug, Deserialize)]
struct TierFile {
    tiers: Vec<TierEntry>,
}

#[derive(Debug, Deserialize)]
struct TierEntry {
    name: String,
    min_points: i64,
    #[serde(default)]
    max_points: Option<i64>,
    #[serde(default)]
    color: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    description: String,
}

impl From<TierEntry> for Tier {
    fn from(entry: TierEntry) -> Self {
        Tier {
            name: entry.name,
            min_points: entry.min_points,
            max_points: entry.max_points,
            color: entry.color,
            icon: entry.icon,
            description: entry.description,
        }
    }
}

pub fn parse_tier_table(contents: &str) -> Result<TierTable> {
    let file: TierFile = toml::from_str(contents)?;
    TierTable::new(file.tiers.into_iter().map(Tier::from).collect())
}

pub fn load_tier_table(path: Option<&Path>) -> Result<TierTable> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            let table = parse_tier_table(&contents)?;
            info!(path = %path.display(), tiers = table.tiers().len(), "loaded tier ladder");
            Ok(table)
        }
        None => Ok(TierTable::default()),
    }
}
