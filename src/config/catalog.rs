// src/config/catalog.rs
use serde::{Deserialize, Serialize};

/// One star system to turn into a training file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(alias = "target")]
    pub target_name: String,
    /// Known number of confirmed planets (the label).
    #[serde(alias = "planets")]
    pub planet_count: u32,
}

impl CatalogEntry {
    pub fn new(target_name: impl Into<String>, planet_count: u32) -> Self {
        Self {
            target_name: target_name.into(),
            planet_count,
        }
    }
}

/// Kepler systems with well-established planet counts.
pub const KEPLER_SYSTEMS: [(&str, u32); 15] = [
    ("Kepler-8", 1),
    ("Kepler-10", 2),
    ("Kepler-20", 3),
    ("Kepler-37", 3),
    ("Kepler-62", 5),
    ("Kepler-69", 2),
    ("Kepler-11", 6),
    ("Kepler-18", 3),
    ("Kepler-36", 2),
    ("Kepler-90", 8),
    ("Kepler-80", 6),
    ("Kepler-33", 5),
    ("Kepler-160", 3),
    ("Kepler-30", 3),
    ("Kepler-47", 3),
];

pub fn default_catalog() -> Vec<CatalogEntry> {
    KEPLER_SYSTEMS
        .iter()
        .map(|&(name, count)| CatalogEntry::new(name, count))
        .collect()
}
