//! State adjacency for the geographic-fit score.
//!
//! The adjacency table is an injected dependency: when absent, the
//! adjacent-state score is simply never awarded. Deployments supply the
//! table as YAML (`VA: [MD, DC, WV, KY, TN, NC]`).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateAdjacency {
    neighbors: BTreeMap<String, Vec<String>>,
}

impl StateAdjacency {
    /// An empty table: no pair is considered adjacent.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(neighbors: BTreeMap<String, Vec<String>>) -> Self {
        let neighbors = neighbors
            .into_iter()
            .map(|(k, v)| {
                (
                    k.to_uppercase(),
                    v.into_iter().map(|s| s.to_uppercase()).collect(),
                )
            })
            .collect();
        Self { neighbors }
    }

    pub fn load_yaml(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let neighbors: BTreeMap<String, Vec<String>> =
            serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::from_map(neighbors))
    }

    /// Whether two states share a border, in either direction.
    pub fn adjacent(&self, a: &str, b: &str) -> bool {
        let a = a.to_uppercase();
        let b = b.to_uppercase();
        let forward = self
            .neighbors
            .get(&a)
            .map(|n| n.contains(&b))
            .unwrap_or(false);
        forward
            || self
                .neighbors
                .get(&b)
                .map(|n| n.contains(&a))
                .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_is_symmetric_even_when_declared_once() {
        let mut map = BTreeMap::new();
        map.insert("VA".to_string(), vec!["MD".to_string(), "DC".to_string()]);
        let table = StateAdjacency::from_map(map);

        assert!(table.adjacent("VA", "MD"));
        assert!(table.adjacent("md", "va"));
        assert!(!table.adjacent("VA", "CA"));
    }

    #[test]
    fn empty_table_has_no_neighbors() {
        let table = StateAdjacency::empty();
        assert!(table.is_empty());
        assert!(!table.adjacent("VA", "MD"));
    }
}
