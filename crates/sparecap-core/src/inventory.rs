//! Node inventory snapshots.
//!
//! The surrounding node repository owns persistence. For analysis the engine
//! only needs a flat node list, which can be captured as a JSON document:
//!
//! ```text
//! { "nodes": [ { "hostname": "host1", ... }, ... ] }
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::Node;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub nodes: Vec<Node>,
}

impl Inventory {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Read(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    /// Parse an inventory document. Hostnames must be unique.
    pub fn from_json_str(content: &str) -> CoreResult<Self> {
        let inventory: Inventory =
            serde_json::from_str(content).map_err(|e| CoreError::Inventory(e.to_string()))?;

        let mut seen = HashSet::new();
        for node in &inventory.nodes {
            if !seen.insert(node.hostname.as_str()) {
                return Err(CoreError::Inventory(format!(
                    "duplicate hostname: {}",
                    node.hostname
                )));
            }
        }
        Ok(inventory)
    }

    pub fn to_json_string(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Inventory(e.to_string()))
    }
}
