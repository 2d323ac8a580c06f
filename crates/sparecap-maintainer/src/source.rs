//! Where a maintenance pass gets its nodes from.

use std::path::PathBuf;

use sparecap_core::{Inventory, Node};

/// Supplies the current node list at the start of every pass.
pub trait NodeSource: Send + Sync {
    fn nodes(&self) -> anyhow::Result<Vec<Node>>;
}

/// A fixed snapshot, mostly useful in tests and one-shot runs.
impl NodeSource for Inventory {
    fn nodes(&self) -> anyhow::Result<Vec<Node>> {
        Ok(self.nodes.clone())
    }
}

/// An inventory document on disk, re-read on every pass.
#[derive(Debug, Clone)]
pub struct JsonInventory {
    path: PathBuf,
}

impl JsonInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl NodeSource for JsonInventory {
    fn nodes(&self) -> anyhow::Result<Vec<Node>> {
        Ok(Inventory::from_file(&self.path)?.nodes)
    }
}
