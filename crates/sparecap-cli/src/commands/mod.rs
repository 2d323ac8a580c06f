pub mod check;
pub mod mitigate;
pub mod run;

use std::path::Path;

use sparecap_core::{Inventory, Node, SparecapConfig};

/// Read the config file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SparecapConfig> {
    match path {
        Some(path) => Ok(SparecapConfig::from_file(path)?),
        None => Ok(SparecapConfig::default()),
    }
}

pub fn load_nodes(path: &Path) -> anyhow::Result<Vec<Node>> {
    Ok(Inventory::from_file(path)?.nodes)
}
