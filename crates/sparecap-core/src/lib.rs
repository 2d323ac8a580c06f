//! sparecap-core: shared types for the spare capacity engine.
//!
//! Holds the node model consumed by the analysis crates, the resource
//! footprint arithmetic, `sparecap.toml` parsing and JSON inventory
//! snapshots.

pub mod config;
pub mod error;
pub mod inventory;
pub mod types;

pub use config::{SparecapConfig, parse_duration};
pub use error::{CoreError, CoreResult};
pub use inventory::Inventory;
pub use types::*;
