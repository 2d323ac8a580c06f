//! Error types for configuration and inventory loading.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("read error: {0}")]
    Read(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("invalid inventory: {0}")]
    Inventory(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}
