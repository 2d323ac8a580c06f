//! Capacity engine error types.

use thiserror::Error;

/// Errors raised by the capacity engine.
///
/// Overcommitted hosts, policy violations and a solver that finds no
/// mitigation are ordinary results, not errors.
#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("node {node} references unknown parent host {parent}")]
    UnknownParent { node: String, parent: String },

    #[error("unknown host: {0}")]
    UnknownHost(String),

    #[error("no host removal sequence leads to failure among {0} hosts")]
    NoFailurePath(usize),

    #[error("invalid move of {node}: {reason}")]
    InvalidMove { node: String, reason: String },
}

pub type CapacityResult<T> = Result<T, CapacityError>;
