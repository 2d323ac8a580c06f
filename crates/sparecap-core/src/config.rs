//! sparecap.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparecapConfig {
    #[serde(default)]
    pub maintainer: MaintainerConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintainerConfig {
    /// Time between maintenance passes (e.g. "20m").
    pub interval: String,
    /// Number of hosts kept empty as spares.
    pub spare_count: usize,
}

impl Default for MaintainerConfig {
    fn default() -> Self {
        Self {
            interval: "20m".to_string(),
            spare_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Cap on repeated evacuations simulated per host.
    pub max_repeated_removals: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_repeated_removals: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Largest set of children moved off one host in a single step.
    pub max_subset_size: usize,
    /// How many of a host's children take part in subset enumeration.
    pub max_children_considered: usize,
    /// Search steps before the solver gives up.
    pub max_iterations: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_subset_size: 5,
            max_children_considered: 31,
            max_iterations: 10_000,
        }
    }
}

impl SparecapConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Read(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: SparecapConfig =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.maintainer_interval()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))
    }

    /// The maintainer interval parsed into a [`Duration`].
    pub fn maintainer_interval(&self) -> CoreResult<Duration> {
        parse_duration(&self.maintainer.interval)
    }
}

/// Parse a duration string like "30s", "5m", "1h" or "90" (seconds).
pub fn parse_duration(s: &str) -> CoreResult<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.char_indices().last() {
        Some((i, 's')) => (&s[..i], 1),
        Some((i, 'm')) => (&s[..i], 60),
        Some((i, 'h')) => (&s[..i], 3600),
        _ => (s, 1),
    };
    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidDuration(s.to_string()))?;
    let secs = value
        .checked_mul(unit)
        .ok_or_else(|| CoreError::InvalidDuration(s.to_string()))?;
    Ok(Duration::from_secs(secs))
}
