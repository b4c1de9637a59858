#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::error::{Result, RoverError};
use crate::types::{Grid, GRID_MAX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = ".rover/config.toml";
pub const CONFIG_ENV_VAR: &str = "ROVER_CONFIG";

/// Largest accepted `grid_max`.
pub const GRID_MAX_LIMIT: i32 = 1_000;

/// Tunables for mission execution (TOML). Missing fields take defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MissionConfig {
    /// Highest coordinate on either axis.
    pub grid_max: i32,

    /// Random obstacles placed when a mission names none.
    pub obstacle_count: usize,
    pub obstacle_attempts: usize,

    /// Extra Manhattan distance a fallback detour may add.
    pub detour_slack: u32,

    /// Blocking events inside the window that trigger an abort.
    pub rejection_threshold: usize,
    pub rejection_window: usize,

    pub oracle_timeout_ms: u64,

    /// SEEK cycles granted on top of the derived worst case.
    pub iteration_margin: usize,

    pub progress_log_tail: usize,
    pub progress_channel_capacity: usize,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            grid_max: GRID_MAX,
            obstacle_count: 5,
            obstacle_attempts: 100,
            detour_slack: 2,
            rejection_threshold: 15,
            rejection_window: 20,
            oracle_timeout_ms: 10_000,
            iteration_margin: 50,
            progress_log_tail: 10,
            progress_channel_capacity: 256,
        }
    }
}

impl MissionConfig {
    /// # Errors
    /// Returns `RoverError::Config` when a field is out of range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=GRID_MAX_LIMIT).contains(&self.grid_max) {
            return Err(RoverError::Config(format!(
                "grid_max must be between 1 and {GRID_MAX_LIMIT}, got {}",
                self.grid_max
            )));
        }
        if self.obstacle_count > 0 && self.obstacle_attempts == 0 {
            return Err(RoverError::Config(
                "obstacle_attempts must be > 0 when obstacle_count > 0".to_string(),
            ));
        }
        if self.rejection_threshold == 0 {
            return Err(RoverError::Config(
                "rejection_threshold must be > 0".to_string(),
            ));
        }
        if self.rejection_window < self.rejection_threshold {
            return Err(RoverError::Config(format!(
                "rejection_window ({}) must be >= rejection_threshold ({})",
                self.rejection_window, self.rejection_threshold
            )));
        }
        if self.oracle_timeout_ms == 0 {
            return Err(RoverError::Config("oracle_timeout_ms must be > 0".to_string()));
        }
        if self.progress_channel_capacity == 0 {
            return Err(RoverError::Config(
                "progress_channel_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn grid(&self) -> Grid {
        Grid::new(self.grid_max)
    }

    #[must_use]
    pub const fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Upper bound on SEEK cycles for a plan of `steps` steps.
    ///
    /// Each step may need a full diagonal crossing with detours (four cells
    /// per row), plus room for every rejection the window can absorb.
    #[must_use]
    pub const fn iteration_cap(&self, steps: usize) -> usize {
        steps
            .saturating_mul(4)
            .saturating_mul(self.grid().side())
            .saturating_add(self.rejection_threshold.saturating_mul(2))
            .saturating_add(self.iteration_margin)
    }

    /// # Errors
    /// Returns `RoverError::Toml` on malformed input or `RoverError::Config`
    /// when the parsed values do not validate.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

/// Resolves the config path: explicit argument, then `ROVER_CONFIG`, then
/// the project default.
#[must_use]
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| non_empty_env_var(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Loads config from a TOML file. A missing file yields defaults.
///
/// # Errors
/// Returns an error when the file cannot be read, parsed or validated.
pub async fn load_config(path: &Path) -> Result<MissionConfig> {
    if !path.exists() {
        let config = MissionConfig::default();
        config.validate()?;
        return Ok(config);
    }

    let content = tokio::fs::read_to_string(path).await?;
    MissionConfig::from_toml_str(&content)
}

fn non_empty_env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
