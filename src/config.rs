//! Run configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```
//! use group_assign::config::AllocationConfig;
//! use std::time::Duration;
//!
//! let config = AllocationConfig::from_toml_str(r#"
//!     mip_time_secs = 10
//!     local_time_secs = 2.5
//!     rank_weights = [30, 10, 3]
//!     overlap_policy = "sum"
//! "#).unwrap();
//!
//! assert_eq!(config.mip_time(), Duration::from_secs(10));
//! assert_eq!(config.avoidance_penalty, -10);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::condition::{
    OverlapPolicy, RankWeightTable, Score, DEFAULT_AVOIDANCE_PENALTY, DEFAULT_RANK_WEIGHTS,
};
use crate::refine::RefineParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AllocationConfig {
    /// Budget of the exact solver in seconds.
    pub mip_time_secs: f64,
    /// Budget of the local search in seconds.
    pub local_time_secs: f64,
    /// Weight per wish rank, rank 1 first.
    pub rank_weights: Vec<Score>,
    pub avoidance_penalty: Score,
    pub overlap_policy: OverlapPolicy,
    /// Accept swaps that keep the score unchanged.
    pub accept_equal_swaps: bool,
    /// Seed for the local search; entropy when absent.
    pub random_seed: Option<u64>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            mip_time_secs: 60.0,
            local_time_secs: 30.0,
            rank_weights: DEFAULT_RANK_WEIGHTS.to_vec(),
            avoidance_penalty: DEFAULT_AVOIDANCE_PENALTY,
            overlap_policy: OverlapPolicy::default(),
            accept_equal_swaps: true,
            random_seed: None,
        }
    }
}

impl AllocationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_mip_time_secs(mut self, secs: f64) -> Self {
        self.mip_time_secs = secs;
        self
    }

    pub fn with_local_time_secs(mut self, secs: f64) -> Self {
        self.local_time_secs = secs;
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Checks the ranges the solver relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.mip_time_secs.is_finite() && self.mip_time_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "mip_time_secs must be positive, got {}",
                self.mip_time_secs
            )));
        }
        if !(self.local_time_secs.is_finite() && self.local_time_secs >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "local_time_secs must not be negative, got {}",
                self.local_time_secs
            )));
        }
        if self.rank_weights.is_empty() {
            return Err(ConfigError::Invalid("rank_weights must not be empty".into()));
        }
        Ok(())
    }

    pub fn mip_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.mip_time_secs).unwrap_or_default()
    }

    pub fn local_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.local_time_secs).unwrap_or_default()
    }

    pub fn weight_table(&self) -> RankWeightTable {
        RankWeightTable::new(self.rank_weights.clone(), self.avoidance_penalty)
    }

    pub fn refine_params(&self) -> RefineParams {
        RefineParams { time_limit: self.local_time(), accept_equal: self.accept_equal_swaps }
    }
}
