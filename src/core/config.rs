//! Engine configuration with documented constants
//!
//! The timing constants drive how long atomic processes claim to run.
//! They can be overridden from a TOML file; missing keys keep defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{IveError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === STEP PROCESS ===
    /// Milliseconds a step costs per unit of joint weight
    ///
    /// A neighbour reached over a joint of weight 2.0 takes 1000 ms.
    pub step_ms_per_weight: f64,

    /// Step length when the target is not a direct neighbour
    pub step_default_ms: u64,

    /// Divisor applied when the actor already stands on the target
    ///
    /// Such a step only settles the actor and is near instant.
    pub settle_divisor: u64,

    // === DELEGATION ===
    /// Re-poll interval of a delegation the genius reported as running
    pub delegated_running_ms: u64,

    /// Length reported before the delegation has been started
    pub delegation_pending_ms: u64,

    // === PARAMETERS ===
    /// Name of the process parameter carrying the atomic LOD
    pub lod_parameter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_ms_per_weight: 500.0,
            step_default_ms: 1000,
            settle_divisor: 10,
            delegated_running_ms: 60 * 60 * 1000,
            delegation_pending_ms: 1,
            lod_parameter: "lod".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate().map_err(IveError::Config)?;
        Ok(config)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(self.step_ms_per_weight > 0.0) {
            return Err(format!(
                "step_ms_per_weight ({}) must be positive",
                self.step_ms_per_weight
            ));
        }

        if self.settle_divisor == 0 {
            return Err("settle_divisor must be at least 1".into());
        }

        if self.lod_parameter.is_empty() {
            return Err("lod_parameter must not be empty".into());
        }

        Ok(())
    }
}

// === GLOBAL CONFIG ACCESS ===

use std::sync::OnceLock;

static CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Get the global engine config (initializes with defaults if not set)
pub fn config() -> &'static EngineConfig {
    CONFIG.get_or_init(EngineConfig::default)
}

/// Set the global engine config (can only be called once)
///
/// Returns Err if config was already set.
pub fn set_config(config: EngineConfig) -> std::result::Result<(), EngineConfig> {
    CONFIG.set(config)
}
