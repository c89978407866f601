//! Process-wide observer settings.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables for [`use_observable`](crate::use_observable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Sweep the leak registry whenever a new administration is created.
    pub sweep_abandoned: bool,

    /// Reuse bound function wrappers per (owner, function) within one
    /// administration, so a method read twice is the same function.
    pub cache_bound_functions: bool,
}

impl ObserverConfig {
    pub const DEFAULT: ObserverConfig = ObserverConfig {
        sweep_abandoned: true,
        cache_bound_functions: true,
    };

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

static CONFIG: RwLock<ObserverConfig> = parking_lot::const_rwlock(ObserverConfig::DEFAULT);

/// Replace the global config.
pub fn configure(config: ObserverConfig) {
    *CONFIG.write() = config;
}

/// The current global config.
pub fn config() -> ObserverConfig {
    *CONFIG.read()
}
