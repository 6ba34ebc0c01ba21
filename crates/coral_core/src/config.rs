//! Runtime configuration (`coral.toml` `[runtime]` table or inline TOML)

use serde::{Deserialize, Serialize};

/// Tunables of the object runtime
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Maximum nesting of the same event on the same emitter before the
    /// emission is dropped as a binding loop
    #[serde(default = "default_emit_depth_limit")]
    pub emit_depth_limit: u32,
    /// Delay used by wait actions that were given no `until` predicate
    #[serde(default = "default_wait_ms")]
    pub default_wait_ms: u64,
    /// Upper bound of ticks performed by `run_until_idle`
    #[serde(default = "default_idle_tick_limit")]
    pub idle_tick_limit: usize,
}

fn default_emit_depth_limit() -> u32 {
    4
}

fn default_wait_ms() -> u64 {
    1000
}

fn default_idle_tick_limit() -> usize {
    1000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            emit_depth_limit: default_emit_depth_limit(),
            default_wait_ms: default_wait_ms(),
            idle_tick_limit: default_idle_tick_limit(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from TOML; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}
