//! Top-level `[global]` section.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::defaults;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Config schema version. Bumped on incompatible layout changes.
    #[serde(default = "defaults::global::version")]
    pub version: u32,

    /// Per-validator timeout in seconds.
    #[serde(default = "defaults::global::default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Hard wall-clock budget for one hook invocation, in seconds.
    #[serde(default = "defaults::global::hook_budget_secs")]
    pub hook_budget_secs: u64,

    /// Grace period granted to laggards after the budget expires.
    #[serde(default = "defaults::global::grace_period_ms")]
    pub grace_period_ms: u64,

    /// IO pool size = hardware parallelism x this multiplier.
    #[serde(default = "defaults::global::io_pool_multiplier")]
    pub io_pool_multiplier: usize,

    /// Upper bound on the IO pool regardless of the multiplier.
    #[serde(default = "defaults::global::io_pool_ceiling")]
    pub io_pool_ceiling: usize,

    /// Log filter directive; absent means inherit `KLAUDIUSH_LOG`/`RUST_LOG`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            version: defaults::global::version(),
            default_timeout_secs: defaults::global::default_timeout_secs(),
            hook_budget_secs: defaults::global::hook_budget_secs(),
            grace_period_ms: defaults::global::grace_period_ms(),
            io_pool_multiplier: defaults::global::io_pool_multiplier(),
            io_pool_ceiling: defaults::global::io_pool_ceiling(),
            log_level: None,
        }
    }
}

impl GlobalConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.version >= 1, "global.version must be at least 1");
        ensure!(
            self.io_pool_multiplier > 0,
            "global.io_pool_multiplier must be positive"
        );
        ensure!(
            self.io_pool_ceiling > 0,
            "global.io_pool_ceiling must be positive"
        );
        Ok(())
    }
}
