//! `[patterns]`, `[session]` and `[crash_dump]` sections.

use std::path::PathBuf;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::defaults;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Pattern entries older than this are dropped on cleanup.
    #[serde(default = "defaults::patterns::max_age_days")]
    pub max_age_days: u32,

    /// Sessions idle longer than this leave the working set.
    #[serde(default = "defaults::patterns::session_max_age_hours")]
    pub session_max_age_hours: u32,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            max_age_days: defaults::patterns::max_age_days(),
            session_max_age_hours: defaults::patterns::session_max_age_hours(),
        }
    }
}

impl PatternsConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Two failures further apart than this are not treated as a pair.
    #[serde(default = "defaults::session::window_minutes")]
    pub window_minutes: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_minutes: defaults::session::window_minutes(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.window_minutes > 0,
            "session.window_minutes must be positive"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrashDumpConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    #[serde(default = "defaults::crash_dump::max_dumps")]
    pub max_dumps: usize,
}

impl Default for CrashDumpConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            directory: None,
            max_dumps: defaults::crash_dump::max_dumps(),
        }
    }
}

impl CrashDumpConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }
}
