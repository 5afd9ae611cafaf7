//! `[backup]` section.

use std::path::PathBuf;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::defaults;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Backup root; default `~/.klaudiush/.backups`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Take a safety snapshot of the target before any restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_before_restore: Option<bool>,

    #[serde(default = "defaults::backup::max_count")]
    pub max_count: usize,

    #[serde(default = "defaults::backup::max_age_days")]
    pub max_age_days: u32,

    #[serde(default = "defaults::backup::max_total_size_mb")]
    pub max_total_size_mb: u64,

    /// Store a snapshot as a patch only when the encoded patch is at most
    /// this percentage of the full content size.
    #[serde(default = "defaults::backup::patch_threshold_percent")]
    pub patch_threshold_percent: u8,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            directory: None,
            backup_before_restore: None,
            max_count: defaults::backup::max_count(),
            max_age_days: defaults::backup::max_age_days(),
            max_total_size_mb: defaults::backup::max_total_size_mb(),
            patch_threshold_percent: defaults::backup::patch_threshold_percent(),
        }
    }
}

impl BackupConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn backup_before_restore(&self) -> bool {
        self.backup_before_restore.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_count > 0, "backup.max_count must be positive");
        ensure!(
            self.patch_threshold_percent <= 100,
            "backup.patch_threshold_percent must be at most 100"
        );
        Ok(())
    }
}
