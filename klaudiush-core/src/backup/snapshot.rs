//! Snapshot metadata.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScopeKind {
    Global,
    Project,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    Full,
    Patch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupTrigger {
    Automatic,
    Manual,
    BeforeInit,
    Migration,
    BeforeRestore,
}

impl fmt::Display for BackupTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
            Self::BeforeInit => "before_init",
            Self::Migration => "migration",
            Self::BeforeRestore => "before_restore",
        };
        f.write_str(name)
    }
}

/// One saved config image, full or patch-form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub id: String,
    /// Groups a base snapshot with the patches derived from it.
    pub chain_id: String,
    pub config_type: ConfigScopeKind,
    pub config_path: String,
    pub storage_type: StorageType,
    /// Base snapshot a patch applies to; `None` for full snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_id: Option<String>,
    /// Size of the original content in bytes (not the stored form).
    pub size: u64,
    /// SHA-256 of the original content.
    pub checksum: String,
    pub timestamp: DateTime<Utc>,
    pub trigger: BackupTrigger,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}
