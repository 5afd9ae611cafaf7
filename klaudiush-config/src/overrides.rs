//! `[overrides]` section: direct per-code or per-validator disables.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OverridesConfig {
    /// Keyed by error code (`GIT022`) or validator name (`git.commit`).
    #[serde(default)]
    pub entries: BTreeMap<String, OverrideEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OverrideEntry {
    /// true disables the target; false is an explicit force-allow.
    #[serde(default)]
    pub disabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_by: Option<String>,
}

impl OverrideEntry {
    /// Expired entries behave as absent at evaluation time.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

impl OverridesConfig {
    /// Active (unexpired) entry for a target, if any.
    pub fn active_entry(&self, target: &str, now: DateTime<Utc>) -> Option<&OverrideEntry> {
        self.entries
            .get(target)
            .filter(|entry| !entry.is_expired(now))
    }

    /// Entries past their expiry. They stay in the file and remain listable.
    pub fn expired_entries(&self, now: DateTime<Utc>) -> Vec<(&str, &OverrideEntry)> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(target, entry)| (target.as_str(), entry))
            .collect()
    }
}
