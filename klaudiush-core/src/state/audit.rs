//! Append-only JSONL audit log for exception decisions.
//!
//! One line per allow/deny, written under the sidecar lock. Rotation by size
//! shifts the current file to `.1`, `.1` to `.2`, and so on; retention drops
//! entries older than the configured age.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use klaudiush_config::AuditConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FileLock, atomic_write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Allowed,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub code: String,
    pub validator: String,
    pub outcome: AuditOutcome,
    /// Denial reason (`rate_limit_exceeded`, `reason_required`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The command that carried the exception token.
    pub command: String,
}

pub struct AuditLog {
    path: PathBuf,
    max_size_bytes: u64,
    max_backups: usize,
    max_age: Duration,
}

impl AuditLog {
    pub fn new(path: PathBuf, config: &AuditConfig) -> Self {
        Self {
            path,
            max_size_bytes: config.max_size_mb * 1024 * 1024,
            max_backups: config.max_backups,
            max_age: Duration::days(i64::from(config.max_age_days)),
        }
    }

    /// Append one entry. Serialized with other hook invocations via the lock.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        let _lock = FileLock::acquire(&self.path)?;

        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open audit log {}", self.path.display()))?;
        let line = serde_json::to_string(entry).context("failed to serialize audit entry")?;
        writeln!(file, "{line}").context("failed to append audit entry")?;

        debug!(code = %entry.code, outcome = ?entry.outcome, "audit entry appended");
        Ok(())
    }

    /// Entries matching the filters, oldest first. Tolerates a torn final
    /// line from a concurrent append.
    pub fn query(
        &self,
        code: Option<&str>,
        outcome: Option<AuditOutcome>,
    ) -> Result<Vec<AuditEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read audit log {}", self.path.display()));
            }
        };

        let entries = content
            .lines()
            .filter_map(|line| serde_json::from_str::<AuditEntry>(line).ok())
            .filter(|entry| code.is_none_or(|code| entry.code == code))
            .filter(|entry| outcome.is_none_or(|outcome| entry.outcome == outcome))
            .collect();
        Ok(entries)
    }

    /// Drop entries older than the retention age. Returns how many were
    /// removed.
    pub fn cleanup(&self, now: DateTime<Utc>) -> Result<usize> {
        let _lock = FileLock::acquire(&self.path)?;

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read audit log {}", self.path.display()));
            }
        };

        let cutoff = now - self.max_age;
        let mut kept = String::new();
        let mut dropped = 0;
        for line in content.lines() {
            match serde_json::from_str::<AuditEntry>(line) {
                Ok(entry) if entry.timestamp < cutoff => dropped += 1,
                _ => {
                    kept.push_str(line);
                    kept.push('\n');
                }
            }
        }

        if dropped > 0 {
            atomic_write(&self.path, kept.as_bytes())?;
        }
        Ok(dropped)
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let size = match fs::metadata(&self.path) {
            Ok(metadata) => metadata.len(),
            Err(_) => return Ok(()),
        };
        if size <= self.max_size_bytes {
            return Ok(());
        }

        // Shift .{n} -> .{n+1}, dropping anything beyond max_backups.
        let rotated = |index: usize| {
            let mut name = self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            name.push_str(&format!(".{index}"));
            self.path.with_file_name(name)
        };

        let oldest = rotated(self.max_backups);
        if oldest.exists() {
            fs::remove_file(&oldest)
                .with_context(|| format!("failed to remove {}", oldest.display()))?;
        }
        for index in (1..self.max_backups).rev() {
            let from = rotated(index);
            if from.exists() {
                fs::rename(&from, rotated(index + 1))
                    .with_context(|| format!("failed to rotate {}", from.display()))?;
            }
        }
        fs::rename(&self.path, rotated(1))
            .with_context(|| format!("failed to rotate {}", self.path.display()))?;
        Ok(())
    }
}
