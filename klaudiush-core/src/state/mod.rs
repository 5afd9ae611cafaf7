//! Shared persistence helpers for the single-writer state files.
//!
//! Each store owns its file and serializes read-modify-write through an
//! advisory lock on a `.lock` sidecar; the payload itself is replaced with a
//! temp-file rename so a crash mid-write never leaves a torn file.

pub mod audit;
pub mod rate_limiter;

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

pub use audit::{AuditEntry, AuditLog, AuditOutcome};
pub use rate_limiter::{BypassDecision, RateLimiter, RateLimiterState};

/// Advisory lock held for the duration of one read-modify-write.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Block until the lock on `path`'s sidecar is acquired.
    pub fn acquire(path: &Path) -> Result<Self> {
        let lock_path = lock_path_for(path);
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("failed to open lock file {}", lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".to_string());
    name.push_str(".lock");
    path.with_file_name(name)
}

/// Replace `path` atomically: write a temp file in the same directory, then
/// rename over the target.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    temp.write_all(bytes).context("failed to write temp file")?;
    temp.flush().context("failed to flush temp file")?;
    temp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
