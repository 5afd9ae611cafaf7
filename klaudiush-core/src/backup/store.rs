//! The snapshot store: chains, full/patch storage, retention, restore.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use klaudiush_config::BackupConfig;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::patch::{LinePatch, PatchError};
use super::snapshot::{BackupSnapshot, BackupTrigger, ConfigScopeKind, StorageType};
use crate::state::{FileLock, atomic_write};

pub const MIGRATION_MARKER: &str = ".migration.v1";
const SNAPSHOTS_DIR: &str = "snapshots";
const INDEX_FILE: &str = "index.json";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("snapshot {id} not found")]
    MissingSnapshot { id: String },
    #[error("snapshot {id} failed checksum verification after rematerialization")]
    ChecksumMismatch { id: String },
    #[error("snapshot {id} has dependent patches: {dependents:?}")]
    ChainConflict { id: String, dependents: Vec<String> },
    #[error("failed to apply patch chain for snapshot {id}: {source}")]
    PatchApply {
        id: String,
        #[source]
        source: PatchError,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Which config tree a snapshot belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Global,
    Project { path: String },
}

impl ConfigScope {
    fn kind(&self) -> ConfigScopeKind {
        match self {
            Self::Global => ConfigScopeKind::Global,
            Self::Project { .. } => ConfigScopeKind::Project,
        }
    }

    fn relative_dir(&self) -> PathBuf {
        match self {
            Self::Global => PathBuf::from("global"),
            Self::Project { path } => {
                PathBuf::from("projects").join(sanitize_project_path(path))
            }
        }
    }
}

/// Turn a project path into a directory-name-safe token.
pub fn sanitize_project_path(path: &str) -> String {
    path.replace(['/', '\\', ':', '.'], "_")
        .trim_start_matches('_')
        .to_string()
}

pub struct BackupStore {
    root: PathBuf,
    config: BackupConfig,
}

impl BackupStore {
    pub fn new(root: PathBuf, config: BackupConfig) -> Self {
        Self { root, config }
    }

    /// Store rooted at the default location under the state directory.
    pub fn at_default_root(state_dir: &Path, config: BackupConfig) -> Self {
        let root = config
            .directory
            .clone()
            .unwrap_or_else(|| state_dir.join(".backups"));
        Self::new(root, config)
    }

    fn scope_dir(&self, scope: &ConfigScope) -> PathBuf {
        self.root.join(scope.relative_dir())
    }

    fn index_path(&self, scope: &ConfigScope) -> PathBuf {
        self.scope_dir(scope).join(INDEX_FILE)
    }

    fn snapshot_path(&self, scope: &ConfigScope, id: &str) -> PathBuf {
        self.scope_dir(scope).join(SNAPSHOTS_DIR).join(id)
    }

    pub fn list(&self, scope: &ConfigScope) -> Result<Vec<BackupSnapshot>, BackupError> {
        self.load_index(scope)
    }

    fn load_index(&self, scope: &ConfigScope) -> Result<Vec<BackupSnapshot>, BackupError> {
        let path = self.index_path(scope);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(error.into()),
        }
    }

    fn save_index(
        &self,
        scope: &ConfigScope,
        index: &[BackupSnapshot],
    ) -> Result<(), BackupError> {
        let serialized = serde_json::to_vec_pretty(index)?;
        atomic_write(&self.index_path(scope), &serialized).map_err(BackupError::Other)
    }

    /// Snapshot the file at `config_path`.
    ///
    /// Joins the existing chain for that path when one exists; the patch form
    /// is chosen only when its encoding is small enough relative to the full
    /// content.
    pub fn create_snapshot(
        &self,
        scope: &ConfigScope,
        config_path: &Path,
        trigger: BackupTrigger,
        metadata: BTreeMap<String, String>,
    ) -> Result<BackupSnapshot, BackupError> {
        let content = fs::read_to_string(config_path)?;
        let checksum = sha256_hex(&content);
        let now = Utc::now();

        let _lock = FileLock::acquire(&self.index_path(scope))?;
        let mut index = self.load_index(scope)?;

        let base = index
            .iter()
            .filter(|snapshot| snapshot.config_path == config_path.to_string_lossy())
            .max_by_key(|snapshot| snapshot.timestamp)
            .cloned();

        let id = format!("{}-{}", now.format("%Y%m%d%H%M%S%3f"), &checksum[..8]);
        let (storage_type, stored_bytes, base_id, chain_id) = match &base {
            Some(base_snapshot) => {
                let base_content = self.materialize_locked(scope, &index, &base_snapshot.id)?;
                let patch = LinePatch::between(&base_content, &content);
                let threshold =
                    content.len() * usize::from(self.config.patch_threshold_percent) / 100;
                if patch.encoded_size() <= threshold {
                    (
                        StorageType::Patch,
                        serde_json::to_vec(&patch)?,
                        Some(base_snapshot.id.clone()),
                        base_snapshot.chain_id.clone(),
                    )
                } else {
                    (
                        StorageType::Full,
                        content.clone().into_bytes(),
                        None,
                        base_snapshot.chain_id.clone(),
                    )
                }
            }
            None => (
                StorageType::Full,
                content.clone().into_bytes(),
                None,
                id.clone(),
            ),
        };

        let snapshot_path = self.snapshot_path(scope, &id);
        atomic_write(&snapshot_path, &stored_bytes).map_err(BackupError::Other)?;

        let snapshot = BackupSnapshot {
            id: id.clone(),
            chain_id,
            config_type: scope.kind(),
            config_path: config_path.to_string_lossy().into_owned(),
            storage_type,
            base_id,
            size: content.len() as u64,
            checksum,
            timestamp: now,
            trigger,
            metadata,
        };

        index.push(snapshot.clone());
        self.save_index(scope, &index)?;

        info!(id = %snapshot.id, storage = ?snapshot.storage_type, "created backup snapshot");
        Ok(snapshot)
    }

    /// Rebuild the original content of a snapshot and verify its checksum.
    pub fn materialize(&self, scope: &ConfigScope, id: &str) -> Result<String, BackupError> {
        let index = self.load_index(scope)?;
        self.materialize_locked(scope, &index, id)
    }

    fn materialize_locked(
        &self,
        scope: &ConfigScope,
        index: &[BackupSnapshot],
        id: &str,
    ) -> Result<String, BackupError> {
        let snapshot = index
            .iter()
            .find(|snapshot| snapshot.id == id)
            .ok_or_else(|| BackupError::MissingSnapshot { id: id.to_string() })?;

        let stored = fs::read_to_string(self.snapshot_path(scope, id))?;
        let content = match snapshot.storage_type {
            StorageType::Full => stored,
            StorageType::Patch => {
                let base_id = snapshot.base_id.as_deref().ok_or_else(|| {
                    BackupError::MissingSnapshot {
                        id: format!("{id} (dangling patch base)"),
                    }
                })?;
                let base = self.materialize_locked(scope, index, base_id)?;
                let patch: LinePatch = serde_json::from_str(&stored)?;
                patch.apply(&base).map_err(|source| BackupError::PatchApply {
                    id: id.to_string(),
                    source,
                })?
            }
        };

        if sha256_hex(&content) != snapshot.checksum {
            return Err(BackupError::ChecksumMismatch { id: id.to_string() });
        }
        Ok(content)
    }

    /// Restore a snapshot over `target`.
    ///
    /// Verification happens before anything touches the target; on any error
    /// the target is left exactly as it was.
    pub fn restore(
        &self,
        scope: &ConfigScope,
        id: &str,
        target: &Path,
    ) -> Result<(), BackupError> {
        let content = self.materialize(scope, id)?;

        if self.config.backup_before_restore() && target.exists() {
            let mut metadata = BTreeMap::new();
            metadata.insert("restoring".to_string(), id.to_string());
            self.create_snapshot(scope, target, BackupTrigger::BeforeRestore, metadata)?;
        }

        atomic_write(target, content.as_bytes()).map_err(BackupError::Other)?;
        info!(%id, target = %target.display(), "restored snapshot");
        Ok(())
    }

    fn dependents_of(index: &[BackupSnapshot], id: &str) -> Vec<String> {
        index
            .iter()
            .filter(|snapshot| snapshot.base_id.as_deref() == Some(id))
            .map(|snapshot| snapshot.id.clone())
            .collect()
    }

    /// Delete a snapshot, refusing when patches still depend on it.
    pub fn delete(&self, scope: &ConfigScope, id: &str) -> Result<(), BackupError> {
        let _lock = FileLock::acquire(&self.index_path(scope))?;
        let mut index = self.load_index(scope)?;

        let dependents = Self::dependents_of(&index, id);
        if !dependents.is_empty() {
            return Err(BackupError::ChainConflict {
                id: id.to_string(),
                dependents,
            });
        }

        self.remove_unlocked(scope, &mut index, id)?;
        self.save_index(scope, &index)
    }

    /// Delete a snapshot after converting its direct dependents to full
    /// snapshots, keeping every chain reachable.
    pub fn delete_repointing(&self, scope: &ConfigScope, id: &str) -> Result<(), BackupError> {
        let _lock = FileLock::acquire(&self.index_path(scope))?;
        let mut index = self.load_index(scope)?;

        for dependent_id in Self::dependents_of(&index, id) {
            let content = self.materialize_locked(scope, &index, &dependent_id)?;
            atomic_write(
                &self.snapshot_path(scope, &dependent_id),
                content.as_bytes(),
            )
            .map_err(BackupError::Other)?;
            if let Some(dependent) = index
                .iter_mut()
                .find(|snapshot| snapshot.id == dependent_id)
            {
                dependent.storage_type = StorageType::Full;
                dependent.base_id = None;
            }
            debug!(id = %dependent_id, "rematerialized dependent as full snapshot");
        }

        self.remove_unlocked(scope, &mut index, id)?;
        self.save_index(scope, &index)
    }

    fn remove_unlocked(
        &self,
        scope: &ConfigScope,
        index: &mut Vec<BackupSnapshot>,
        id: &str,
    ) -> Result<(), BackupError> {
        let position = index
            .iter()
            .position(|snapshot| snapshot.id == id)
            .ok_or_else(|| BackupError::MissingSnapshot { id: id.to_string() })?;
        index.remove(position);

        let path = self.snapshot_path(scope, id);
        if let Err(error) = fs::remove_file(&path) {
            warn!(path = %path.display(), %error, "failed to remove snapshot content");
        }
        Ok(())
    }

    /// Apply the composite retention policy. A snapshot survives only if
    /// every sub-policy (count, age, total size) retains it. Returns the ids
    /// that were deleted.
    pub fn apply_retention(
        &self,
        scope: &ConfigScope,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, BackupError> {
        let index = self.load_index(scope)?;
        let mut ordered: Vec<&BackupSnapshot> = index.iter().collect();
        ordered.sort_by_key(|snapshot| std::cmp::Reverse(snapshot.timestamp));

        let max_age = Duration::days(i64::from(self.config.max_age_days));
        let max_total = self.config.max_total_size_mb * 1024 * 1024;

        let mut cumulative: u64 = 0;
        let mut doomed = Vec::new();
        for (position, snapshot) in ordered.iter().enumerate() {
            cumulative += snapshot.size;
            let by_count = position < self.config.max_count;
            let by_age = now - snapshot.timestamp <= max_age;
            let by_size = cumulative <= max_total;
            if !(by_count && by_age && by_size) {
                doomed.push(snapshot.id.clone());
            }
        }

        // Oldest first, so bases lose their dependents before deletion.
        for id in doomed.iter().rev() {
            self.delete_repointing(scope, id)?;
        }
        Ok(doomed)
    }

    /// First-run migration: snapshot a pre-existing config once, then leave
    /// the marker so the trigger never fires again.
    pub fn ensure_migrated(&self, existing_config: &Path) -> Result<bool, BackupError> {
        let marker = self.root.join(MIGRATION_MARKER);
        if marker.exists() {
            return Ok(false);
        }
        if existing_config.exists() {
            self.create_snapshot(
                &ConfigScope::Global,
                existing_config,
                BackupTrigger::Migration,
                BTreeMap::new(),
            )?;
        }
        atomic_write(&marker, b"").map_err(BackupError::Other)?;
        Ok(true)
    }
}

fn sha256_hex(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> BackupStore {
        BackupStore::new(dir.join("backups"), BackupConfig::default())
    }

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn snap(store: &BackupStore, path: &Path) -> BackupSnapshot {
        store
            .create_snapshot(
                &ConfigScope::Global,
                path,
                BackupTrigger::Automatic,
                BTreeMap::new(),
            )
            .unwrap()
    }

    #[test]
    fn first_snapshot_is_full_and_starts_a_chain() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let path = write_config(dir.path(), "[global]\nversion = 1\n");

        let snapshot = snap(&store, &path);
        assert_eq!(snapshot.storage_type, StorageType::Full);
        assert_eq!(snapshot.chain_id, snapshot.id);
        assert!(snapshot.base_id.is_none());
    }

    #[test]
    fn small_edit_is_stored_as_patch_and_round_trips() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        // Enough content that the patch encoding beats the full copy.
        let body: String = (0..60).map(|i| format!("key_{i} = {i}\n")).collect();
        let path = write_config(dir.path(), &format!("[global]\n{body}"));

        let first = snap(&store, &path);
        let edited = format!("[global]\n{body}extra = true\n");
        fs::write(&path, &edited).unwrap();
        let second = snap(&store, &path);

        assert_eq!(second.storage_type, StorageType::Patch);
        assert_eq!(second.base_id.as_deref(), Some(first.id.as_str()));
        assert_eq!(second.chain_id, first.chain_id);
        assert_eq!(
            store.materialize(&ConfigScope::Global, &second.id).unwrap(),
            edited
        );
    }

    #[test]
    fn rewrite_falls_back_to_full_storage() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let path = write_config(dir.path(), "alpha = 1\n");

        snap(&store, &path);
        fs::write(&path, "completely = \"different\"\ncontent = true\n").unwrap();
        let second = snap(&store, &path);

        assert_eq!(second.storage_type, StorageType::Full);
    }

    #[test]
    fn deleting_a_base_with_dependents_is_a_conflict() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let body: String = (0..60).map(|i| format!("key_{i} = {i}\n")).collect();
        let path = write_config(dir.path(), &body);

        let base = snap(&store, &path);
        fs::write(&path, format!("{body}more = 1\n")).unwrap();
        let dependent = snap(&store, &path);
        assert_eq!(dependent.storage_type, StorageType::Patch);

        let error = store.delete(&ConfigScope::Global, &base.id).unwrap_err();
        assert!(matches!(error, BackupError::ChainConflict { .. }));
    }

    #[test]
    fn repointing_delete_keeps_dependents_reachable() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let body: String = (0..60).map(|i| format!("key_{i} = {i}\n")).collect();
        let path = write_config(dir.path(), &body);

        let base = snap(&store, &path);
        let edited = format!("{body}more = 1\n");
        fs::write(&path, &edited).unwrap();
        let dependent = snap(&store, &path);

        store
            .delete_repointing(&ConfigScope::Global, &base.id)
            .unwrap();

        let index = store.list(&ConfigScope::Global).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[0].storage_type, StorageType::Full);
        assert_eq!(
            store
                .materialize(&ConfigScope::Global, &dependent.id)
                .unwrap(),
            edited
        );
    }

    #[test]
    fn corrupted_content_is_a_checksum_mismatch() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let path = write_config(dir.path(), "honest = true\n");

        let snapshot = snap(&store, &path);
        let stored = dir
            .path()
            .join("backups/global/snapshots")
            .join(&snapshot.id);
        fs::write(&stored, "tampered = true\n").unwrap();

        let error = store
            .materialize(&ConfigScope::Global, &snapshot.id)
            .unwrap_err();
        assert!(matches!(error, BackupError::ChecksumMismatch { .. }));
    }

    #[test]
    fn restore_writes_the_original_bytes() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let path = write_config(dir.path(), "original = 1\n");

        let snapshot = snap(&store, &path);
        fs::write(&path, "clobbered = true\n").unwrap();

        store
            .restore(&ConfigScope::Global, &snapshot.id, &path)
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "original = 1\n");

        // The pre-restore safety snapshot was taken.
        let triggers: Vec<BackupTrigger> = store
            .list(&ConfigScope::Global)
            .unwrap()
            .into_iter()
            .map(|snapshot| snapshot.trigger)
            .collect();
        assert!(triggers.contains(&BackupTrigger::BeforeRestore));
    }

    #[test]
    fn retention_is_the_intersection_of_sub_policies() {
        let dir = tempdir().unwrap();
        let config = BackupConfig {
            max_count: 2,
            ..Default::default()
        };
        let store = BackupStore::new(dir.path().join("backups"), config);
        let path = write_config(dir.path(), "v = 0\n");

        for version in 1..=4 {
            fs::write(&path, format!("v = {version}\n")).unwrap();
            snap(&store, &path);
        }

        let deleted = store
            .apply_retention(&ConfigScope::Global, Utc::now())
            .unwrap();
        assert_eq!(deleted.len(), 2);
        assert_eq!(store.list(&ConfigScope::Global).unwrap().len(), 2);

        // Survivors still materialize cleanly.
        for snapshot in store.list(&ConfigScope::Global).unwrap() {
            store
                .materialize(&ConfigScope::Global, &snapshot.id)
                .unwrap();
        }
    }

    #[test]
    fn migration_runs_once() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let path = write_config(dir.path(), "legacy = true\n");

        assert!(store.ensure_migrated(&path).unwrap());
        assert!(!store.ensure_migrated(&path).unwrap());

        let snapshots = store.list(&ConfigScope::Global).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].trigger, BackupTrigger::Migration);
    }

    #[test]
    fn project_scope_paths_are_sanitized() {
        assert_eq!(
            sanitize_project_path("/home/dev/my.project"),
            "home_dev_my_project"
        );
    }
}
