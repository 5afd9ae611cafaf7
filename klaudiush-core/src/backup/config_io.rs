//! Config write-back with an automatic pre-write snapshot.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use klaudiush_config::{KlaudiushConfig, save_config_to_path};
use tracing::warn;

use super::snapshot::BackupTrigger;
use super::store::{BackupStore, ConfigScope};

/// Persist a configuration, snapshotting the previous on-disk version first
/// when backups are enabled. A backup failure is logged and does not block
/// the write.
pub fn save_config_with_backup(
    config: &KlaudiushConfig,
    path: &Path,
    store: &BackupStore,
    scope: &ConfigScope,
) -> Result<()> {
    if config.backup.enabled() && path.exists() {
        if let Err(error) =
            store.create_snapshot(scope, path, BackupTrigger::Automatic, BTreeMap::new())
        {
            warn!(path = %path.display(), %error, "pre-write backup failed; writing anyway");
        }
    }

    save_config_to_path(path, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use klaudiush_config::BackupConfig;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn write_takes_a_snapshot_of_the_previous_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[global]\nhook_budget_secs = 4\n").unwrap();

        let store = BackupStore::new(dir.path().join("backups"), BackupConfig::default());
        let mut config = KlaudiushConfig::default();
        config.global.hook_budget_secs = 9;

        save_config_with_backup(&config, &path, &store, &ConfigScope::Global).unwrap();

        let snapshots = store.list(&ConfigScope::Global).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].trigger, BackupTrigger::Automatic);

        // The previous version is recoverable.
        let original = store
            .materialize(&ConfigScope::Global, &snapshots[0].id)
            .unwrap();
        assert!(original.contains("hook_budget_secs = 4"));
        assert!(
            fs::read_to_string(&path)
                .unwrap()
                .contains("hook_budget_secs = 9")
        );
    }

    #[test]
    fn first_write_has_nothing_to_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let store = BackupStore::new(dir.path().join("backups"), BackupConfig::default());

        save_config_with_backup(
            &KlaudiushConfig::default(),
            &path,
            &store,
            &ConfigScope::Global,
        )
        .unwrap();

        assert!(path.exists());
        assert!(store.list(&ConfigScope::Global).unwrap().is_empty());
    }

    #[test]
    fn disabled_backup_skips_the_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[global]\n").unwrap();

        let store = BackupStore::new(dir.path().join("backups"), BackupConfig::default());
        let mut config = KlaudiushConfig::default();
        config.backup.enabled = Some(false);

        save_config_with_backup(&config, &path, &store, &ConfigScope::Global).unwrap();
        assert!(store.list(&ConfigScope::Global).unwrap().is_empty());
    }
}
