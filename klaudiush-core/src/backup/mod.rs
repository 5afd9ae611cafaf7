//! Config backup store: snapshots, chains, retention.

pub mod config_io;
pub mod patch;
pub mod snapshot;
pub mod store;

pub use config_io::save_config_with_backup;
pub use patch::{LinePatch, PatchError, PatchOp};
pub use snapshot::{BackupSnapshot, BackupTrigger, ConfigScopeKind, StorageType};
pub use store::{BackupError, BackupStore, ConfigScope, MIGRATION_MARKER, sanitize_project_path};
