//! Configuration types and layered loader for klaudiush.
//!
//! The tree mirrors the on-disk TOML layout: top-level sections `[global]`,
//! `[validators.*]`, `[rules]`, `[overrides]`, `[exceptions]`, `[backup]`,
//! `[crash_dump]`, `[patterns]` and `[session]`.

pub mod backup;
pub mod defaults;
pub mod exceptions;
pub mod global;
pub mod loader;
pub mod overrides;
pub mod patterns;
pub mod rules;
pub mod schema;
pub mod validators;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use backup::BackupConfig;
pub use exceptions::{AuditConfig, ExceptionPolicy, ExceptionsConfig, RateLimitConfig};
pub use global::GlobalConfig;
pub use loader::ConfigManager;
pub use loader::write::save_config_to_path;
pub use overrides::{OverrideEntry, OverridesConfig};
pub use patterns::{CrashDumpConfig, PatternsConfig, SessionConfig};
pub use rules::{RuleAction, RuleActionKind, RuleConfig, RuleMatch, RulesConfig};
pub use validators::{
    GitCommitConfig, GitPushConfig, GitValidatorConfig, MarkdownConfig, SecretsValidatorConfig,
    ShellValidatorConfig, ValidatorsConfig,
};

/// The effective configuration of one hook invocation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KlaudiushConfig {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub validators: ValidatorsConfig,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub overrides: OverridesConfig,

    #[serde(default)]
    pub exceptions: ExceptionsConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub crash_dump: CrashDumpConfig,

    #[serde(default)]
    pub patterns: PatternsConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

impl KlaudiushConfig {
    pub fn validate(&self) -> Result<()> {
        self.global
            .validate()
            .context("invalid [global] configuration")?;
        self.validators
            .validate()
            .context("invalid [validators] configuration")?;
        self.rules
            .validate()
            .context("invalid [rules] configuration")?;
        self.exceptions
            .validate()
            .context("invalid [exceptions] configuration")?;
        self.backup
            .validate()
            .context("invalid [backup] configuration")?;
        self.session
            .validate()
            .context("invalid [session] configuration")?;
        Ok(())
    }
}
