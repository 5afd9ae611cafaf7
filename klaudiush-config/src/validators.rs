//! `[validators.*]` sections.
//!
//! Every leaf whose zero value is meaningful is an `Option` so the layered
//! loader can tell "explicitly false" apart from "absent, inherit default".
//! Accessor methods resolve the tri-state to an effective value.

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::defaults;

fn validate_severity(section: &str, severity: &str) -> Result<()> {
    ensure!(
        matches!(severity, "error" | "warning"),
        "{section}.severity must be \"error\" or \"warning\", got \"{severity}\""
    );
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ValidatorsConfig {
    #[serde(default)]
    pub git: GitValidatorConfig,
    #[serde(default)]
    pub file: FileValidatorsConfig,
    #[serde(default)]
    pub shell: ShellValidatorConfig,
    #[serde(default)]
    pub secrets: SecretsValidatorConfig,
}

impl ValidatorsConfig {
    pub fn validate(&self) -> Result<()> {
        self.git.validate()?;
        self.file.validate()?;
        self.shell.validate()?;
        self.secrets.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GitValidatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub commit: GitCommitConfig,
    #[serde(default)]
    pub push: GitPushConfig,
}

impl GitValidatorConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<()> {
        validate_severity("validators.git.commit", &self.commit.severity)?;
        validate_severity("validators.git.push", &self.push.severity)?;
        ensure!(
            !self.commit.required_flags.iter().any(|f| f.trim().is_empty()),
            "validators.git.commit.required_flags must not contain empty entries"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitCommitConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Sign-off flags, at least one of which must be present on `git commit`.
    #[serde(default = "defaults::git::required_flags")]
    pub required_flags: Vec<String>,

    /// Block commits that carry `--no-verify`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forbid_no_verify: Option<bool>,

    #[serde(default = "defaults::git::severity")]
    pub severity: String,
}

impl Default for GitCommitConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            required_flags: defaults::git::required_flags(),
            forbid_no_verify: None,
            severity: defaults::git::severity(),
        }
    }
}

impl GitCommitConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn forbid_no_verify(&self) -> bool {
        self.forbid_no_verify.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GitPushConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Remotes on which protected-branch pushes are blocked.
    #[serde(default = "defaults::git::protected_remotes")]
    pub protected_remotes: Vec<String>,

    /// Branch names (globs) that must not be pushed to directly.
    #[serde(default = "defaults::git::protected_branches")]
    pub protected_branches: Vec<String>,

    #[serde(default = "defaults::git::severity")]
    pub severity: String,
}

impl Default for GitPushConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            protected_remotes: defaults::git::protected_remotes(),
            protected_branches: defaults::git::protected_branches(),
            severity: defaults::git::severity(),
        }
    }
}

impl GitPushConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileValidatorsConfig {
    #[serde(default)]
    pub markdown: MarkdownConfig,
}

impl FileValidatorsConfig {
    pub fn validate(&self) -> Result<()> {
        validate_severity("validators.file.markdown", &self.markdown.severity)?;
        ensure!(
            self.markdown.max_title_length > 0,
            "validators.file.markdown.max_title_length must be positive"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarkdownConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Shell out to markdownlint when it is on PATH instead of the builtin
    /// checks. Falls back to the builtin checks when the binary is missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_markdownlint: Option<bool>,

    /// Require a blank line before every heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_spacing: Option<bool>,

    #[serde(default = "defaults::markdown::max_title_length")]
    pub max_title_length: usize,

    #[serde(default = "defaults::markdown::severity")]
    pub severity: String,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            use_markdownlint: None,
            heading_spacing: None,
            max_title_length: defaults::markdown::max_title_length(),
            severity: defaults::markdown::severity(),
        }
    }
}

impl MarkdownConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn use_markdownlint(&self) -> bool {
        self.use_markdownlint.unwrap_or(false)
    }

    pub fn heading_spacing(&self) -> bool {
        self.heading_spacing.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShellValidatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Extra command substrings to block, on top of the builtin set.
    #[serde(default)]
    pub deny_patterns: Vec<String>,

    #[serde(default = "defaults::shell::severity")]
    pub severity: String,
}

impl Default for ShellValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            deny_patterns: Vec::new(),
            severity: defaults::shell::severity(),
        }
    }
}

impl ShellValidatorConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<()> {
        validate_severity("validators.shell", &self.severity)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecretsValidatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Extra secret regexes, on top of the builtin set.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Lines of surrounding context included in the finding details.
    #[serde(default = "defaults::secrets::context_lines")]
    pub context_lines: i64,

    #[serde(default = "defaults::secrets::severity")]
    pub severity: String,
}

impl Default for SecretsValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            patterns: Vec::new(),
            context_lines: defaults::secrets::context_lines(),
            severity: defaults::secrets::severity(),
        }
    }
}

impl SecretsValidatorConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<()> {
        validate_severity("validators.secrets", &self.severity)?;
        ensure!(
            self.context_lines >= 0,
            "validators.secrets.context_lines must be non-negative"
        );
        Ok(())
    }
}
