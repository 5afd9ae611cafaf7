//! `[exceptions]` section: conscious, audited, rate-limited bypasses.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::defaults;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExceptionsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Token prefix scanned for in commands and content, e.g. `EXC` in
    /// `EXC-GIT022-org-policy`.
    #[serde(default = "defaults::exceptions::token_prefix")]
    pub token_prefix: String,

    /// Per-error-code bypass policies, keyed by code.
    #[serde(default)]
    pub policies: BTreeMap<String, ExceptionPolicy>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for ExceptionsConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            token_prefix: defaults::exceptions::token_prefix(),
            policies: BTreeMap::new(),
            rate_limit: RateLimitConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl ExceptionsConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.token_prefix.trim().is_empty(),
            "exceptions.token_prefix must not be empty"
        );
        for (code, policy) in &self.policies {
            policy.validate(code)?;
        }
        ensure!(
            self.audit.max_size_mb > 0,
            "exceptions.audit.max_size_mb must be positive"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExceptionPolicy {
    #[serde(default)]
    pub allow_exception: bool,

    #[serde(default)]
    pub require_reason: bool,

    #[serde(default = "defaults::exceptions::min_reason_length")]
    pub min_reason_length: usize,

    /// Canonical justification keys accepted in the token.
    #[serde(default)]
    pub valid_reasons: Vec<String>,

    #[serde(default)]
    pub max_per_hour: u32,

    #[serde(default)]
    pub max_per_day: u32,
}

impl Default for ExceptionPolicy {
    fn default() -> Self {
        Self {
            allow_exception: false,
            require_reason: false,
            min_reason_length: defaults::exceptions::min_reason_length(),
            valid_reasons: Vec::new(),
            max_per_hour: 0,
            max_per_day: 0,
        }
    }
}

impl ExceptionPolicy {
    fn validate(&self, code: &str) -> Result<()> {
        ensure!(
            self.min_reason_length > 0,
            "exceptions.policies.{code}.min_reason_length must be positive"
        );
        if self.require_reason {
            ensure!(
                !self.valid_reasons.is_empty(),
                "exceptions.policies.{code} requires a reason but lists no valid_reasons"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Rate-limiter state file; default `~/.klaudiush/exception_state.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,

    #[serde(default = "defaults::rate_limit::max_global_per_hour")]
    pub max_global_per_hour: u32,

    #[serde(default = "defaults::rate_limit::max_global_per_day")]
    pub max_global_per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            state_path: None,
            max_global_per_hour: defaults::rate_limit::max_global_per_hour(),
            max_global_per_day: defaults::rate_limit::max_global_per_day(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// Audit log path; default `~/.klaudiush/exception_audit.jsonl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    #[serde(default = "defaults::audit::max_size_mb")]
    pub max_size_mb: u64,

    #[serde(default = "defaults::audit::max_backups")]
    pub max_backups: usize,

    #[serde(default = "defaults::audit::max_age_days")]
    pub max_age_days: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            max_size_mb: defaults::audit::max_size_mb(),
            max_backups: defaults::audit::max_backups(),
            max_age_days: defaults::audit::max_age_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_reason_needs_valid_reasons() {
        let mut config = ExceptionsConfig::default();
        config.policies.insert(
            "GIT022".to_string(),
            ExceptionPolicy {
                allow_exception: true,
                require_reason: true,
                ..Default::default()
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_section_validates() {
        ExceptionsConfig::default().validate().expect("valid");
    }
}
