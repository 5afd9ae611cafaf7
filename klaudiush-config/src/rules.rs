//! `[rules]` section: declarative match -> action transforms.
//!
//! Rule arrays merge by name across configuration layers (a project rule
//! replaces the same-named global rule); the loader handles that separately
//! from the generic deep-merge, see `loader::merge`.

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

const VALID_TOOL_TYPES: &[&str] = &[
    "bash", "write", "edit", "multiedit", "read", "glob", "grep",
];

const VALID_EVENT_TYPES: &[&str] = &[
    "pretooluse",
    "posttooluse",
    "notification",
    "stop",
    "subagentstop",
    "sessionstart",
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RulesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// When true (the default), an `allow` rule replaces the entire result
    /// list on first match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_on_first_match: Option<bool>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            stop_on_first_match: None,
            rules: Vec::new(),
        }
    }
}

impl RulesConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn stop_on_first_match(&self) -> bool {
        self.stop_on_first_match.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<()> {
        for (index, rule) in self.rules.iter().enumerate() {
            rule.validate().with_context(|| {
                format!(
                    "invalid rule {} (rules.rules[{index}])",
                    rule.name.as_deref().unwrap_or("<unnamed>")
                )
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Unique per config file; same-named rules override across layers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, rename = "match")]
    pub match_conditions: RuleMatch,

    /// Absent action defaults to `block`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
}

impl RuleConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.match_conditions.is_empty(),
            "rule has an empty match section; at least one condition is required"
        );
        if let Some(tool) = &self.match_conditions.tool_type {
            ensure!(
                VALID_TOOL_TYPES.contains(&tool.to_ascii_lowercase().as_str()),
                "unknown tool_type \"{tool}\""
            );
        }
        if let Some(event) = &self.match_conditions.event_type {
            ensure!(
                VALID_EVENT_TYPES.contains(&event.to_ascii_lowercase().as_str()),
                "unknown event_type \"{event}\""
            );
        }
        if let Some(action) = &self.action {
            action.validate()?;
        }
        Ok(())
    }
}

/// Glob conditions, AND-composed. All populated fields must match.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuleMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl RuleMatch {
    pub fn is_empty(&self) -> bool {
        self.validator_type.is_none()
            && self.repo_pattern.is_none()
            && self.remote.is_none()
            && self.branch_pattern.is_none()
            && self.file_pattern.is_none()
            && self.content_pattern.is_none()
            && self.command_pattern.is_none()
            && self.tool_type.is_none()
            && self.event_type.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: RuleActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl RuleAction {
    pub fn validate(&self) -> Result<()> {
        if let Some(reference) = &self.reference {
            ensure!(
                !reference.trim().is_empty(),
                "rule action reference must not be empty"
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleActionKind {
    Allow,
    Block,
    Warn,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_match_is_a_load_error() {
        let config: RulesConfig = toml::from_str(
            r#"
            [[rules]]
            name = "no-conditions"
            "#,
        )
        .expect("parse");
        let error = config.validate().expect_err("must reject empty match");
        assert!(error.to_string().contains("no-conditions"));
    }

    #[test]
    fn action_kind_outside_enum_fails_to_parse() {
        let parsed: Result<RulesConfig, _> = toml::from_str(
            r#"
            [[rules]]
            name = "bad-action"
            match = { remote = "origin" }
            action = { type = "escalate" }
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn tool_type_is_case_insensitive() {
        let config: RulesConfig = toml::from_str(
            r#"
            [[rules]]
            name = "by-tool"
            match = { tool_type = "Bash" }
            action = { type = "warn" }
            "#,
        )
        .expect("parse");
        config.validate().expect("Bash is a valid tool type");
    }
}
