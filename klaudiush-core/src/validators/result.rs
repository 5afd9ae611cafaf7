//! The outcome of one validator invocation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::reference::{Reference, fix_hint_for};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// When true, all other fields are ignored by aggregation.
    pub passed: bool,

    /// Name of the validator that produced this result. Stamped by the
    /// dispatcher; rule-injected results carry the rule engine's name.
    #[serde(default)]
    pub validator: String,

    pub message: String,

    /// Free-form key/value details shown to humans.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,

    pub should_block: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<Reference>,

    /// Auto-populated from the static registry keyed by reference code.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fix_hint: String,
}

impl ValidationResult {
    pub fn pass() -> Self {
        Self {
            passed: true,
            validator: String::new(),
            message: String::new(),
            details: BTreeMap::new(),
            should_block: false,
            reference: None,
            fix_hint: String::new(),
        }
    }

    pub fn pass_with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::pass()
        }
    }

    /// A blocking failure carrying a stable reference code.
    pub fn block(code: &str, message: impl Into<String>) -> Self {
        let reference = Reference::new(code);
        Self {
            passed: false,
            validator: String::new(),
            message: message.into(),
            details: BTreeMap::new(),
            should_block: true,
            fix_hint: fix_hint_for(code).to_string(),
            reference: Some(reference),
        }
    }

    /// A non-blocking failure (surfaced under "Warnings").
    pub fn warn(code: &str, message: impl Into<String>) -> Self {
        Self {
            should_block: false,
            ..Self::block(code, message)
        }
    }

    /// A warning with no reference code (synthetic dispatcher results).
    pub fn warn_uncoded(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            validator: String::new(),
            message: message.into(),
            details: BTreeMap::new(),
            should_block: false,
            reference: None,
            fix_hint: String::new(),
        }
    }

    pub fn with_validator(mut self, name: impl Into<String>) -> Self {
        self.validator = name.into();
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Severity-aware constructor: `error` blocks, `warning` does not.
    pub fn fail_with_severity(code: &str, severity: &str, message: impl Into<String>) -> Self {
        if severity.eq_ignore_ascii_case("warning") {
            Self::warn(code, message)
        } else {
            Self::block(code, message)
        }
    }

    pub fn code(&self) -> Option<&str> {
        self.reference.as_ref().map(Reference::code)
    }
}

/// Aggregate decision helper: any blocking result denies the action.
pub fn should_block(results: &[ValidationResult]) -> bool {
    results.iter().any(|result| !result.passed && result.should_block)
}
