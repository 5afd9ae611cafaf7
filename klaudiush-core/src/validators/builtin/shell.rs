//! Destructive shell command detection.

use async_trait::async_trait;
use klaudiush_config::ShellValidatorConfig;

use crate::hook::context::HookContext;
use crate::validators::result::ValidationResult;
use crate::validators::{CostCategory, Validator};

/// Substrings that are destructive in essentially any context.
const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf ~",
    "rm -rf *",
    "rm -fr /",
    ":(){ :|:& };:",
    "mkfs.",
    "dd if=/dev/zero of=/dev/",
    "dd of=/dev/sd",
    "chmod -R 777 /",
    "> /dev/sda",
    "sudo rm -rf",
    "git push --mirror",
];

pub struct ShellValidator {
    config: ShellValidatorConfig,
}

impl ShellValidator {
    pub fn new(config: ShellValidatorConfig) -> Self {
        Self { config }
    }

    fn matched_pattern<'a>(&'a self, command: &str) -> Option<&'a str> {
        DANGEROUS_PATTERNS
            .iter()
            .copied()
            .find(|pattern| command.contains(pattern))
            .or_else(|| {
                self.config
                    .deny_patterns
                    .iter()
                    .map(String::as_str)
                    .find(|pattern| !pattern.is_empty() && command.contains(pattern))
            })
    }
}

#[async_trait]
impl Validator for ShellValidator {
    fn name(&self) -> &str {
        "shell.dangerous"
    }

    fn cost(&self) -> CostCategory {
        CostCategory::Cpu
    }

    async fn validate(&self, context: &HookContext) -> ValidationResult {
        let command = context.command();
        match self.matched_pattern(command) {
            Some(pattern) => ValidationResult::fail_with_severity(
                "SHELL001",
                &self.config.severity,
                format!("command matches destructive pattern \"{pattern}\""),
            )
            .with_detail("command", command),
            None => ValidationResult::pass(),
        }
    }
}
