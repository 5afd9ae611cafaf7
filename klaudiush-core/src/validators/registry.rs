//! The validator registry: ordered `(predicate, validator)` entries.

use std::sync::Arc;

use klaudiush_config::KlaudiushConfig;

use super::builtin;
use super::predicate::Predicate;
use super::{CostCategory, Validator};
use crate::hook::context::HookContext;

pub struct RegistryEntry {
    pub predicate: Predicate,
    pub validator: Arc<dyn Validator>,
}

/// Built once per invocation, read-only during dispatch.
#[derive(Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire up the shipped validator set from configuration.
    pub fn from_config(config: &KlaudiushConfig) -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry, config);
        registry
    }

    pub fn register(&mut self, predicate: Predicate, validator: Arc<dyn Validator>) {
        self.entries.push(RegistryEntry {
            predicate,
            validator,
        });
    }

    /// Every validator whose predicate holds, in insertion order.
    pub fn applicable(&self, context: &HookContext) -> Vec<Arc<dyn Validator>> {
        self.entries
            .iter()
            .filter(|entry| entry.predicate.matches(context))
            .map(|entry| Arc::clone(&entry.validator))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names and cost categories, for diagnostics.
    pub fn describe(&self) -> Vec<(String, CostCategory)> {
        self.entries
            .iter()
            .map(|entry| {
                (
                    entry.validator.name().to_string(),
                    entry.validator.cost(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::context::{HookEvent, ToolInput, ToolKind};
    use crate::validators::result::ValidationResult;
    use async_trait::async_trait;

    struct NamedPass(&'static str);

    #[async_trait]
    impl Validator for NamedPass {
        fn name(&self) -> &str {
            self.0
        }

        async fn validate(&self, _context: &HookContext) -> ValidationResult {
            ValidationResult::pass()
        }
    }

    fn bash_context(command: &str) -> HookContext {
        HookContext {
            event: HookEvent::PreToolUse,
            tool: Some(ToolKind::Bash),
            input: ToolInput::Bash {
                command: command.to_string(),
                description: String::new(),
            },
            session_id: String::new(),
            cwd: String::new(),
            transcript_path: String::new(),
        }
    }

    #[test]
    fn applicable_preserves_insertion_order() {
        let mut registry = Registry::new();
        registry.register(
            Predicate::command_contains("git"),
            Arc::new(NamedPass("second")),
        );
        registry.register(
            Predicate::command_contains("commit"),
            Arc::new(NamedPass("third")),
        );
        registry.register(
            Predicate::tool_is(ToolKind::Write),
            Arc::new(NamedPass("never")),
        );

        let applicable = registry.applicable(&bash_context("git commit -s"));
        let names: Vec<&str> = applicable.iter().map(|v| v.name()).collect();
        assert_eq!(names, vec!["second", "third"]);
    }

    #[test]
    fn builtin_registry_covers_the_shipped_set() {
        let registry = Registry::from_config(&KlaudiushConfig::default());
        let names: Vec<String> = registry
            .describe()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        for expected in [
            "git.commit",
            "git.push",
            "shell.dangerous",
            "file.secrets",
            "file.markdown",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }
}
