//! Stage A: declarative rules over validator results.

use klaudiush_config::{RuleActionKind, RuleConfig, RuleMatch, RulesConfig};
use tracing::debug;

use crate::hook::context::HookContext;
use crate::validators::builtin::parse_push_target;
use crate::validators::result::ValidationResult;

/// Name stamped on results the rule engine injects.
const RULE_VALIDATOR: &str = "rules";
const DEFAULT_RULE_CODE: &str = "RULE001";

pub struct RuleEngine {
    config: RulesConfig,
}

impl RuleEngine {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    /// Apply the first matching enabled rule, highest priority first; ties
    /// break by load order (global before project).
    pub fn evaluate(
        &self,
        context: &HookContext,
        results: Vec<ValidationResult>,
    ) -> Vec<ValidationResult> {
        if !self.config.enabled() {
            return results;
        }

        let mut order: Vec<usize> = (0..self.config.rules.len())
            .filter(|&index| self.config.rules[index].enabled())
            .collect();
        order.sort_by_key(|&index| (-self.config.rules[index].priority, index));

        for index in order {
            let rule = &self.config.rules[index];
            if !rule_matches(&rule.match_conditions, context, &results) {
                continue;
            }
            debug!(rule = rule.name.as_deref().unwrap_or("<unnamed>"), "rule matched");
            return self.apply(rule, results);
        }

        results
    }

    fn apply(&self, rule: &RuleConfig, mut results: Vec<ValidationResult>) -> Vec<ValidationResult> {
        let kind = rule
            .action
            .as_ref()
            .map(|action| action.kind)
            .unwrap_or(RuleActionKind::Block);
        let message = rule
            .action
            .as_ref()
            .and_then(|action| action.message.clone())
            .unwrap_or_else(|| default_message(rule, kind));
        let code = rule
            .action
            .as_ref()
            .and_then(|action| action.reference.as_deref())
            .unwrap_or(DEFAULT_RULE_CODE);

        match kind {
            RuleActionKind::Allow => {
                if self.config.stop_on_first_match() {
                    // The whole result list collapses to one passing entry.
                    // Observable consequence: no exception gate, no audit row.
                    vec![
                        ValidationResult::pass_with_message(message)
                            .with_validator(RULE_VALIDATOR),
                    ]
                } else {
                    let target = rule.match_conditions.validator_type.as_deref();
                    for result in &mut results {
                        let matches = target
                            .map(|pattern| glob_matches(pattern, &result.validator))
                            .unwrap_or(true);
                        if matches {
                            result.passed = true;
                            result.should_block = false;
                        }
                    }
                    results
                }
            }
            RuleActionKind::Block => {
                results.push(
                    ValidationResult::block(code, message).with_validator(RULE_VALIDATOR),
                );
                results
            }
            RuleActionKind::Warn => {
                results.push(
                    ValidationResult::warn(code, message).with_validator(RULE_VALIDATOR),
                );
                results
            }
        }
    }
}

fn default_message(rule: &RuleConfig, kind: RuleActionKind) -> String {
    let name = rule.name.as_deref().unwrap_or("<unnamed>");
    match kind {
        RuleActionKind::Allow => format!("allowed by rule {name}"),
        RuleActionKind::Block => format!("blocked by rule {name}"),
        RuleActionKind::Warn => format!("flagged by rule {name}"),
    }
}

/// AND semantics: every populated condition must match.
fn rule_matches(
    conditions: &RuleMatch,
    context: &HookContext,
    results: &[ValidationResult],
) -> bool {
    if let Some(pattern) = &conditions.validator_type {
        let any = results
            .iter()
            .any(|result| glob_matches(pattern, &result.validator));
        if !any {
            return false;
        }
    }
    if let Some(pattern) = &conditions.repo_pattern {
        if !glob_matches(pattern, &context.cwd) {
            return false;
        }
    }
    let push_target = parse_push_target(context.command());
    if let Some(remote) = &conditions.remote {
        let matches = push_target
            .as_ref()
            .is_some_and(|(actual, _)| glob_matches(remote, actual));
        if !matches {
            return false;
        }
    }
    if let Some(pattern) = &conditions.branch_pattern {
        let matches = push_target
            .as_ref()
            .is_some_and(|(_, branch)| glob_matches(pattern, branch));
        if !matches {
            return false;
        }
    }
    if let Some(pattern) = &conditions.file_pattern {
        if !glob_matches(pattern, context.file_path()) {
            return false;
        }
    }
    if let Some(pattern) = &conditions.content_pattern {
        if !glob_matches(pattern, &context.content()) {
            return false;
        }
    }
    if let Some(pattern) = &conditions.command_pattern {
        if !glob_matches(pattern, context.command()) {
            return false;
        }
    }
    if let Some(tool) = &conditions.tool_type {
        let matches = context
            .tool
            .is_some_and(|actual| actual.to_string().eq_ignore_ascii_case(tool));
        if !matches {
            return false;
        }
    }
    if let Some(event) = &conditions.event_type {
        if !context.event.to_string().eq_ignore_ascii_case(event) {
            return false;
        }
    }
    true
}

fn glob_matches(pattern: &str, value: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|glob| glob.matches(value))
        .unwrap_or_else(|_| pattern == value)
}
