//! The shipped validator set.

pub mod git;
pub mod markdown;
pub mod secrets;
pub mod shell;

use std::sync::Arc;

use klaudiush_config::KlaudiushConfig;

use super::predicate::Predicate;
use super::registry::Registry;
use crate::hook::context::{HookEvent, ToolKind};
pub use git::{GitCommitValidator, GitPushValidator, parse_push_target};
pub use markdown::MarkdownValidator;
pub use secrets::SecretsValidator;
pub use shell::ShellValidator;

/// Register every enabled builtin with its routing predicate.
pub fn register_builtins(registry: &mut Registry, config: &KlaudiushConfig) {
    let validators = &config.validators;
    let pre_bash = Predicate::event_is(HookEvent::PreToolUse).and(Predicate::tool_is(ToolKind::Bash));
    let pre_write = Predicate::event_is(HookEvent::PreToolUse).and(Predicate::tool_in(vec![
        ToolKind::Write,
        ToolKind::Edit,
        ToolKind::MultiEdit,
    ]));

    if validators.git.enabled() && validators.git.commit.enabled() {
        registry.register(
            pre_bash.clone().and(Predicate::command_contains("git")),
            Arc::new(GitCommitValidator::new(validators.git.commit.clone())),
        );
    }

    if validators.git.enabled() && validators.git.push.enabled() {
        registry.register(
            pre_bash.clone().and(Predicate::command_contains("git")),
            Arc::new(GitPushValidator::new(validators.git.push.clone())),
        );
    }

    if validators.shell.enabled() {
        registry.register(
            pre_bash,
            Arc::new(ShellValidator::new(validators.shell.clone())),
        );
    }

    if validators.secrets.enabled() {
        registry.register(
            pre_write.clone(),
            Arc::new(SecretsValidator::new(validators.secrets.clone())),
        );
    }

    if validators.file.markdown.enabled() {
        registry.register(
            pre_write.and(Predicate::file_extension_is("md")),
            Arc::new(MarkdownValidator::new(validators.file.markdown.clone())),
        );
    }
}
