//! Pure predicates selecting which validators apply to a context.
//!
//! Predicates never perform I/O and never mutate their input, so evaluating
//! the whole registry is free.

use crate::hook::context::{HookContext, HookEvent, ToolKind};

#[derive(Debug, Clone)]
pub enum Predicate {
    EventIs(HookEvent),
    ToolIs(ToolKind),
    ToolIn(Vec<ToolKind>),
    CommandContains(String),
    FileExtensionIs(String),
    FilePathContains(String),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn event_is(event: HookEvent) -> Self {
        Self::EventIs(event)
    }

    pub fn tool_is(tool: ToolKind) -> Self {
        Self::ToolIs(tool)
    }

    pub fn tool_in(tools: impl Into<Vec<ToolKind>>) -> Self {
        Self::ToolIn(tools.into())
    }

    pub fn command_contains(needle: impl Into<String>) -> Self {
        Self::CommandContains(needle.into())
    }

    /// Extension without the leading dot, e.g. `md`.
    pub fn file_extension_is(extension: impl Into<String>) -> Self {
        Self::FileExtensionIs(extension.into())
    }

    pub fn file_path_contains(needle: impl Into<String>) -> Self {
        Self::FilePathContains(needle.into())
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Self::All(mut preds) => {
                preds.push(other);
                Self::All(preds)
            }
            pred => Self::All(vec![pred, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Self::Any(mut preds) => {
                preds.push(other);
                Self::Any(preds)
            }
            pred => Self::Any(vec![pred, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(pred: Predicate) -> Self {
        Self::Not(Box::new(pred))
    }

    pub fn matches(&self, context: &HookContext) -> bool {
        match self {
            Self::EventIs(event) => context.event == *event,
            Self::ToolIs(tool) => context.tool == Some(*tool),
            Self::ToolIn(tools) => context
                .tool
                .is_some_and(|current| tools.contains(&current)),
            Self::CommandContains(needle) => context.command().contains(needle),
            Self::FileExtensionIs(extension) => context
                .file_path()
                .rsplit('.')
                .next()
                .is_some_and(|current| {
                    current.eq_ignore_ascii_case(extension)
                        && context.file_path().contains('.')
                }),
            Self::FilePathContains(needle) => context.file_path().contains(needle),
            Self::All(preds) => preds.iter().all(|pred| pred.matches(context)),
            Self::Any(preds) => preds.iter().any(|pred| pred.matches(context)),
            Self::Not(pred) => !pred.matches(context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::context::ToolInput;

    fn write_context(path: &str) -> HookContext {
        HookContext {
            event: HookEvent::PreToolUse,
            tool: Some(ToolKind::Write),
            input: ToolInput::Write {
                file_path: path.to_string(),
                content: String::new(),
            },
            session_id: String::new(),
            cwd: String::new(),
            transcript_path: String::new(),
        }
    }

    #[test]
    fn combinators_compose() {
        let pred = Predicate::event_is(HookEvent::PreToolUse)
            .and(Predicate::tool_in(vec![ToolKind::Write, ToolKind::Edit]))
            .and(Predicate::file_extension_is("md"));

        assert!(pred.matches(&write_context("README.md")));
        assert!(!pred.matches(&write_context("README.rs")));
    }

    #[test]
    fn extension_requires_a_dot() {
        let pred = Predicate::file_extension_is("md");
        assert!(!pred.matches(&write_context("md")));
        assert!(pred.matches(&write_context("notes.MD")));
    }

    #[test]
    fn evaluation_is_stable_across_calls() {
        // Purity: two structurally equal contexts always agree.
        let pred = Predicate::command_contains("git").or(Predicate::not(
            Predicate::tool_is(ToolKind::Bash),
        ));
        let first = write_context("a.md");
        let second = write_context("a.md");
        for _ in 0..3 {
            assert_eq!(pred.matches(&first), pred.matches(&second));
        }
    }
}
