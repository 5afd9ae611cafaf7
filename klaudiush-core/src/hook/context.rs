//! The immutable event presented to every validator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle event that triggered the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    Notification,
    Stop,
    SubagentStop,
    SessionStart,
}

impl FromStr for HookEvent {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "pretooluse" => Ok(Self::PreToolUse),
            "posttooluse" => Ok(Self::PostToolUse),
            "notification" => Ok(Self::Notification),
            "stop" => Ok(Self::Stop),
            "subagentstop" => Ok(Self::SubagentStop),
            "sessionstart" => Ok(Self::SessionStart),
            other => Err(format!("unknown hook event \"{other}\"")),
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::Notification => "Notification",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::SessionStart => "SessionStart",
        };
        f.write_str(name)
    }
}

/// Tool the assistant is invoking, when the event carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Bash,
    Write,
    Edit,
    MultiEdit,
    Read,
    Glob,
    Grep,
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "bash" => Ok(Self::Bash),
            "write" => Ok(Self::Write),
            "edit" => Ok(Self::Edit),
            "multiedit" => Ok(Self::MultiEdit),
            "read" => Ok(Self::Read),
            "glob" => Ok(Self::Glob),
            "grep" => Ok(Self::Grep),
            other => Err(format!("unknown tool \"{other}\"")),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bash => "Bash",
            Self::Write => "Write",
            Self::Edit => "Edit",
            Self::MultiEdit => "MultiEdit",
            Self::Read => "Read",
            Self::Glob => "Glob",
            Self::Grep => "Grep",
        };
        f.write_str(name)
    }
}

/// One old/new replacement within a MultiEdit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditOp {
    pub old_string: String,
    pub new_string: String,
}

/// Tool parameters, tagged by the tool that carries them.
///
/// Validators and predicates never see this shape directly; they go through
/// the [`HookContext`] accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInput {
    Bash {
        command: String,
        description: String,
    },
    Write {
        file_path: String,
        content: String,
    },
    Edit {
        file_path: String,
        old_string: String,
        new_string: String,
    },
    MultiEdit {
        file_path: String,
        edits: Vec<EditOp>,
    },
    Read {
        file_path: String,
    },
    Glob {
        pattern: String,
        path: String,
    },
    Grep {
        pattern: String,
        path: String,
    },
    None,
}

/// The immutable per-invocation event.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub event: HookEvent,
    pub tool: Option<ToolKind>,
    pub input: ToolInput,
    pub session_id: String,
    pub cwd: String,
    pub transcript_path: String,
}

impl HookContext {
    /// Shell command, or `""` for non-Bash events.
    pub fn command(&self) -> &str {
        match &self.input {
            ToolInput::Bash { command, .. } => command,
            _ => "",
        }
    }

    /// Target file path, or `""` when the tool has none.
    pub fn file_path(&self) -> &str {
        match &self.input {
            ToolInput::Write { file_path, .. }
            | ToolInput::Edit { file_path, .. }
            | ToolInput::MultiEdit { file_path, .. }
            | ToolInput::Read { file_path } => file_path,
            ToolInput::Glob { path, .. } | ToolInput::Grep { path, .. } => path,
            _ => "",
        }
    }

    /// Content being written. For edits this is the replacement text.
    pub fn content(&self) -> String {
        match &self.input {
            ToolInput::Write { content, .. } => content.clone(),
            ToolInput::Edit { new_string, .. } => new_string.clone(),
            ToolInput::MultiEdit { edits, .. } => edits
                .iter()
                .map(|edit| edit.new_string.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }

    /// Human description attached to a Bash call, or `""`.
    pub fn description(&self) -> &str {
        match &self.input {
            ToolInput::Bash { description, .. } => description,
            _ => "",
        }
    }
}
