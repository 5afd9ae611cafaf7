//! Hook input parsing.
//!
//! The assistant pipes one JSON object to stdin per tool invocation. Parsing
//! faults must never block the assistant: the caller maps them to a stderr
//! warning and an "allow, no output" response.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::context::{EditOp, HookContext, HookEvent, ToolInput, ToolKind};

#[derive(Debug, Error)]
pub enum InputError {
    #[error("malformed hook input: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hook input carries no event and no --hook-type was given")]
    MissingEvent,
    #[error("{0}")]
    UnknownEvent(String),
    #[error("{0}")]
    UnknownTool(String),
}

#[derive(Debug, Deserialize)]
struct RawHookInput {
    #[serde(default)]
    hook_event_name: Option<String>,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    tool_input: Option<JsonValue>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    transcript_path: Option<String>,
}

/// Parse raw stdin into a [`HookContext`].
///
/// Empty (or whitespace-only) input means "no event": returns `Ok(None)` and
/// the hook emits nothing. The `--hook-type` flag value acts as a fallback
/// when the payload omits `hook_event_name`.
pub fn parse_hook_input(
    raw: &str,
    flag_event: Option<HookEvent>,
) -> Result<Option<HookContext>, InputError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let input: RawHookInput = serde_json::from_str(raw)?;

    let event = match input.hook_event_name.as_deref() {
        Some(name) => name
            .parse::<HookEvent>()
            .map_err(InputError::UnknownEvent)?,
        None => flag_event.ok_or(InputError::MissingEvent)?,
    };

    let tool = match input.tool_name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => Some(name.parse::<ToolKind>().map_err(InputError::UnknownTool)?),
        None => None,
    };

    let tool_input = project_tool_input(tool, input.tool_input.as_ref());

    Ok(Some(HookContext {
        event,
        tool,
        input: tool_input,
        session_id: input.session_id.unwrap_or_default(),
        cwd: input.cwd.unwrap_or_default(),
        transcript_path: input.transcript_path.unwrap_or_default(),
    }))
}

fn project_tool_input(tool: Option<ToolKind>, raw: Option<&JsonValue>) -> ToolInput {
    let field = |name: &str| -> String {
        raw.and_then(|value| value.get(name))
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string()
    };

    match tool {
        Some(ToolKind::Bash) => ToolInput::Bash {
            command: field("command"),
            description: field("description"),
        },
        Some(ToolKind::Write) => ToolInput::Write {
            file_path: field("file_path"),
            content: field("content"),
        },
        Some(ToolKind::Edit) => ToolInput::Edit {
            file_path: field("file_path"),
            old_string: field("old_string"),
            new_string: field("new_string"),
        },
        Some(ToolKind::MultiEdit) => {
            let edits = raw
                .and_then(|value| value.get("edits"))
                .and_then(JsonValue::as_array)
                .map(|edits| {
                    edits
                        .iter()
                        .map(|edit| EditOp {
                            old_string: edit
                                .get("old_string")
                                .and_then(JsonValue::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            new_string: edit
                                .get("new_string")
                                .and_then(JsonValue::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            ToolInput::MultiEdit {
                file_path: field("file_path"),
                edits,
            }
        }
        Some(ToolKind::Read) => ToolInput::Read {
            file_path: field("file_path"),
        },
        Some(ToolKind::Glob) => ToolInput::Glob {
            pattern: field("pattern"),
            path: field("path"),
        },
        Some(ToolKind::Grep) => ToolInput::Grep {
            pattern: field("pattern"),
            path: field("path"),
        },
        None => ToolInput::None,
    }
}
