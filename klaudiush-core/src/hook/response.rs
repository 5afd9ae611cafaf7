//! Hook response building and the stdout JSON contract.

use serde::Serialize;

use super::context::HookEvent;
use crate::validators::result::{ValidationResult, should_block};

const REASON_MAX_CHARS: usize = 200;

/// Final decision encoded in `permissionDecision`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HookResponse {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput,
    #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "permissionDecision")]
    pub permission_decision: &'static str,
    #[serde(rename = "permissionDecisionReason")]
    pub permission_decision_reason: String,
    #[serde(rename = "additionalContext")]
    pub additional_context: String,
}

/// Compose the response for a finished pipeline run.
///
/// Returns `None` when everything passed: allow with no output, so the
/// assistant is not interrupted.
pub fn build_response(event: HookEvent, results: &[ValidationResult]) -> Option<HookResponse> {
    let blocking: Vec<&ValidationResult> = results
        .iter()
        .filter(|result| !result.passed && result.should_block)
        .collect();
    let warnings: Vec<&ValidationResult> = results
        .iter()
        .filter(|result| !result.passed && !result.should_block)
        .collect();

    if blocking.is_empty() && warnings.is_empty() {
        return None;
    }

    let decision = if should_block(results) {
        Decision::Deny
    } else {
        Decision::Allow
    };

    let reason = match blocking.first() {
        Some(first) => summarize(first),
        None => warnings.first().map(|first| summarize(first)).unwrap_or_default(),
    };

    let additional_context = match decision {
        Decision::Deny => {
            "The tool call was denied by policy. Address the failures below before retrying; \
             do not attempt to work around the block."
                .to_string()
        }
        Decision::Allow => {
            "The tool call is allowed but produced warnings. Consider addressing them."
                .to_string()
        }
    };

    Some(HookResponse {
        hook_specific_output: HookSpecificOutput {
            hook_event_name: event.to_string(),
            permission_decision: decision.as_str(),
            permission_decision_reason: reason,
            additional_context,
        },
        system_message: Some(format_report(&blocking, &warnings)),
    })
}

/// Multi-line human-readable report: failures first, then warnings.
fn format_report(blocking: &[&ValidationResult], warnings: &[&ValidationResult]) -> String {
    let mut out = String::new();

    if !blocking.is_empty() {
        out.push_str("Validation Failed:\n");
        for result in blocking {
            format_entry(&mut out, result);
        }
    }

    if !warnings.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("Warnings:\n");
        for result in warnings {
            format_entry(&mut out, result);
        }
    }

    out.trim_end().to_string()
}

fn format_entry(out: &mut String, result: &ValidationResult) {
    match &result.reference {
        Some(reference) => {
            out.push_str(&format!(
                "  [{}] {} ({})\n",
                reference.code(),
                result.message,
                reference.url()
            ));
        }
        None => out.push_str(&format!("  {}\n", result.message)),
    }
    for (key, value) in &result.details {
        out.push_str(&format!("    {key}: {value}\n"));
    }
    if !result.fix_hint.is_empty() {
        out.push_str(&format!("    fix: {}\n", result.fix_hint));
    }
}

/// One-line summary of a result: `[CODE] message. fix hint`, decorative
/// characters stripped, truncated to 200 chars.
fn summarize(result: &ValidationResult) -> String {
    let mut line = match result.code() {
        Some(code) => format!("[{code}] {}", result.message),
        None => result.message.clone(),
    };
    if !result.fix_hint.is_empty() {
        if !line.trim_end().ends_with(['.', '!', '?']) {
            line.push('.');
        }
        line.push(' ');
        line.push_str(&result.fix_hint);
    }

    let cleaned: String = line
        .chars()
        .map(|ch| if ch == '\n' || ch == '\t' { ' ' } else { ch })
        .filter(|ch| !matches!(ch, '*' | '#' | '`' | '|' | '>'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    truncate_chars(&collapsed, REASON_MAX_CHARS)
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{truncated}...")
}
