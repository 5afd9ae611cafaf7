//! Known configuration path segments.
//!
//! The TOML sections and the `KLAUDIUSH_*` environment mapping share this
//! registry as their single source of truth. Env keys flatten dots and
//! underscores to the same character, so multi-word segments such as
//! `use_markdownlint` or `crash_dump` can only be reassembled by checking
//! candidate joins against this set, longest first.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Every valid path segment, single- and multi-word.
pub static SEGMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Sections and subsections.
        "global",
        "validators",
        "git",
        "commit",
        "push",
        "file",
        "markdown",
        "shell",
        "secrets",
        "rules",
        "overrides",
        "entries",
        "exceptions",
        "policies",
        "rate_limit",
        "audit",
        "backup",
        "crash_dump",
        "patterns",
        "session",
        // Leaves.
        "version",
        "default_timeout_secs",
        "hook_budget_secs",
        "grace_period_ms",
        "io_pool_multiplier",
        "io_pool_ceiling",
        "log_level",
        "enabled",
        "required_flags",
        "forbid_no_verify",
        "severity",
        "protected_remotes",
        "protected_branches",
        "use_markdownlint",
        "heading_spacing",
        "max_title_length",
        "deny_patterns",
        "context_lines",
        "stop_on_first_match",
        "token_prefix",
        "allow_exception",
        "require_reason",
        "min_reason_length",
        "valid_reasons",
        "max_per_hour",
        "max_per_day",
        "state_path",
        "max_global_per_hour",
        "max_global_per_day",
        "log_path",
        "max_size_mb",
        "max_backups",
        "max_age_days",
        "directory",
        "backup_before_restore",
        "max_count",
        "max_total_size_mb",
        "patch_threshold_percent",
        "max_dumps",
        "session_max_age_hours",
        "window_minutes",
    ]
    .into_iter()
    .collect()
});

/// Resolve a flattened env suffix (already lowercased, split on `_`) into a
/// dotted config path. Greedy longest-match against [`SEGMENTS`].
///
/// Returns `None` when some span of tokens matches no known segment.
pub fn resolve_path(tokens: &[&str]) -> Option<Vec<String>> {
    let mut path = Vec::new();
    let mut position = 0;

    while position < tokens.len() {
        let mut matched = None;
        for end in (position + 1..=tokens.len()).rev() {
            let candidate = tokens[position..end].join("_");
            if SEGMENTS.contains(candidate.as_str()) {
                matched = Some((candidate, end));
                break;
            }
        }
        let (segment, end) = matched?;
        path.push(segment);
        position = end;
    }

    Some(path)
}
