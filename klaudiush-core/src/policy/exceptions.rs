//! Stage C: the exception gate.
//!
//! A blocking result whose code has a configured policy can be consciously
//! bypassed with a token in the command or content. Every attempt, granted
//! or not, writes exactly one audit row.

use chrono::{DateTime, Utc};
use klaudiush_config::{ExceptionPolicy, ExceptionsConfig};
use tracing::warn;

use crate::hook::context::HookContext;
use crate::state::audit::{AuditEntry, AuditLog, AuditOutcome};
use crate::state::rate_limiter::{BypassDecision, RateLimiter};
use crate::validators::result::ValidationResult;

pub const REASON_RATE_LIMIT: &str = "rate_limit_exceeded";
pub const REASON_REQUIRED: &str = "reason_required";
pub const REASON_NOT_ALLOWED: &str = "exception_not_allowed";

/// A parsed `<prefix>-<CODE>-<reason-key>` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionToken {
    pub code: String,
    pub reason_key: Option<String>,
}

/// Find the token for `code` in free text. The reason key is everything
/// after the code up to the next whitespace.
pub fn find_token(text: &str, prefix: &str, code: &str) -> Option<ExceptionToken> {
    let needle = format!("{prefix}-{code}");
    let start = text.find(&needle)?;
    let rest = &text[start + needle.len()..];

    let reason_key = rest
        .strip_prefix('-')
        .map(|tail| {
            tail.split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .filter(|key| !key.is_empty());

    Some(ExceptionToken {
        code: code.to_string(),
        reason_key,
    })
}

pub struct ExceptionGate<'a> {
    config: &'a ExceptionsConfig,
    limiter: &'a RateLimiter,
    audit: &'a AuditLog,
}

impl<'a> ExceptionGate<'a> {
    pub fn new(
        config: &'a ExceptionsConfig,
        limiter: &'a RateLimiter,
        audit: &'a AuditLog,
    ) -> Self {
        Self {
            config,
            limiter,
            audit,
        }
    }

    pub fn apply(
        &self,
        context: &HookContext,
        results: Vec<ValidationResult>,
        now: DateTime<Utc>,
    ) -> Vec<ValidationResult> {
        if !self.config.enabled() {
            return results;
        }

        let haystack = format!("{} {}", context.command(), context.content());

        results
            .into_iter()
            .map(|result| {
                if result.passed || !result.should_block {
                    return result;
                }
                let Some(code) = result.code().map(str::to_string) else {
                    return result;
                };
                let Some(policy) = self.config.policies.get(&code) else {
                    return result;
                };
                let Some(token) = find_token(&haystack, &self.config.token_prefix, &code) else {
                    return result;
                };
                self.attempt_bypass(context, result, &code, policy, token, now)
            })
            .collect()
    }

    fn attempt_bypass(
        &self,
        context: &HookContext,
        result: ValidationResult,
        code: &str,
        policy: &ExceptionPolicy,
        token: ExceptionToken,
        now: DateTime<Utc>,
    ) -> ValidationResult {
        if !policy.allow_exception {
            self.record(context, &result, code, AuditOutcome::Denied, Some(REASON_NOT_ALLOWED), now);
            return result;
        }

        if policy.require_reason && !reason_is_valid(policy, token.reason_key.as_deref()) {
            self.record(context, &result, code, AuditOutcome::Denied, Some(REASON_REQUIRED), now);
            return result;
        }

        match self.limiter.try_consume(code, policy, now) {
            Ok(BypassDecision::Granted) => {
                self.record(context, &result, code, AuditOutcome::Allowed, None, now);
                downgrade(result, token.reason_key.as_deref())
            }
            Ok(BypassDecision::RateLimited) => {
                self.record(context, &result, code, AuditOutcome::Denied, Some(REASON_RATE_LIMIT), now);
                result
            }
            Err(error) => {
                // Limiter unavailable: fail closed, keep the block.
                warn!(%code, %error, "rate limiter unavailable; exception refused");
                self.record(context, &result, code, AuditOutcome::Denied, Some(REASON_RATE_LIMIT), now);
                result
            }
        }
    }

    fn record(
        &self,
        context: &HookContext,
        result: &ValidationResult,
        code: &str,
        outcome: AuditOutcome,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let entry = AuditEntry {
            timestamp: now,
            session_id: context.session_id.clone(),
            code: code.to_string(),
            validator: result.validator.clone(),
            outcome,
            reason: reason.map(str::to_string),
            command: context.command().to_string(),
        };
        if let Err(error) = self.audit.append(&entry) {
            // Never fail the decision because the audit trail is unwritable.
            warn!(%error, "failed to append exception audit entry");
            eprintln!("klaudiush: warning: could not write audit entry: {error:#}");
        }
    }
}

fn reason_is_valid(policy: &ExceptionPolicy, reason_key: Option<&str>) -> bool {
    let Some(key) = reason_key else {
        return false;
    };
    if !policy.valid_reasons.iter().any(|valid| valid == key) {
        return false;
    }
    let resolved = key.replace('-', " ");
    resolved.chars().count() >= policy.min_reason_length
}

/// Downgrade a granted block to a warning so the action proceeds visibly.
fn downgrade(mut result: ValidationResult, reason_key: Option<&str>) -> ValidationResult {
    result.should_block = false;
    result.message = match reason_key {
        Some(key) => format!("{} (exception granted: {key})", result.message),
        None => format!("{} (exception granted)", result.message),
    };
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hook::context::{HookEvent, ToolInput, ToolKind};
    use klaudiush_config::AuditConfig;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        config: ExceptionsConfig,
        limiter: RateLimiter,
        audit: AuditLog,
    }

    fn fixture(policy: ExceptionPolicy) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = ExceptionsConfig::default();
        config.policies.insert("GIT022".to_string(), policy);
        let limiter = RateLimiter::new(dir.path().join("exception_state.json"), 100, 1000);
        let audit = AuditLog::new(
            dir.path().join("exception_audit.jsonl"),
            &AuditConfig::default(),
        );
        Fixture {
            _dir: dir,
            config,
            limiter,
            audit,
        }
    }

    fn push_context(command: &str) -> HookContext {
        HookContext {
            event: HookEvent::PreToolUse,
            tool: Some(ToolKind::Bash),
            input: ToolInput::Bash {
                command: command.to_string(),
                description: String::new(),
            },
            session_id: "session-1".to_string(),
            cwd: String::new(),
            transcript_path: String::new(),
        }
    }

    fn blocked() -> Vec<ValidationResult> {
        vec![ValidationResult::block("GIT022", "protected push").with_validator("git.push")]
    }

    fn allowing_policy() -> ExceptionPolicy {
        ExceptionPolicy {
            allow_exception: true,
            max_per_hour: 2,
            max_per_day: 10,
            ..Default::default()
        }
    }

    #[test]
    fn token_parsing_extracts_reason_key() {
        let token = find_token("git push # EXC-GIT022-org-policy", "EXC", "GIT022").unwrap();
        assert_eq!(token.reason_key.as_deref(), Some("org-policy"));

        let bare = find_token("EXC-GIT022 rest", "EXC", "GIT022").unwrap();
        assert_eq!(bare.reason_key, None);

        assert!(find_token("no token here", "EXC", "GIT022").is_none());
    }

    #[test]
    fn bypass_within_limits_downgrades_and_audits_once() {
        let fixture = fixture(allowing_policy());
        let gate = ExceptionGate::new(&fixture.config, &fixture.limiter, &fixture.audit);
        let context = push_context("git push origin main # EXC-GIT022-org-policy");

        let results = gate.apply(&context, blocked(), Utc::now());

        assert!(!results[0].should_block);
        assert!(results[0].message.contains("exception granted"));
        let rows = fixture.audit.query(None, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].outcome, AuditOutcome::Allowed);
    }

    #[test]
    fn over_limit_keeps_block_and_audits_denial() {
        let fixture = fixture(ExceptionPolicy {
            max_per_hour: 1,
            ..allowing_policy()
        });
        let gate = ExceptionGate::new(&fixture.config, &fixture.limiter, &fixture.audit);
        let context = push_context("git push origin main # EXC-GIT022-x");
        let now = Utc::now();

        let first = gate.apply(&context, blocked(), now);
        assert!(!first[0].should_block);

        let second = gate.apply(&context, blocked(), now);
        assert!(second[0].should_block);

        let denied = fixture
            .audit
            .query(None, Some(AuditOutcome::Denied))
            .unwrap();
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].reason.as_deref(), Some(REASON_RATE_LIMIT));
    }

    #[test]
    fn missing_reason_is_refused_when_required() {
        let fixture = fixture(ExceptionPolicy {
            require_reason: true,
            min_reason_length: 5,
            valid_reasons: vec!["org-policy".to_string()],
            ..allowing_policy()
        });
        let gate = ExceptionGate::new(&fixture.config, &fixture.limiter, &fixture.audit);

        let context = push_context("git push origin main # EXC-GIT022");
        let results = gate.apply(&context, blocked(), Utc::now());
        assert!(results[0].should_block);

        let denied = fixture
            .audit
            .query(None, Some(AuditOutcome::Denied))
            .unwrap();
        assert_eq!(denied[0].reason.as_deref(), Some(REASON_REQUIRED));
    }

    #[test]
    fn unlisted_reason_is_refused() {
        let fixture = fixture(ExceptionPolicy {
            require_reason: true,
            min_reason_length: 3,
            valid_reasons: vec!["org-policy".to_string()],
            ..allowing_policy()
        });
        let gate = ExceptionGate::new(&fixture.config, &fixture.limiter, &fixture.audit);

        let context = push_context("git push origin main # EXC-GIT022-because");
        let results = gate.apply(&context, blocked(), Utc::now());
        assert!(results[0].should_block);
    }

    #[test]
    fn no_token_means_no_attempt_and_no_audit() {
        let fixture = fixture(allowing_policy());
        let gate = ExceptionGate::new(&fixture.config, &fixture.limiter, &fixture.audit);

        let results = gate.apply(&push_context("git push origin main"), blocked(), Utc::now());
        assert!(results[0].should_block);
        assert!(fixture.audit.query(None, None).unwrap().is_empty());
    }

    #[test]
    fn policy_forbidding_exceptions_audits_denial() {
        let fixture = fixture(ExceptionPolicy {
            allow_exception: false,
            ..allowing_policy()
        });
        let gate = ExceptionGate::new(&fixture.config, &fixture.limiter, &fixture.audit);

        let context = push_context("git push origin main # EXC-GIT022-x");
        let results = gate.apply(&context, blocked(), Utc::now());
        assert!(results[0].should_block);

        let denied = fixture
            .audit
            .query(None, Some(AuditOutcome::Denied))
            .unwrap();
        assert_eq!(denied[0].reason.as_deref(), Some(REASON_NOT_ALLOWED));
    }
}
