//! End-to-end pipeline scenarios: dispatch, rules, overrides, exceptions,
//! response building, audit accounting.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use klaudiush_config::{
    ExceptionPolicy, KlaudiushConfig, OverrideEntry, RuleAction, RuleActionKind, RuleConfig,
    RuleMatch,
};
use klaudiush_core::hook::{
    Decision, HookContext, HookEvent, ToolInput, ToolKind, build_response,
};
use klaudiush_core::state::rate_limiter::RateLimiterState;
use klaudiush_core::validators::predicate::Predicate;
use klaudiush_core::validators::result::ValidationResult;
use klaudiush_core::validators::{Registry, Validator};
use klaudiush_core::{Pipeline, Verdict};
use tempfile::TempDir;

fn test_config(dir: &Path) -> KlaudiushConfig {
    let mut config = KlaudiushConfig::default();
    config.exceptions.rate_limit.state_path = Some(dir.join("exception_state.json"));
    config.exceptions.audit.log_path = Some(dir.join("exception_audit.jsonl"));
    config
}

fn bash_event(command: &str) -> HookContext {
    HookContext {
        event: HookEvent::PreToolUse,
        tool: Some(ToolKind::Bash),
        input: ToolInput::Bash {
            command: command.to_string(),
            description: String::new(),
        },
        session_id: "session-e2e".to_string(),
        cwd: "/repo".to_string(),
        transcript_path: String::new(),
    }
}

fn audit_lines(dir: &Path) -> Vec<serde_json::Value> {
    match fs::read_to_string(dir.join("exception_audit.jsonl")) {
        Ok(content) => content
            .lines()
            .map(|line| serde_json::from_str(line).expect("valid audit line"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

fn seed_rate_state(dir: &Path, code: &str, hourly: u32) {
    let now = Utc::now();
    let mut state = RateLimiterState::fresh(now);
    state.global_hourly_count = hourly;
    state.global_daily_count = hourly;
    state.hourly_usage.insert(code.to_string(), hourly);
    state.daily_usage.insert(code.to_string(), hourly);
    fs::write(
        dir.join("exception_state.json"),
        serde_json::to_string_pretty(&state).unwrap(),
    )
    .unwrap();
}

fn read_rate_state(dir: &Path) -> RateLimiterState {
    let content = fs::read_to_string(dir.join("exception_state.json")).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[tokio::test]
async fn unsigned_commit_is_denied_with_reference() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path()));

    let context = bash_event("git commit -m \"x\"");
    let verdict = pipeline.run(&context).await;
    assert_eq!(verdict.decision, Decision::Deny);

    let response = build_response(context.event, &verdict.results).unwrap();
    let output = &response.hook_specific_output;
    assert_eq!(output.permission_decision, "deny");
    assert!(output.permission_decision_reason.starts_with("[GIT010]"));

    let message = response.system_message.unwrap();
    assert!(message.contains("missing required flags"));
    assert!(message.contains("https://klaudiu.sh/GIT010"));

    // No exception was attempted, so no audit entry exists.
    assert!(audit_lines(dir.path()).is_empty());
}

#[tokio::test]
async fn override_disables_the_code() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.overrides.entries.insert(
        "GIT010".to_string(),
        OverrideEntry {
            disabled: true,
            ..Default::default()
        },
    );
    let pipeline = Pipeline::new(config);

    let context = bash_event("git commit -m \"x\"");
    let verdict = pipeline.run(&context).await;
    assert_eq!(verdict.decision, Decision::Allow);

    let response = build_response(context.event, &verdict.results);
    let deny_mentioned = response
        .and_then(|response| response.system_message)
        .map(|message| message.contains("Validation Failed"))
        .unwrap_or(false);
    assert!(!deny_mentioned);
}

#[tokio::test]
async fn exception_token_grants_bypass_within_limits() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.exceptions.policies.insert(
        "GIT022".to_string(),
        ExceptionPolicy {
            allow_exception: true,
            max_per_hour: 2,
            max_per_day: 10,
            ..Default::default()
        },
    );
    seed_rate_state(dir.path(), "GIT022", 1);
    let pipeline = Pipeline::new(config);

    let context = bash_event("git push origin main # EXC-GIT022-org-policy");
    let verdict = pipeline.run(&context).await;

    // Allow-with-warning: decision is allow, the downgraded block surfaces
    // as a warning.
    assert_eq!(verdict.decision, Decision::Allow);
    let response = build_response(context.event, &verdict.results).unwrap();
    assert_eq!(response.hook_specific_output.permission_decision, "allow");
    assert!(
        response
            .system_message
            .unwrap()
            .contains("exception granted")
    );

    let state = read_rate_state(dir.path());
    assert_eq!(state.hourly_usage["GIT022"], 2);

    let audit = audit_lines(dir.path());
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["outcome"], "allowed");
}

#[tokio::test]
async fn exception_token_over_limit_is_denied_and_audited() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.exceptions.policies.insert(
        "GIT022".to_string(),
        ExceptionPolicy {
            allow_exception: true,
            max_per_hour: 2,
            max_per_day: 10,
            ..Default::default()
        },
    );
    seed_rate_state(dir.path(), "GIT022", 2);
    let pipeline = Pipeline::new(config);

    let context = bash_event("git push origin main # EXC-GIT022-org-policy");
    let verdict = pipeline.run(&context).await;
    assert_eq!(verdict.decision, Decision::Deny);

    let audit = audit_lines(dir.path());
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0]["outcome"], "denied");
    assert_eq!(audit[0]["reason"], "rate_limit_exceeded");

    // Counters unchanged.
    let state = read_rate_state(dir.path());
    assert_eq!(state.hourly_usage["GIT022"], 2);
    assert_eq!(state.global_hourly_count, 2);
}

#[tokio::test]
async fn allow_rule_overrides_protected_push() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.rules.rules.push(RuleConfig {
        name: Some("origin-release".to_string()),
        priority: 10,
        enabled: None,
        description: None,
        match_conditions: RuleMatch {
            validator_type: Some("git.push".to_string()),
            remote: Some("origin".to_string()),
            ..Default::default()
        },
        action: Some(RuleAction {
            kind: RuleActionKind::Allow,
            message: Some("release pushes are pre-approved".to_string()),
            reference: None,
        }),
    });
    let pipeline = Pipeline::new(config);

    let context = bash_event("git push origin main");
    let verdict = pipeline.run(&context).await;
    assert_eq!(verdict.decision, Decision::Allow);

    // The allow rule replaced the result list; no audit row was written.
    assert!(audit_lines(dir.path()).is_empty());
}

struct Sleeper;

#[async_trait]
impl Validator for Sleeper {
    fn name(&self) -> &str {
        "sleeper"
    }

    async fn validate(&self, _context: &HookContext) -> ValidationResult {
        tokio::time::sleep(StdDuration::from_secs(30)).await;
        ValidationResult::pass()
    }
}

struct FileBlocker;

#[async_trait]
impl Validator for FileBlocker {
    fn name(&self) -> &str {
        "file.checks"
    }

    async fn validate(&self, _context: &HookContext) -> ValidationResult {
        ValidationResult::block("FILE001", "write touches a protected path")
    }
}

#[tokio::test]
async fn partial_failure_is_visible_and_bounded() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.global.default_timeout_secs = 1;
    config.global.hook_budget_secs = 1;

    let mut registry = Registry::new();
    registry.register(
        Predicate::event_is(HookEvent::PreToolUse),
        Arc::new(Sleeper),
    );
    registry.register(
        Predicate::event_is(HookEvent::PreToolUse),
        Arc::new(FileBlocker),
    );
    let pipeline = Pipeline::with_registry(config, registry);

    let context = bash_event("touch /etc/passwd");
    let started = Instant::now();
    let verdict = pipeline.run(&context).await;
    let elapsed = started.elapsed();

    assert_eq!(verdict.decision, Decision::Deny);
    let message = build_response(context.event, &verdict.results)
        .unwrap()
        .system_message
        .unwrap();
    assert!(message.contains("FILE001"));
    assert!(message.contains("sleeper timed out"));
    assert!(elapsed < StdDuration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test]
async fn session_start_event_has_nothing_to_validate() {
    let dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(dir.path()));
    let context = HookContext {
        event: HookEvent::SessionStart,
        tool: None,
        input: ToolInput::None,
        session_id: "s".to_string(),
        cwd: String::new(),
        transcript_path: String::new(),
    };

    let Verdict { decision, results } = pipeline.run(&context).await;
    assert_eq!(decision, Decision::Allow);
    assert!(results.is_empty());
    assert!(build_response(context.event, &results).is_none());
}
