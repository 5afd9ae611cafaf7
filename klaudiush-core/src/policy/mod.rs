//! The decision pipeline: dispatch, rules, overrides, exceptions.
//!
//! Stage order is rules -> overrides -> exceptions and is part of the
//! observable contract: an `allow` rule that replaces the result list
//! short-circuits the exception gate, so no bypass is attempted and no audit
//! row is written for that invocation. Do not reorder the stages.

pub mod exceptions;
pub mod overrides;
pub mod rules;

use std::path::PathBuf;

use chrono::Utc;
use klaudiush_config::KlaudiushConfig;

use crate::dispatch::Dispatcher;
use crate::hook::context::HookContext;
use crate::hook::response::{Decision, HookResponse, build_response};
use crate::state::audit::AuditLog;
use crate::state::rate_limiter::RateLimiter;
use crate::validators::registry::Registry;
use crate::validators::result::{ValidationResult, should_block};
pub use exceptions::{ExceptionGate, ExceptionToken, find_token};
pub use overrides::OverrideFilter;
pub use rules::RuleEngine;

pub const STATE_DIR: &str = ".klaudiush";
pub const RATE_STATE_FILE: &str = "exception_state.json";
pub const AUDIT_FILE: &str = "exception_audit.jsonl";

/// Resolved location of the persistent state directory.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR)
}

#[derive(Debug)]
pub struct Verdict {
    pub decision: Decision,
    pub results: Vec<ValidationResult>,
}

pub struct Pipeline {
    config: KlaudiushConfig,
    registry: Registry,
    dispatcher: Dispatcher,
    rule_engine: RuleEngine,
    override_filter: OverrideFilter,
    limiter: RateLimiter,
    audit: AuditLog,
}

impl Pipeline {
    /// Pipeline with the shipped validator set.
    pub fn new(config: KlaudiushConfig) -> Self {
        let registry = Registry::from_config(&config);
        Self::with_registry(config, registry)
    }

    /// Pipeline over a caller-supplied registry (tests, embedders).
    pub fn with_registry(config: KlaudiushConfig, registry: Registry) -> Self {
        let state_dir = default_state_dir();
        let rate_path = config
            .exceptions
            .rate_limit
            .state_path
            .clone()
            .unwrap_or_else(|| state_dir.join(RATE_STATE_FILE));
        let audit_path = config
            .exceptions
            .audit
            .log_path
            .clone()
            .unwrap_or_else(|| state_dir.join(AUDIT_FILE));

        let dispatcher = Dispatcher::from_config(&config.global);
        let rule_engine = RuleEngine::new(config.rules.clone());
        let override_filter = OverrideFilter::new(config.overrides.clone());
        let limiter = RateLimiter::new(
            rate_path,
            config.exceptions.rate_limit.max_global_per_hour,
            config.exceptions.rate_limit.max_global_per_day,
        );
        let audit = AuditLog::new(audit_path, &config.exceptions.audit);

        Self {
            config,
            registry,
            dispatcher,
            rule_engine,
            override_filter,
            limiter,
            audit,
        }
    }

    pub fn config(&self) -> &KlaudiushConfig {
        &self.config
    }

    /// Run the full pipeline for one event.
    pub async fn run(&self, context: &HookContext) -> Verdict {
        let now = Utc::now();

        let results = self.dispatcher.dispatch(context, &self.registry).await;
        let results = self.rule_engine.evaluate(context, results);
        let results = self.override_filter.apply(results, now);
        let gate = ExceptionGate::new(&self.config.exceptions, &self.limiter, &self.audit);
        let results = gate.apply(context, results, now);

        let decision = if should_block(&results) {
            Decision::Deny
        } else {
            Decision::Allow
        };
        Verdict { decision, results }
    }

    /// Run and render the stdout response. `None` means allow with no output.
    pub async fn run_to_response(&self, context: &HookContext) -> Option<HookResponse> {
        let verdict = self.run(context).await;
        build_response(context.event, &verdict.results)
    }

    /// Error codes that were still blocking after all stages. Fed to the
    /// failure-pattern tracker by the driver.
    pub fn denied_codes(verdict: &Verdict) -> Vec<String> {
        verdict
            .results
            .iter()
            .filter(|result| !result.passed && result.should_block)
            .filter_map(|result| result.code().map(str::to_string))
            .collect()
    }
}
