//! Concurrent validator dispatch under deadlines.
//!
//! Validators run in their own tasks over two bounded pools (CPU and IO).
//! A validator that times out or panics contributes a synthetic warning, so
//! aggregation never sees a missing entry, and results always come back in
//! registry insertion order regardless of completion order.

use std::sync::Arc;
use std::time::Duration;

use klaudiush_config::GlobalConfig;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, warn};

use crate::hook::context::HookContext;
use crate::validators::registry::Registry;
use crate::validators::result::ValidationResult;
use crate::validators::{CostCategory, Validator};

pub struct Dispatcher {
    cpu_slots: Arc<Semaphore>,
    io_slots: Arc<Semaphore>,
    validator_timeout: Duration,
    budget: Duration,
    grace: Duration,
}

impl Dispatcher {
    pub fn new(
        validator_timeout: Duration,
        budget: Duration,
        grace: Duration,
        cpu_pool: usize,
        io_pool: usize,
    ) -> Self {
        Self {
            cpu_slots: Arc::new(Semaphore::new(cpu_pool.max(1))),
            io_slots: Arc::new(Semaphore::new(io_pool.max(1))),
            validator_timeout,
            budget,
            grace,
        }
    }

    pub fn from_config(global: &GlobalConfig) -> Self {
        let parallelism = num_cpus::get().max(1);
        let io_pool = (parallelism * global.io_pool_multiplier).min(global.io_pool_ceiling);
        Self::new(
            Duration::from_secs(global.default_timeout_secs),
            Duration::from_secs(global.hook_budget_secs),
            Duration::from_millis(global.grace_period_ms),
            parallelism,
            io_pool,
        )
    }

    /// Run every applicable validator and collect results in registry order.
    pub async fn dispatch(
        &self,
        context: &HookContext,
        registry: &Registry,
    ) -> Vec<ValidationResult> {
        let applicable = registry.applicable(context);
        if applicable.is_empty() {
            return Vec::new();
        }
        debug!(count = applicable.len(), "dispatching validators");

        let shared_context = Arc::new(context.clone());
        let deadline = Instant::now() + self.budget + self.grace;

        let handles: Vec<_> = applicable
            .iter()
            .map(|validator| {
                let validator = Arc::clone(validator);
                let context = Arc::clone(&shared_context);
                let slots = match validator.cost() {
                    CostCategory::Cpu => Arc::clone(&self.cpu_slots),
                    CostCategory::Io => Arc::clone(&self.io_slots),
                };
                let per_validator = self.validator_timeout;
                tokio::spawn(async move {
                    let _permit = slots
                        .acquire_owned()
                        .await
                        .expect("dispatcher semaphore is never closed");
                    run_one(validator, &context, per_validator).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (handle, validator) in handles.into_iter().zip(applicable.iter()) {
            let name = validator.name().to_string();
            let result = match timeout_at(deadline, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => {
                    warn!(validator = %name, %join_error, "validator task failed");
                    synthetic_fault(&name, &join_error.to_string())
                }
                Err(_) => {
                    // Budget exhausted: the task keeps its permit until it
                    // returns on its own, but we stop waiting for it.
                    warn!(validator = %name, "hook budget exhausted before validator finished");
                    synthetic_timeout(&name, self.budget)
                }
            };
            results.push(result);
        }

        results
    }
}

async fn run_one(
    validator: Arc<dyn Validator>,
    context: &HookContext,
    per_validator: Duration,
) -> ValidationResult {
    let name = validator.name().to_string();
    match timeout(per_validator, validator.validate(context)).await {
        Ok(result) => result.with_validator(name),
        Err(_) => synthetic_timeout(&name, per_validator),
    }
}

fn synthetic_timeout(name: &str, after: Duration) -> ValidationResult {
    ValidationResult::warn_uncoded(format!(
        "validator {name} timed out after {}s",
        after.as_secs_f64()
    ))
    .with_validator(name)
}

fn synthetic_fault(name: &str, error: &str) -> ValidationResult {
    ValidationResult::warn_uncoded(format!("validator {name} failed: {error}"))
        .with_validator(name)
}
