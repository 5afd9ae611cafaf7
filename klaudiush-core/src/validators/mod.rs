//! Validator contract, predicates, results and the registry.

pub mod builtin;
pub mod predicate;
pub mod reference;
pub mod registry;
pub mod result;

use async_trait::async_trait;

use crate::hook::context::HookContext;
pub use predicate::Predicate;
pub use reference::{Reference, fix_hint_for};
pub use registry::Registry;
pub use result::{ValidationResult, should_block};

/// Pool the dispatcher schedules a validator on.
///
/// Regex/AST checks are CPU; anything that shells out to a linter or calls
/// an external API is IO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostCategory {
    Cpu,
    Io,
}

/// A pluggable decider over hook contexts.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable name, e.g. `git.commit`. Override targets and rule
    /// `validator_type` conditions match against this.
    fn name(&self) -> &str;

    fn cost(&self) -> CostCategory {
        CostCategory::Cpu
    }

    async fn validate(&self, context: &HookContext) -> ValidationResult;
}
