//! Core decision pipeline for the klaudiush pre-execution hook.
//!
//! One hook invocation flows stdin JSON -> [`hook::HookContext`] ->
//! [`dispatch::Dispatcher`] over the [`validators::Registry`] ->
//! [`policy`] stages (rules, overrides, exceptions) -> stdout JSON via
//! [`hook::build_response`]. Persistent state (rate limiter, audit log,
//! backups, failure patterns) lives under `~/.klaudiush/`.

pub mod backup;
pub mod dispatch;
pub mod hook;
pub mod patterns;
pub mod policy;
pub mod state;
pub mod validators;

pub use dispatch::Dispatcher;
pub use hook::{Decision, HookContext, HookEvent, HookResponse, ToolKind};
pub use policy::{Pipeline, Verdict};
pub use validators::{Registry, ValidationResult, Validator};
