//! Hook wire protocol: input parsing, context, response building.

pub mod context;
pub mod input;
pub mod response;

pub use context::{EditOp, HookContext, HookEvent, ToolInput, ToolKind};
pub use input::{InputError, parse_hook_input};
pub use response::{Decision, HookResponse, build_response};
