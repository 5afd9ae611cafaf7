//! Command-line arguments.
//!
//! Flag overrides form the highest-precedence configuration layer; the
//! builder below turns them into a TOML table the loader merges last.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "klaudiush",
    about = "Pre-execution policy hook for AI coding assistant tool calls",
    version
)]
pub struct Cli {
    /// Hook event type (PreToolUse, PostToolUse, Notification, Stop,
    /// SubagentStop, SessionStart). Fallback when stdin omits the event.
    #[arg(long = "hook-type")]
    pub hook_type: Option<String>,

    /// Workspace directory for project config discovery (defaults to cwd).
    #[arg(long)]
    pub workspace: Option<PathBuf>,

    /// Per-validator timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Wall-clock budget for the whole invocation, in seconds.
    #[arg(long)]
    pub budget_secs: Option<u64>,

    /// Disable the rule engine for this invocation.
    #[arg(long)]
    pub no_rules: bool,

    /// Disable the exception gate for this invocation.
    #[arg(long)]
    pub no_exceptions: bool,
}

impl Cli {
    /// The CLI flag configuration layer, or `None` when no override is set.
    pub fn flag_layer(&self) -> Option<toml::Value> {
        let mut root = toml::Table::new();

        let mut global = toml::Table::new();
        if let Some(timeout) = self.timeout_secs {
            global.insert(
                "default_timeout_secs".to_string(),
                toml::Value::Integer(timeout as i64),
            );
        }
        if let Some(budget) = self.budget_secs {
            global.insert(
                "hook_budget_secs".to_string(),
                toml::Value::Integer(budget as i64),
            );
        }
        if !global.is_empty() {
            root.insert("global".to_string(), toml::Value::Table(global));
        }

        if self.no_rules {
            let mut rules = toml::Table::new();
            rules.insert("enabled".to_string(), toml::Value::Boolean(false));
            root.insert("rules".to_string(), toml::Value::Table(rules));
        }

        if self.no_exceptions {
            let mut exceptions = toml::Table::new();
            exceptions.insert("enabled".to_string(), toml::Value::Boolean(false));
            root.insert("exceptions".to_string(), toml::Value::Table(exceptions));
        }

        if root.is_empty() {
            None
        } else {
            Some(toml::Value::Table(root))
        }
    }
}
