//! Hook-mode driver: stdin JSON in, decision JSON out.
//!
//! Fault policy: configuration faults are fatal (the caller maps them to the
//! crash exit code); input faults warn on stderr and allow with no output so
//! a parser bug never blocks the assistant.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use klaudiush_config::ConfigManager;
use klaudiush_core::hook::{HookEvent, parse_hook_input};
use klaudiush_core::patterns::PatternTracker;
use klaudiush_core::policy::{Pipeline, default_state_dir};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::args::Cli;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("KLAUDIUSH_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run_hook(cli: Cli) -> Result<ExitCode> {
    let flag_event = match cli.hook_type.as_deref() {
        Some(raw) => match raw.parse::<HookEvent>() {
            Ok(event) => Some(event),
            Err(error) => {
                // Unknown event: warn and allow with no output.
                eprintln!("klaudiush: warning: {error}; allowing");
                return Ok(ExitCode::SUCCESS);
            }
        },
        None => None,
    };

    // Config faults are fatal before the dispatch loop starts.
    let workspace = match cli.workspace.clone() {
        Some(workspace) => workspace,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let config = load_config(&cli, &workspace)?;

    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read stdin")?;

    let context = match parse_hook_input(&raw, flag_event) {
        Ok(Some(context)) => context,
        Ok(None) => {
            debug!("empty stdin; no event to evaluate");
            return Ok(ExitCode::SUCCESS);
        }
        Err(error) => {
            eprintln!("klaudiush: warning: {error}; allowing");
            return Ok(ExitCode::SUCCESS);
        }
    };

    let pipeline = Pipeline::new(config);
    let verdict = pipeline.run(&context).await;

    record_patterns(&pipeline, &workspace, &context.session_id, &verdict);

    if let Some(response) = klaudiush_core::hook::build_response(context.event, &verdict.results) {
        let serialized =
            serde_json::to_string(&response).context("failed to serialize hook response")?;
        println!("{serialized}");
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(cli: &Cli, workspace: &PathBuf) -> Result<klaudiush_config::KlaudiushConfig> {
    let manager = ConfigManager::load_for_workspace(workspace, cli.flag_layer())?;
    Ok(manager.into_config())
}

/// Best-effort: tracker faults never affect the decision.
fn record_patterns(
    pipeline: &Pipeline,
    workspace: &PathBuf,
    session_id: &str,
    verdict: &klaudiush_core::Verdict,
) {
    let config = pipeline.config();
    if !config.patterns.enabled() {
        return;
    }
    let denied = Pipeline::denied_codes(verdict);
    if denied.is_empty() {
        return;
    }

    let tracker = PatternTracker::at_default_paths(
        workspace,
        &default_state_dir(),
        &config.patterns,
        &config.session,
    );
    if let Err(error) = tracker.record_failures(session_id, &denied, chrono::Utc::now()) {
        warn!(%error, "failed to record failure patterns");
    }
}
