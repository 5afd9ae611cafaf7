//! klaudiush - pre-execution policy hook for AI coding assistants.
//!
//! Thin binary entry point: builds the Tokio runtime and delegates to the
//! hook driver. Exit code is 0 in every handled case; 3 means a fatal crash.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

mod cli;
mod hook;

use cli::args::Cli;

const EXIT_FATAL: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build Tokio runtime")
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("klaudiush: fatal: {error:#}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("klaudiush: fatal: {error:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    hook::init_tracing();
    hook::run_hook(cli).await
}
