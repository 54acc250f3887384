//! `agent-pipeline` binary entry point.
//!
//! A single command with no subcommands: behavior is fully determined by
//! repository filesystem state (plan files, `pipeline.toml`) and git state
//! (branch, remote, pending changes).

use std::path::PathBuf;
use std::process::ExitCode;

use agent_pipeline::exit_codes;
use agent_pipeline::io::config::load_config;
use agent_pipeline::io::invoker::CopilotInvoker;
use agent_pipeline::logging;
use agent_pipeline::pipeline::{PipelineOutcome, RunStamp, run_pipeline};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "agent-pipeline",
    version,
    about = "Drive an external coding agent through plan -> implement -> review -> PR"
)]
struct Cli {
    /// Repository root to run in (defaults to the current directory).
    #[arg(long)]
    root: Option<PathBuf>,
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(exit_codes::FATAL as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("determine current directory")?,
    };
    let cfg = load_config(&root.join("pipeline.toml"))?;
    let invoker = CopilotInvoker::new(&cfg);
    let stamp = RunStamp::now();

    match run_pipeline(&root, &invoker, &cfg, &stamp)? {
        PipelineOutcome::PrCreated { run_id } => {
            info!(run_id = %run_id, "pipeline completed, PR stage invoked");
        }
        PipelineOutcome::NoChanges { run_id } => {
            info!(run_id = %run_id, "pipeline completed with nothing to publish");
        }
    }
    Ok(exit_codes::OK)
}
