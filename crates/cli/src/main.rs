//! `contentflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: check a workflow definition JSON file and print its path.
//! - `run`: execute a workflow locally against offline providers.

mod offline;
mod record;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{Settings, WorkflowDefinition, WorkflowExecutor};

#[derive(Parser)]
#[command(
    name = "contentflow",
    about = "Content workflow execution engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Run a workflow definition with offline providers.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Initial input as `key=value`. Values are parsed as JSON when
        /// possible, otherwise taken as strings.
        #[arg(short, long = "input", value_parser = parse_input)]
        inputs: Vec<(String, Value)>,
        /// Settings TOML file (executor, env, rates, agents).
        #[arg(long, env = "CONTENTFLOW_SETTINGS")]
        settings: Option<PathBuf>,
        /// Append the execution result to this JSON-lines file.
        #[arg(long)]
        record: Option<PathBuf>,
    },
}

fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.trim().to_owned(), value))
}

fn load_definition(path: &Path) -> anyhow::Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    serde_json::from_str(&content).context("invalid workflow JSON")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let workflow = load_definition(&path)?;
            match engine::build_plan(&workflow) {
                Ok(plan) => {
                    println!("✅ Workflow is valid. Execution order: {:?}", plan.default_path());
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Command::Run { path, inputs, settings, record } => {
            let workflow = load_definition(&path)?;
            let settings = match settings {
                Some(p) => Settings::load(&p)?,
                None => Settings::default(),
            };

            let mut executor =
                WorkflowExecutor::new(offline::registry(&settings), settings.executor_config())
                    .with_env(settings.env_map());
            if let Some(path) = record {
                executor = executor.with_sink(Arc::new(record::JsonlSink::new(path)));
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, cancelling run");
                    on_interrupt.cancel();
                }
            });

            info!("Running workflow '{}' ({} nodes)", workflow.name, workflow.nodes.len());
            let inputs: Map<String, Value> = inputs.into_iter().collect();
            let result = executor.execute_with_cancel(&workflow, inputs, cancel).await;

            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
