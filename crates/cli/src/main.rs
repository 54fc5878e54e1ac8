use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nodeflow_core::WorkflowExecutor;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

mod capabilities;
mod config;

use capabilities::{dry_run_tools, DryRunAgent};
use config::CliConfig;

#[derive(Parser, Debug)]
#[command(name = "nodeflow")]
#[command(about = "Validate, run and export graph-based agent workflows", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "nodeflow.toml", env = "NODEFLOW_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a workflow definition for structural errors
    Validate {
        /// Workflow definition (JSON)
        graph: PathBuf,
    },
    /// Execute a workflow with a dry-run agent and an echo tool
    Run {
        /// Workflow definition (JSON)
        graph: PathBuf,

        /// Initial input, parsed as JSON and falling back to a plain string
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Print a workflow as a reusable template
    Export {
        /// Workflow definition (JSON)
        graph: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nodeflow=info,nodeflow_core=info".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = CliConfig::load(&args.config)?;

    let executor = WorkflowExecutor::new(Arc::new(DryRunAgent), Arc::new(dry_run_tools()))
        .with_config(config.engine);

    match args.command {
        Command::Validate { graph } => {
            let definition = read_definition(&graph)?;
            let report = executor.validate(&definition);
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(exit_code(report.valid))
        }
        Command::Run { graph, input } => {
            let definition = read_definition(&graph)?;
            let input = input.map(|raw| parse_input(&raw));

            tracing::info!("Running workflow {}", graph.display());
            let outcome = executor.execute(&definition, input).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(exit_code(outcome.is_success()))
        }
        Command::Export { graph } => {
            let definition = read_definition(&graph)?;
            let template = executor
                .export_template(&definition)
                .context("Failed to export template")?;
            println!("{}", template);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_definition(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse workflow file {}", path.display()))
}

fn parse_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
