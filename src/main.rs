use anyhow::Result;
use clap::Parser;

use mission_workflow::cli::commands::{Command, ReplayCommand, TransitionsCommand};
use mission_workflow::cli::{Cli, Commands};
use mission_workflow::config::WorkflowConfig;
use mission_workflow::observability::workflow_metrics;
use mission_workflow::telemetry::{init_telemetry, shutdown_telemetry};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = WorkflowConfig::load_env_file();
    let config = match &cli.config {
        Some(path) => WorkflowConfig::load_from(path)?,
        None => {
            mission_workflow::init_config()?;
            mission_workflow::config()?.clone()
        }
    };
    // Fails only when a global subscriber is already set
    let _ = init_telemetry(&config.observability);

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            Commands::Replay { file } => ReplayCommand::new(file, config).execute().await,
            Commands::Transitions { subject, from, to } => {
                TransitionsCommand::new(subject, from, to).execute().await
            }
        }
    });

    workflow_metrics().log_stats();
    shutdown_telemetry();
    result
}
