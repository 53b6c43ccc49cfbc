use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

pub use commands::transitions::Subject;

#[derive(Parser)]
#[command(name = "mission-workflow")]
#[command(about = "Mission and judging-step workflow engine")]
#[command(long_about = "Runs the mission workflow against in-memory storage. Replay a scenario file \
                       to see every transition, derived mission status and notification, or ask \
                       which status transitions are allowed.")]
pub struct Cli {
    /// Configuration file (defaults to mission-workflow.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a JSON scenario of users, products and actions
    Replay {
        /// Scenario file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Show the allowed targets of a status, or check a single transition
    Transitions {
        /// Which state machine to consult
        #[arg(value_enum)]
        subject: Subject,
        /// Current status, e.g. NOT_DONE
        from: String,
        /// Target status; when given the command fails if the move is not allowed
        to: Option<String>,
    },
}
