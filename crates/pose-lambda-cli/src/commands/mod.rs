//! CLI command definitions and handlers.

pub mod invoke;
pub mod models;
pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Pose Lambda - Body and face landmark estimation for images in object storage
#[derive(Parser)]
#[command(name = "pose-lambda")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Custom models directory
    #[arg(long, global = true, value_name = "DIR")]
    pub models_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Run as a Lambda function (default)
    Serve,
    /// Handle a single request locally and print the response
    Invoke(invoke::InvokeArgs),
    /// Manage ML models
    Models(models::ModelsArgs),
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Command completed.
    Success = 0,
    /// Command failed.
    Error = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        Self::from(code as u8)
    }
}
