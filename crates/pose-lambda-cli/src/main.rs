//! Pose Lambda CLI - Lambda entry point and local tooling.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;

use commands::{Cli, Commands, ExitCode};
use config::AppConfig;

/// Set by the Lambda execution environment.
const LAMBDA_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    // CloudWatch does not render colours
    let in_lambda = std::env::var_os(LAMBDA_ENV).is_some();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!in_lambda),
        )
        .with(filter)
        .init();

    let mut config = AppConfig::load();
    if let Some(dir) = cli.models_dir {
        config.models.dir = Some(dir);
    }

    let result = match cli.command {
        None | Some(Commands::Serve) => commands::serve::run(&config),
        Some(Commands::Invoke(ref args)) => commands::invoke::run(args, &config),
        Some(Commands::Models(ref args)) => commands::models::run(args, &config),
    };

    let exit_code = match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::Error
        }
    };

    exit_code.into()
}
