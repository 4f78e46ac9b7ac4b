//! Models command - manage ML models.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pose_lambda_adapters::models::{
    all_models_installed, ensure_models, list_models as adapter_list_models, ProgressCallback,
    MODELS,
};

use crate::config::{AppConfig, MODELS_URL_ENV};

/// Arguments for the models command
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Models subcommands
#[derive(Subcommand)]
pub enum ModelsCommand {
    /// Download missing models
    Fetch {
        /// Base URL to download model files from
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
    /// List installed models
    List,
    /// Print model directory path
    Path,
}

/// Run the models command.
pub fn run(args: &ModelsArgs, config: &AppConfig) -> Result<()> {
    let dir = config.models_dir();
    match &args.command {
        ModelsCommand::Fetch { base_url } => {
            if all_models_installed(&dir) {
                println!("All models already installed in {}", dir.display());
                return Ok(());
            }
            let base_url = base_url
                .as_deref()
                .or(config.models.base_url.as_deref())
                .with_context(|| {
                    format!("No download URL: pass --base-url, set models.base_url or {MODELS_URL_ENV}")
                })?;
            fetch_models(&dir, base_url)
        }
        ModelsCommand::List => {
            list_models(&dir);
            Ok(())
        }
        ModelsCommand::Path => {
            println!("{}", dir.display());
            Ok(())
        }
    }
}

fn fetch_models(dir: &Path, base_url: &str) -> Result<()> {
    let pb = Arc::new(ProgressBar::new(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")
            .map_err(|e| anyhow::anyhow!("Invalid progress template: {e}"))?
            .progress_chars("#>-"),
    );

    let current_model: Arc<Mutex<String>> = Arc::new(Mutex::new(String::new()));
    let pb_clone = Arc::clone(&pb);
    let model_clone = Arc::clone(&current_model);

    let progress: ProgressCallback =
        Box::new(move |name: &str, downloaded: u64, total: Option<u64>| {
            let is_new_model = {
                let mut current = model_clone
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if *current == name {
                    false
                } else {
                    *current = name.to_string();
                    true
                }
            };
            if is_new_model {
                pb_clone.set_length(total.unwrap_or(0));
                pb_clone.set_message(name.to_string());
            }
            pb_clone.set_position(downloaded);
        });

    ensure_models(dir, base_url, Some(&progress))?;

    pb.finish_with_message("All models downloaded");
    Ok(())
}

fn list_models(dir: &Path) {
    let models = adapter_list_models(dir);

    println!("Models directory: {}", dir.display());
    println!();

    for (name, installed) in &models {
        let status = if *installed { "✓" } else { "✗" };
        let info = MODELS.iter().find(|m| m.name == name);
        let filename = info.map_or("unknown", |m| m.filename);
        println!("  {status} {name} ({filename})");
    }

    println!();
    let installed_count = models.iter().filter(|(_, installed)| *installed).count();
    println!("{}/{} models installed", installed_count, models.len());
}
