//! mbcomp CLI Application

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use mbcomp_core::{Band, ConfigManager, MbcompConfig, SharedParameters};
use mbcomp_infra::{render_file, RenderReport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mbcomp")]
#[command(about = "A three-band multiband compressor", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a WAV file through the compressor
    Render {
        input: PathBuf,
        output: PathBuf,

        /// Config file to read parameters from (defaults to the user config)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Frames per processing block
        #[arg(long)]
        block_size: Option<usize>,

        /// Input gain override in dB
        #[arg(long, allow_hyphen_values = true)]
        gain_in: Option<f32>,

        /// Output gain override in dB
        #[arg(long, allow_hyphen_values = true)]
        gain_out: Option<f32>,

        /// Pass audio through untouched
        #[arg(long)]
        bypass: bool,

        /// Print the render report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the factory default configuration
    InitConfig {
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn manager_for(path: Option<PathBuf>) -> anyhow::Result<ConfigManager> {
    match path {
        Some(path) => Ok(ConfigManager::with_file(path)),
        None => Ok(ConfigManager::user_default()?),
    }
}

/// An explicit config file must load cleanly; the user default may be absent
async fn load_config(path: Option<&Path>) -> anyhow::Result<MbcompConfig> {
    match path {
        Some(path) => MbcompConfig::load_from_file(path)
            .await
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(ConfigManager::user_default()?.load().await),
    }
}

fn log_report(report: &RenderReport) {
    info!(
        frames = report.frames,
        blocks = report.blocks,
        input_peak = report.input_peak,
        output_peak = report.output_peak,
        "Render finished"
    );
    for band in Band::ALL {
        info!(
            band = %band,
            peak_reduction_db = report.peak_reduction(band),
            "Gain reduction"
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Command::Render {
            input,
            output,
            config,
            block_size,
            gain_in,
            gain_out,
            bypass,
            json,
        } => {
            let config = load_config(config.as_deref()).await?;

            let mut parameters = config.parameters;
            if let Some(db) = gain_in {
                parameters.gain_in_db = db;
            }
            if let Some(db) = gain_out {
                parameters.gain_out_db = db;
            }
            parameters.master_bypass |= bypass;

            let block_size = block_size.unwrap_or(config.engine.block_size);
            if block_size == 0 {
                bail!("block size must be at least 1 frame");
            }

            let shared = Arc::new(SharedParameters::from_parameters(&parameters));
            let report = tokio::task::spawn_blocking(move || {
                render_file(&input, &output, shared, block_size)
            })
            .await??;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                log_report(&report);
            }
        }

        Command::InitConfig { path, force } => {
            let manager = manager_for(path)?;
            if manager.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    manager.config_path().display()
                );
            }
            manager.save(&MbcompConfig::factory_default()).await?;
            info!(path = %manager.config_path().display(), "Wrote default configuration");
        }

        Command::ShowConfig { path } => {
            let manager = manager_for(path)?;
            let config = manager.load().await;
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}
