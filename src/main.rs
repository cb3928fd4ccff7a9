//! CLI entry point for the Mott readout controller.
//!
//! Provides:
//! - `validate`: load and validate a module configuration file
//! - `simulate`: run download / prestart / go / trigger / end against the
//!   simulated crate
//!
//! # Usage
//!
//! ```bash
//! mott-roc validate config/uitf_mott.toml --json
//! mott-roc simulate --events 1000 --run-type integrating
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mott_daq::logging;
use mott_daq::prelude::*;
use mott_daq::settings::RocSettings;
use mott_daq::simulation::{mock_controller, RunSummary};
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mott-roc")]
#[command(about = "Readout controller for the UITF Mott polarimeter", long_about = None)]
struct Cli {
    /// Application settings file (defaults to config/roc.toml if present)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a module configuration file
    Validate {
        /// Configuration file (defaults to the one in the settings)
        config: Option<PathBuf>,

        /// Print the validated configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run against the simulated crate
    Simulate {
        /// Configuration file (defaults to the one in the settings)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of triggers; runs until Ctrl-C when omitted
        #[arg(long)]
        events: Option<u64>,

        /// Run type (counting or integrating)
        #[arg(long)]
        run_type: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = RocSettings::load(cli.settings.as_deref())?;
    logging::init_from_settings(&settings)?;

    match cli.command {
        Commands::Validate { config, json } => {
            validate_file(config.unwrap_or_else(|| settings.config_path.clone()), json)
        }
        Commands::Simulate {
            config,
            events,
            run_type,
        } => {
            let config = config.unwrap_or_else(|| settings.config_path.clone());
            let run_type = run_type.unwrap_or_else(|| settings.run_type.clone());
            simulate(&settings, config, &run_type, events).await
        }
    }
}

fn validate_file(path: PathBuf, json: bool) -> Result<()> {
    let tree = load_config_tree(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let run = validate(&tree).with_context(|| format!("{} is not valid", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        for (name, value) in run.parameters() {
            println!("{name} = {value}");
        }
    }
    info!(path = %path.display(), "Configuration valid");
    Ok(())
}

async fn simulate(
    settings: &RocSettings,
    config: PathBuf,
    run_type: &str,
    events: Option<u64>,
) -> Result<()> {
    let mut roc = mock_controller(settings);

    roc.download(&config, run_type)
        .with_context(|| format!("Download failed for {}", config.display()))?;
    let prestart = roc.prestart().context("Prestart failed")?;
    info!(words = prestart.len(), "Prestart configuration event");
    roc.go().context("Go failed")?;

    let mut summary = RunSummary::default();
    let mut ticker = tokio::time::interval(Duration::from_millis(
        settings.simulation.trigger_interval_ms.max(1),
    ));
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if events.is_some_and(|n| summary.events >= n) {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {
                let event = roc.trigger()?;
                summary.record(&event);
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "Ctrl-C handler failed");
                }
                info!("Interrupted, ending run");
                break;
            }
        }
    }

    let blocks = roc.end().context("End failed")?;
    info!(
        blocks,
        events = summary.events,
        bytes = summary.bytes,
        sync_events = summary.sync_events,
        faulted_events = summary.faulted_events,
        "Run ended"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
