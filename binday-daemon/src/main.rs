//! `binday`: keeps Armagh Banbridge Craigavon bin collection dates in a calendar.

mod app;
mod cli;
mod report;

use std::future;
use std::io;

use anyhow::{Context, Result};
use binday_core::config::Config;
use binday_core::store::EventStore;
use clap::Parser;
use tokio::fs;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command.clone().unwrap_or(Command::Run) {
        Command::Run => {
            let coordinator = app::coordinator(&load_config(&cli)?)?;
            coordinator.run(shutdown_signal()).await?;
        }
        Command::Once => {
            let mut coordinator = app::coordinator(&load_config(&cli)?)?;
            coordinator.run_cycle().await?;
            report::write_sensors(&mut io::stdout().lock(), coordinator.latest().as_ref())?;
        }
        Command::Clear => {
            app::coordinator(&load_config(&cli)?)?.clear_events().await?;
            info!("Cleared stored bin collection events");
        }
        Command::Events => {
            let store = EventStore::load(load_config(&cli)?.storage.path).await?;
            report::write_events(&mut io::stdout().lock(), &store)?;
        }
        Command::Parse { file } => {
            let html = fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            report::write_schedule(&mut io::stdout().lock(), &binday_provider_abc::extract(&html))?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config_path();
    let config = Config::from_file(&path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        "Starting binday"
    );
    Ok(config)
}

fn init_tracing(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(fmt::layer().json().with_writer(io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(io::stderr)).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for Ctrl-C");
        future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
