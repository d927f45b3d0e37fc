//! # chorus-agent
//!
//! Chorus relay binary: loads settings, sets up logging and metrics, and
//! runs the HTTP/WebSocket server until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use chorus_logging::LoggingOptions;
use chorus_server::{ChorusServer, ServerConfig};
use chorus_settings::ChorusSettings;
use clap::Parser;

/// Chorus dialogue relay server.
#[derive(Parser, Debug)]
#[command(name = "chorus", about = "Real-time multi-client dialogue relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.chorus/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log file (overrides settings).
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level or filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,

    /// Disable the log file.
    #[arg(long, conflicts_with = "log_file")]
    no_log_file: bool,
}

impl Cli {
    /// Load layered settings and apply command-line overrides on top.
    fn resolve_settings(&self) -> Result<ChorusSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(chorus_settings::settings_path);
        let mut settings = chorus_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        self.apply(&mut settings);
        Ok(settings)
    }

    fn apply(&self, settings: &mut ChorusSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(file) = &self.log_file {
            settings.logging.file = Some(file.display().to_string());
        }
        if self.no_log_file {
            settings.logging.file = None;
        }
    }
}

fn logging_options(settings: &ChorusSettings) -> LoggingOptions {
    LoggingOptions {
        level: settings.logging.level.clone(),
        json: settings.logging.json,
        file: settings.logging.file_path().map(PathBuf::from),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    // Loader warnings land on stderr until the real subscriber is up.
    let settings = chorus_logging::with_bootstrap(|| args.resolve_settings())?;

    chorus_logging::init_subscriber(&logging_options(&settings))
        .context("Failed to initialize logging")?;

    let metrics = chorus_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = ChorusServer::new(ServerConfig::from(&settings)).with_metrics(metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("Chorus relay listening on http://{addr} (ws://{addr}/ws?user_id=...)");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    server.shutdown().shutdown();
    let _ = handle.await;
    tracing::info!("Shutdown complete");
    Ok(())
}
