//! Geisha daemon (geishad) - Main entry point
//!
//! Loads bootstrap configuration, opens the audio output, and serves the
//! control protocol until a client sends `Shutdown` or the process receives
//! SIGINT/SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use geisha_common::config::{
    load_config, resolve_config_path, ConfigOverrides, ConfigSource, OutputBackend,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use geishad::audio::build_output;
use geishad::Daemon;

/// Command-line arguments for geishad
#[derive(Parser, Debug)]
#[command(name = "geishad")]
#[command(about = "Media control daemon for geisha")]
#[command(version)]
struct Args {
    /// Config file (default: <config dir>/geisha/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "GEISHA_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "GEISHA_BIND")]
    bind: Option<String>,

    /// Audio output backend (null or device)
    #[arg(short, long)]
    output: Option<OutputBackend>,

    /// Output device name (device backend only)
    #[arg(short, long)]
    device: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// List output devices and exit
    #[cfg(feature = "device")]
    #[arg(long)]
    list_devices: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_address: self.bind.clone(),
            port: self.port,
            output: self.output,
            device: self.device.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    #[cfg(feature = "device")]
    if args.list_devices {
        for name in geishad::audio::device::list_devices().context("Failed to list devices")? {
            println!("{name}");
        }
        return Ok(());
    }

    let config_path = resolve_config_path(args.config.as_deref());
    let (config, source) =
        load_config(config_path.as_deref()).context("Failed to load configuration")?;
    let config = config.with_overrides(args.overrides());

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = &config.logging.level;
            format!("geishad={level},geisha_common={level}").into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting geishad {}", env!("CARGO_PKG_VERSION"));
    match &source {
        ConfigSource::File(path) => info!("Configuration: {}", path.display()),
        ConfigSource::Missing(path) => {
            warn!("Config file {} not found, using defaults", path.display())
        }
        ConfigSource::NoConfigDir => warn!("No config directory available, using defaults"),
    }

    let output = build_output(config.output, config.device.clone())
        .context("Failed to open audio output")?;

    let daemon = Daemon::start(&config, output)
        .await
        .context("Failed to start daemon")?;

    let shutdown = daemon.shutdown_token();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => shutdown.cancel(),
            _ = shutdown.cancelled() => {}
        }
    });

    daemon.wait().await;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
