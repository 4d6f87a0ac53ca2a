//! Radio broadcast server (radio-server) - Main entry point
//!
//! Serves the home/controller pages, accepts start/stop commands and streams
//! one song live to every connected listener.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use radio_common::config::{ConfigOverrides, RadioConfig};
use radio_common::EventBus;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use radio_server::api::{self, AppContext};
use radio_server::files::FileService;
use radio_server::SessionController;

/// Command-line arguments for radio-server
#[derive(Parser, Debug)]
#[command(name = "radio-server")]
#[command(about = "Live single-song audio broadcast server")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long, env = "RADIO_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "RADIO_PORT")]
    port: Option<u16>,

    /// Directory holding the static pages
    #[arg(long, env = "RADIO_PUBLIC_DIR")]
    public_dir: Option<PathBuf>,

    /// Song broadcast on `start`
    #[arg(short, long, env = "RADIO_SONG")]
    song: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = RadioConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(ConfigOverrides {
            port: args.port,
            public_dir: args.public_dir,
            default_song: args.song,
        });

    // Initialize tracing
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("radio_server={level},radio_common={level},tower_http={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting radio-server v{} on port {}", env!("CARGO_PKG_VERSION"), config.port);
    info!("Public folder: {}", config.public_dir.display());
    info!("Default song: {}", config.default_song.display());

    let events = EventBus::default();
    let controller = Arc::new(SessionController::from_config(&config, events));

    let ctx = AppContext {
        controller,
        files: FileService::new(config.public_dir.clone()),
        port: config.port,
    };

    api::server::run(ctx).await.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
