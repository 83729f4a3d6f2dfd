//! Encore Player (encore-player) - Main entry point
//!
//! Runs the multi-guild playback orchestrator behind its HTTP/SSE control
//! API. Voice output uses the headless transport; a chat gateway drives the
//! same API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use encore_common::config::TomlConfig;
use encore_player::api::{self, AppContext};
use encore_player::session::{SelectionOffers, SessionRegistry};
use encore_player::transport::{HeadlessTransport, VoiceTransport};
use encore_player::SourceResolver;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for encore-player
#[derive(Parser, Debug)]
#[command(name = "encore-player")]
#[command(about = "Multi-guild audio playback orchestrator")]
#[command(version)]
struct Args {
    /// Config file (overrides ENCORE_CONFIG and the OS default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "ENCORE_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let (config, config_path) =
        TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(&config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port = args.port.unwrap_or(config.port);
    info!("Starting Encore player on port {}", port);
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    let resolver = Arc::new(
        SourceResolver::from_config(&config).context("Failed to initialize source resolver")?,
    );
    let transport: Arc<dyn VoiceTransport> = Arc::new(HeadlessTransport::new());
    let registry = Arc::new(SessionRegistry::new(
        transport,
        resolver.clone(),
        config.playback.clone(),
    ));
    let offers = Arc::new(SelectionOffers::new(Duration::from_secs(
        config.playback.selection_timeout_secs,
    )));
    info!(
        idle_disconnect_secs = config.playback.idle_disconnect_secs,
        skip_failed_tracks = config.playback.skip_failed_tracks,
        "Session registry initialized"
    );

    let ctx = AppContext {
        registry: Arc::clone(&registry),
        resolver,
        offers,
        search_results: config.playback.search_results,
    };

    api::serve(ctx, port, shutdown_signal())
        .await
        .context("Server error")?;

    registry.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Filter used when `RUST_LOG` is unset
///
/// A bare level applies to the Encore crates; anything containing a directive
/// separator is used verbatim.
fn default_filter(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("encore_player={0},encore_common={0},tower_http=info", level)
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
