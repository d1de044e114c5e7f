//! kcfy-gen - KeyChainify generation service
//!
//! Turns a song description into a text-to-3D prompt, generates a model
//! (remote task or procedural primitive) and exports it as STL.
//!
//! - `kcfy-gen serve` runs the HTTP API (default port 5780)
//! - `kcfy-gen generate --input "<text>"` runs one generation and prints
//!   the resulting form state as JSON

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kcfy_common::config::{load_config, GenerationMode, LoggingConfig};
use kcfy_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use kcfy_gen::config::GeneratorConfig;
use kcfy_gen::services::GenerationOrchestrator;
use kcfy_gen::viewer::{HttpAssetLoader, ModelViewer};
use kcfy_gen::AppState;

/// Event bus capacity
const EVENT_CAPACITY: usize = 100;

/// Command-line arguments for kcfy-gen
#[derive(Parser, Debug)]
#[command(name = "kcfy-gen")]
#[command(about = "KeyChainify: music-inspired 3D keychain generator")]
#[command(version)]
struct Cli {
    /// Path to TOML config file
    #[arg(short, long, global = true, env = "KCFY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long, env = "KCFY_PORT")]
        port: Option<u16>,
    },

    /// Run one generation and print the result
    Generate {
        /// Song title, link or lyrics (10-1000 characters)
        #[arg(short, long)]
        input: String,

        /// Derive a procedural shape instead of calling the text-to-3D API
        #[arg(long)]
        procedural: bool,

        /// Write the resulting model to this STL file
        #[arg(long, value_name = "FILE")]
        stl: Option<PathBuf>,

        /// Write ASCII STL instead of binary
        #[arg(long, requires = "stl")]
        ascii: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging starts before the config is read; the configured level
    // replaces the default once known
    let env_filter = EnvFilter::try_from_default_env().ok();
    let level_from_env = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| EnvFilter::new(log_filter(&LoggingConfig::default().level))),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let toml = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if !level_from_env {
        filter_handle
            .reload(EnvFilter::new(log_filter(&toml.logging.level)))
            .context("Failed to apply configured log level")?;
    }

    let config = GeneratorConfig::resolve(toml);

    match cli.command {
        Command::Serve { port } => serve(config, port).await,
        Command::Generate {
            input,
            procedural,
            stl,
            ascii,
        } => generate(config, &input, procedural, stl, ascii).await,
    }
}

/// Filter used when RUST_LOG is unset
fn log_filter(level: &str) -> String {
    format!("kcfy_gen={level},kcfy_common={level},tower_http={level}")
}

async fn serve(config: GeneratorConfig, port: Option<u16>) -> Result<()> {
    let addr = config.socket_addr(port)?;

    info!("Starting kcfy-gen (KeyChainify) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Generation mode: {:?}", config.default_mode());

    let event_bus = EventBus::new(EVENT_CAPACITY);
    let orchestrator = GenerationOrchestrator::from_config(&config, event_bus);

    let mut viewer = ModelViewer::new(Arc::new(HttpAssetLoader::new()?));
    viewer.show(None).await?;

    let state = AppState::new(orchestrator, viewer, config.default_mode());
    let app = kcfy_gen::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn generate(
    config: GeneratorConfig,
    input: &str,
    procedural: bool,
    stl: Option<PathBuf>,
    ascii: bool,
) -> Result<()> {
    let mode = if procedural {
        GenerationMode::Procedural
    } else {
        config.default_mode()
    };

    let orchestrator = GenerationOrchestrator::from_config(&config, EventBus::new(EVENT_CAPACITY));

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let report = orchestrator.run(input, mode, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&report.form)?);

    if let Some(message) = &report.form.error {
        bail!("Generation failed: {}", message);
    }

    if let Some(path) = stl {
        let model = report
            .form
            .model_data()
            .context("Generation produced no model")?;

        let mut viewer = ModelViewer::new(Arc::new(HttpAssetLoader::new()?));
        viewer.show(Some(&model)).await?;

        let contents = if ascii {
            viewer.export_ascii_stl().map(String::into_bytes)
        } else {
            viewer.export_stl()
        }
        .context("No model displayed")?;

        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("STL written to {}", path.display());
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_covers_service_crates() {
        assert_eq!(
            log_filter("debug"),
            "kcfy_gen=debug,kcfy_common=debug,tower_http=debug"
        );
    }
}
