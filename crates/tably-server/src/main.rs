use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tably_server::{AppConfig, AppState, router, tasks};
use tracing_subscriber::EnvFilter;

/// Tably backend server.
#[derive(Debug, Parser)]
#[command(name = "tably-server", version, about)]
struct Args {
    /// Path to the configuration file.
    #[arg(long, env = "TABLY_CONFIG", default_value = "tably.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(Some(&args.config))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    tracing::info!(config = %args.config.display(), "configuration loaded");

    let state = AppState::from_config(&config)?;

    tasks::spawn_compaction(
        Arc::clone(&state.sessions),
        config.auth.compaction_interval,
    );

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    tracing::info!(listen = %config.server.listen, "server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
    }
}
