pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod models;
pub mod storefront;

#[cfg(test)]
mod tests;

use api::AppState;
use config::Config;
use db::Database;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Start the HTTP server and run until Ctrl+C or SIGTERM.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before reading RUST_LOG
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, db = %config.db_path.display(), "Starting LunaDine");

    let db = Database::new(&config.db_path);
    db.initialize()?;
    if config.seed_demo && db.seed_demo_data()? {
        info!("Demo catalog loaded");
    }

    let app = api::router(AppState::new(db));

    let listener = TcpListener::bind(config.addr).await?;
    info!("Listening on http://{}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
