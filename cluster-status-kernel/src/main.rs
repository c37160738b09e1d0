/**
 * CLUSTER STATUS KERNEL - Point d'entrée du serveur de monitoring
 *
 * RÔLE : Bootstrap : logging, config (env + .env), storage, HTTP.
 * Le kernel ne calcule rien : un collecteur externe écrit les mesures
 * dans le storage, le kernel les relit et les sert en JSON.
 *
 * ARCHITECTURE : Storage pluggable (fichiers JSON / MySQL) + API REST Axum.
 */

mod config;
mod handlers;
mod http;
mod models;
mod state;
mod storage;

use crate::config::Config;
use crate::state::AppState;
use crate::storage::open_storage;

use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env avant le logging pour que RUST_LOG puisse y être défini
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env");
        }
    }

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(?config, "configuration loaded");

    // storage injoignable => on refuse de démarrer
    let storage = open_storage(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend(), "storage initialized");

    let app = http::build_router(AppState::new(storage.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    storage.close().await.context("failed to close storage")?;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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
    tracing::info!("shutdown signal received");
}
