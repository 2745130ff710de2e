//! Backend for a matrimonial matchmaking site.
//!
//! # Layout
//! - `domain`: profile aggregate, wizard steps, privacy projection
//! - `db`: repository ports with Postgres and in-memory backends
//! - `service`: use cases, one service per area
//! - `api`: axum handlers and the router
//! - `realtime`: websocket hub for chat and call signaling
//!
//! # Running
//! ```sh
//! JWT_SECRET=dev POSTGRES_URI=postgres://localhost/vivaha cargo run
//! ```
//! Without a database URL the server keeps everything in memory.

use std::sync::Arc;

use axum::Router;
use tokio::signal::{self, ctrl_c};
use tracing::info;

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod realtime;
pub mod service;
pub mod state;

use config::Config;
use db::{connection, memory::MemoryStore, postgres::PgStore, repo::Stores};
use state::AppState;

pub fn build_router(state: AppState) -> Router {
    api::router(state)
}

/// Picks the storage backend from the configuration, migrating Postgres when used.
pub async fn open_stores(config: &Config) -> anyhow::Result<Stores> {
    match &config.database_url {
        Some(url) => {
            let pool = connection::connect(url, config.database_max_connections).await?;
            connection::migrate(&pool).await?;
            Ok(Stores::from_backend(Arc::new(PgStore::new(pool))))
        }
        None => Ok(Stores::from_backend(Arc::new(MemoryStore::new()))),
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
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
}
