use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use vivaha_server::{build_router, config::Config, open_stores, shutdown_signal, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    info!("Initializing state...");
    let stores = open_stores(&config).await.context("opening storage")?;
    let address = format!("0.0.0.0:{}", config.port);
    let state = AppState::new(config, stores);
    state.auth.throttle().spawn_pruning(Duration::from_secs(60));
    let app = build_router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    info!("Server shut down");
    Ok(())
}
