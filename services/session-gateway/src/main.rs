mod connect;
mod longpoll;
mod state;
mod ws;

use axum::routing::{get, post};
use axum::Router;
use session_relay::{EngineConfig, Registry, SystemClock};
use state::AppState;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .init();

    let config = match env::var("SESSION_GATEWAY_CONFIG") {
        Ok(path) => EngineConfig::from_toml_file(std::path::Path::new(&path))
            .expect("failed to load config file"),
        Err(_) => EngineConfig::default(),
    };
    let config = Arc::new(config);

    let registry = Arc::new(Registry::new(
        Arc::new(SystemClock),
        config.lock_timeout,
        config.max_soft_entries,
    ));

    let state = AppState {
        registry: registry.clone(),
        config: config.clone(),
    };

    spawn_background_tasks(registry.clone(), config.clone());

    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let router = Router::new()
        .route("/session/:user", post(connect::handler))
        .route("/ws/:user/:guid", get(ws::handler))
        .route("/poll/:user/:guid", get(longpoll::handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "session-gateway listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // A final tick closes out any batch attachment still waiting past its
    // deadline with an empty response instead of leaving it to time out
    // against a process that's no longer there to answer it.
    registry.tick_all().await;
    info!("session-gateway shut down gracefully");
}

/// Periodically ticks every session (pings idle frame attachments,
/// closes out idle batch attachments, expires queue entries) and reaps
/// sessions that have sat detached and empty past their grace window.
fn spawn_background_tasks(registry: Arc<Registry>, config: Arc<EngineConfig>) {
    let tick_registry = registry.clone();
    let tick_interval = config.ping_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_interval);
        loop {
            interval.tick().await;
            tick_registry.tick_all().await;
        }
    });

    let reap_registry = registry;
    let reap_grace = config.reap_grace_window;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(30));
        loop {
            interval.tick().await;
            reap_registry.reap(reap_grace).await;
        }
    });
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
