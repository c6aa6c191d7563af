mod config;
mod notification_handler;
mod sse_handler;
mod state;
mod tracking_handler;
mod ws_handler;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let test_mode = std::env::var("TEST_MODE")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let config = if test_mode {
        tracing::info!("Running in TEST MODE");
        AppConfig::test_config()
    } else {
        AppConfig::load()?
    };

    tracing::info!(
        instance_id = %config.server.instance_id,
        port = config.server.port,
        staleness_secs = config.tracking.staleness_secs,
        heartbeat_secs = config.realtime.heartbeat_secs,
        "Shiptrack starting"
    );

    let state = AppState::new(&config);
    let cancel = CancellationToken::new();

    // SSE heartbeat tick, shared by every open stream
    let heartbeat_publisher = state.publisher.clone();
    let heartbeat_cancel = cancel.clone();
    let heartbeat_interval = tokio::time::Duration::from_secs(config.realtime.heartbeat_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(heartbeat_interval);
        loop {
            tokio::select! {
                _ = heartbeat_cancel.cancelled() => break,
                _ = interval.tick() => heartbeat_publisher.send_heartbeat(),
            }
        }
    });

    // dead-connection cleanup and carrier health re-evaluation
    let cleanup_state = state.clone();
    let cleanup_cancel = cancel.clone();
    let cleanup_interval = tokio::time::Duration::from_secs(config.realtime.cleanup_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            tokio::select! {
                _ = cleanup_cancel.cancelled() => break,
                _ = interval.tick() => {
                    cleanup_state.publisher.cleanup_dead_subscribers();
                    cleanup_state.gateway.cleanup_dead_connections();
                    cleanup_state.aggregator.registry().refresh_health();
                    tracing::debug!(
                        sse_subscribers = cleanup_state.publisher.subscriber_count(),
                        ws_connections = cleanup_state.gateway.connection_count(),
                        "connection status"
                    );
                }
            }
        }
    });

    // notification expiry sweep
    let sweep_dispatcher = state.dispatcher.clone();
    let sweep_cancel = cancel.clone();
    let sweep_interval =
        tokio::time::Duration::from_secs(config.notifications.expiry_sweep_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            tokio::select! {
                _ = sweep_cancel.cancelled() => break,
                _ = interval.tick() => {
                    let purged = sweep_dispatcher.purge_expired().await;
                    if purged > 0 {
                        tracing::info!(purged = purged, "expired notifications removed");
                    }
                }
            }
        }
    });

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ready", get(|| async { "READY" }))
        .route("/tracking/track", get(tracking_handler::track))
        .route("/tracking/batch", post(tracking_handler::track_batch))
        .route("/tracking/carriers", get(tracking_handler::list_carriers))
        .route("/tracking/health", get(tracking_handler::health))
        .route(
            "/tracking/events/{tracking_number}",
            get(sse_handler::tracking_events),
        )
        .route("/ws", get(ws_handler::ws_connect))
        .route(
            "/notifications",
            post(notification_handler::create).get(notification_handler::list),
        )
        .route(
            "/notifications/{id}/read",
            post(notification_handler::mark_read),
        )
        .route(
            "/notifications/{id}/archive",
            post(notification_handler::archive),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let cancel_for_shutdown = cancel.clone();
    let shutdown_signal = async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl+C"),
            _ = terminate => tracing::info!("Received SIGTERM"),
        }

        cancel_for_shutdown.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    cancel.cancel();
    tracing::info!("Shiptrack shutdown complete");

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shiptrack=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
