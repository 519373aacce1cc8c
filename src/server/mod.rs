//! HTTP transport for the metrics core.
//!
//! Serves the current snapshot as JSON, streams snapshots to subscribers as
//! server-sent events, and accounts every request it handles.

mod middleware;
mod routes;

use std::future::Future;
use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tokio::net::TcpListener;

use crate::core::config::MonitorConfig;
use crate::core::self_monitor::{BroadcastHub, Monitor};
use crate::error::{Result, SelfmonError};

pub use middleware::track_requests;

/// Shared server state.
pub struct AppState {
    pub hub: BroadcastHub,
}

impl AppState {
    pub fn monitor(&self) -> &Monitor {
        self.hub.monitor()
    }
}

/// Build the axum router with request accounting on every route.
pub fn build_router(hub: BroadcastHub) -> Router {
    let state = Arc::new(AppState { hub });

    Router::new()
        .route("/", get(routes::handle_index))
        .route("/api/metrics", get(routes::handle_metrics))
        .route("/api/stream", get(routes::handle_stream))
        .route("/api/subscribers", get(routes::handle_subscribers))
        .route("/health", get(routes::handle_health))
        .fallback(routes::handle_not_found)
        .layer(from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves, then close
/// every subscriber so open event streams end.
pub async fn serve<F>(listener: TcpListener, hub: BroadcastHub, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(hub.clone());
    let hub_for_shutdown = hub.clone();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            log::info!(
                "Shutting down, closing {} subscriber(s)",
                hub_for_shutdown.subscriber_count()
            );
            hub_for_shutdown.shutdown();
        })
        .await
        .map_err(|e| SelfmonError::server(format!("server error: {}", e)))?;

    hub.shutdown();
    Ok(())
}

/// Run the HTTP server described by `config` until Ctrl-C.
pub async fn run_server(config: &MonitorConfig) -> Result<()> {
    config.validate()?;

    let monitor = Monitor::builder()
        .thresholds(config.thresholds)
        .sampling_mode(config.sampling_mode)
        .build();
    let hub = BroadcastHub::new(monitor, config.push_interval());

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SelfmonError::server(format!("failed to bind {}: {}", addr, e)))?;
    log::info!(
        "Listening on http://{} (push every {} ms, {:?} sampling)",
        addr,
        config.push_interval_ms,
        config.sampling_mode
    );

    serve(listener, hub, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
