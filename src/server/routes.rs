use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures_util::stream::{self, Stream};
use serde::Serialize;

use super::AppState;
use crate::core::self_monitor::{HealthTier, Snapshot, SubscriberInfo};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    health: HealthTier,
    uptime_sec: u64,
    active_connections: u64,
}

#[derive(Serialize)]
pub struct SubscribersResponse {
    subscribers: Vec<SubscriberInfo>,
    total: usize,
}

pub async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "selfmon",
        "version": env!("CARGO_PKG_VERSION"),
        "pushIntervalMs": state.hub.push_interval().as_millis() as u64,
        "endpoints": {
            "/": "This API index",
            "/api/metrics": "Current snapshot as JSON",
            "/api/stream": "Server-sent events: one snapshot per push interval",
            "/api/subscribers": "Live stream subscribers",
            "/health": "Health check",
        },
    }))
}

pub async fn handle_metrics(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.monitor().snapshot_async().await)
}

pub async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.monitor().snapshot_async().await;
    Json(HealthResponse {
        status: "ok",
        health: snapshot.health,
        uptime_sec: snapshot.process_uptime_sec,
        active_connections: snapshot.active_connections,
    })
}

pub async fn handle_subscribers(State(state): State<Arc<AppState>>) -> Json<SubscribersResponse> {
    let subscribers = state.hub.subscribers();
    let total = subscribers.len();
    Json(SubscribersResponse { subscribers, total })
}

/// Stream snapshots as `data: <json>` events until the client goes away.
///
/// Dropping the stream drops the subscription, which unsubscribes it.
pub async fn handle_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.hub.subscribe();

    let events = stream::unfold(subscription, |mut subscription| async move {
        let snapshot = subscription.recv().await?;
        let event = match serde_json::to_string(snapshot.as_ref()) {
            Ok(json) => Event::default().data(json),
            Err(e) => {
                log::debug!("Failed to serialize snapshot: {}", e);
                Event::default().comment("snapshot unavailable")
            }
        };
        Some((Ok(event), subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub async fn handle_not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "not found" })),
    )
}
