use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use futures_util::StreamExt;

use super::AppState;

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Report every request's lifecycle to the monitor.
///
/// Received bytes are counted frame by frame as the handler reads the body,
/// so chunked uploads are covered. Bytes sent come from the response body's
/// exact size when known. Streaming responses are counted as ended once
/// their headers are ready.
pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let monitor = state.monitor();
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let handle = monitor.on_request_start(&target);
    let counter = handle.body_counter();
    let body_monitor = monitor.clone();
    let request = request.map(|body| {
        Body::from_stream(body.into_data_stream().inspect(move |frame| {
            if let Ok(bytes) = frame {
                body_monitor.on_body_bytes(counter, bytes.len() as u64);
            }
        }))
    });

    let started = Instant::now();
    let response = next.run(request).await;

    let bytes_out = response
        .body()
        .size_hint()
        .exact()
        .or_else(|| content_length(response.headers()))
        .unwrap_or(0);
    monitor.on_request_end(handle, response.status().as_u16(), started.elapsed(), bytes_out);

    response
}
