//! Process-wide request and traffic counters.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::window::{SlidingWindowCounter, PER_HOUR, PER_MINUTE};

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

/// Token returned by [`MetricsState::record_request_start`] and consumed by
/// [`MetricsState::record_request_end`].
#[derive(Debug)]
pub struct RequestHandle {
    origin: u64,
    endpoint: String,
    started_at_millis: i64,
}

impl RequestHandle {
    /// Normalized path the request was counted under.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Wall-clock start time in Unix milliseconds.
    pub fn started_at_millis(&self) -> i64 {
        self.started_at_millis
    }

    /// Copyable tag for attributing body bytes from wherever the body is read.
    pub fn body_counter(&self) -> BodyCounter {
        BodyCounter {
            origin: self.origin,
        }
    }
}

/// Tag minted from a [`RequestHandle`]; only good for counting received bytes.
#[derive(Debug, Clone, Copy)]
pub struct BodyCounter {
    origin: u64,
}

/// Plain-value copy of the counters at one instant, with window counts
/// already pruned against the read time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficReading {
    pub total_requests: u64,
    pub total_response_time_ms: u64,
    pub min_response_time_ms: Option<u64>,
    pub max_response_time_ms: u64,
    pub error_count: u64,
    pub status_code_counts: BTreeMap<String, u64>,
    pub endpoint_counts: BTreeMap<String, u64>,
    pub total_bytes_received: u64,
    pub total_bytes_sent: u64,
    pub active_connections: u64,
    pub last_request_at: Option<i64>,
    pub requests_last_minute: u64,
    pub requests_last_hour: u64,
}

/// Mutable counters accumulated from request events.
///
/// All updates are in-memory and never fail. Malformed calls are logged and
/// leave the counters untouched.
#[derive(Debug)]
pub struct MetricsState {
    id: u64,
    total_requests: u64,
    total_response_time_ms: u64,
    min_response_time_ms: Option<u64>,
    max_response_time_ms: u64,
    error_count: u64,
    status_code_counts: HashMap<String, u64>,
    endpoint_counts: HashMap<String, u64>,
    total_bytes_received: u64,
    total_bytes_sent: u64,
    active_connections: u64,
    last_request_at: Option<i64>,
    per_minute: SlidingWindowCounter,
    per_hour: SlidingWindowCounter,
}

impl MetricsState {
    pub fn new() -> Self {
        Self {
            id: NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed),
            total_requests: 0,
            total_response_time_ms: 0,
            min_response_time_ms: None,
            max_response_time_ms: 0,
            error_count: 0,
            status_code_counts: HashMap::new(),
            endpoint_counts: HashMap::new(),
            total_bytes_received: 0,
            total_bytes_sent: 0,
            active_connections: 0,
            last_request_at: None,
            per_minute: SlidingWindowCounter::new(PER_MINUTE),
            per_hour: SlidingWindowCounter::new(PER_HOUR),
        }
    }

    /// Count a new request against `url`.
    ///
    /// `now_millis` stamps `lastRequestAt`; `monotonic_millis` feeds the
    /// sliding windows.
    pub fn record_request_start(
        &mut self,
        url: &str,
        now_millis: i64,
        monotonic_millis: u64,
    ) -> RequestHandle {
        let endpoint = normalize_path(url);

        self.total_requests += 1;
        *self.endpoint_counts.entry(endpoint.clone()).or_insert(0) += 1;
        self.per_minute.record(monotonic_millis);
        self.per_hour.record(monotonic_millis);
        self.last_request_at = Some(now_millis);

        RequestHandle {
            origin: self.id,
            endpoint,
            started_at_millis: now_millis,
        }
    }

    /// Accumulate request body bytes as the transport reads them.
    pub fn record_bytes_received(&mut self, handle: &RequestHandle, bytes: u64) {
        self.record_body_bytes(handle.body_counter(), bytes);
    }

    /// Same as [`MetricsState::record_bytes_received`], keyed by a body counter.
    pub fn record_body_bytes(&mut self, counter: BodyCounter, bytes: u64) {
        if counter.origin != self.id {
            log::warn!("Ignoring bytes received for a request this monitor did not start");
            return;
        }
        self.total_bytes_received += bytes;
    }

    /// Record the outcome of a request started with `record_request_start`.
    pub fn record_request_end(
        &mut self,
        handle: RequestHandle,
        status_code: u16,
        elapsed: Duration,
        bytes_out: u64,
    ) {
        if !self.owns(&handle) {
            log::warn!(
                "Ignoring completion of {} started by another monitor",
                handle.endpoint
            );
            return;
        }
        if !(100..=599).contains(&status_code) {
            log::warn!(
                "Ignoring completion of {} with invalid status code {}",
                handle.endpoint,
                status_code
            );
            return;
        }

        let elapsed_ms = elapsed.as_millis() as u64;

        *self
            .status_code_counts
            .entry(status_code.to_string())
            .or_insert(0) += 1;
        self.total_response_time_ms += elapsed_ms;
        self.min_response_time_ms = Some(
            self.min_response_time_ms
                .map_or(elapsed_ms, |min| min.min(elapsed_ms)),
        );
        self.max_response_time_ms = self.max_response_time_ms.max(elapsed_ms);
        if status_code >= 400 {
            self.error_count += 1;
        }
        self.total_bytes_sent += bytes_out;
    }

    pub fn subscriber_connected(&mut self) {
        self.active_connections += 1;
    }

    pub fn subscriber_disconnected(&mut self) {
        self.active_connections = self.active_connections.saturating_sub(1);
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    /// Copy the counters out, pruning both windows against `monotonic_millis`.
    pub fn read(&mut self, monotonic_millis: u64) -> TrafficReading {
        TrafficReading {
            total_requests: self.total_requests,
            total_response_time_ms: self.total_response_time_ms,
            min_response_time_ms: self.min_response_time_ms,
            max_response_time_ms: self.max_response_time_ms,
            error_count: self.error_count,
            status_code_counts: self
                .status_code_counts
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            endpoint_counts: self
                .endpoint_counts
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            total_bytes_received: self.total_bytes_received,
            total_bytes_sent: self.total_bytes_sent,
            active_connections: self.active_connections,
            last_request_at: self.last_request_at,
            requests_last_minute: self.per_minute.count_in_window(monotonic_millis) as u64,
            requests_last_hour: self.per_hour.count_in_window(monotonic_millis) as u64,
        }
    }

    fn owns(&self, handle: &RequestHandle) -> bool {
        handle.origin == self.id
    }
}

impl Default for MetricsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Reduce a request target to the path used as the endpoint key.
///
/// Query string and fragment are dropped, and a trailing slash is removed
/// except on the root.
pub fn normalize_path(url: &str) -> String {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();

    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
