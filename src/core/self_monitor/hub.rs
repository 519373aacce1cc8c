//! Multi-subscriber push streaming.
//!
//! Each subscriber gets an immediate snapshot on subscribe and then one
//! freshly built snapshot per interval from its own timer task. Delivery is
//! fire-and-forget over an unbounded channel; a dead receiver counts as a
//! disconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use super::monitor::Monitor;
use super::sampler::{CpuSamplingLoop, SamplingMode};
use super::snapshot::Snapshot;

/// Push interval used when none is configured.
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a subscriber. `Closed` is terminal.
///
/// `Connecting` covers id allocation up to registration. `subscribe` does
/// both in one call, so the hub only ever reports `Streaming` or `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connecting,
    Streaming,
    Closed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub connected_at: i64,
}

struct SubscriberEntry {
    connected_at: i64,
    state: Arc<Mutex<SubscriberState>>,
    task: JoinHandle<()>,
}

enum Delivery {
    Sent,
    Closed,
    ReceiverGone,
}

/// Owns the live subscribers and their push timers.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

struct HubInner {
    monitor: Monitor,
    push_interval: Duration,
    next_id: AtomicU64,
    /// Set by `shutdown` while holding the `subscribers` lock
    closed: AtomicBool,
    subscribers: Mutex<HashMap<SubscriberId, SubscriberEntry>>,
    sampler: Mutex<Option<CpuSamplingLoop>>,
}

impl BroadcastHub {
    /// Create a hub pushing every `push_interval`.
    ///
    /// In shared sampling mode this spawns the CPU sampling loop, so it must
    /// be called from within a tokio runtime.
    pub fn new(monitor: Monitor, push_interval: Duration) -> Self {
        let sampler = match monitor.sampling_mode() {
            SamplingMode::Shared => Some(CpuSamplingLoop::spawn(monitor.clone(), push_interval)),
            SamplingMode::PerSubscriber => None,
        };

        Self {
            inner: Arc::new(HubInner {
                monitor,
                push_interval,
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                subscribers: Mutex::new(HashMap::new()),
                sampler: Mutex::new(sampler),
            }),
        }
    }

    pub fn monitor(&self) -> &Monitor {
        &self.inner.monitor
    }

    pub fn push_interval(&self) -> Duration {
        self.inner.push_interval
    }

    /// Register a subscriber, push it one snapshot immediately and arm its
    /// repeating timer. Must be called from within a tokio runtime.
    ///
    /// After [`BroadcastHub::shutdown`] the returned subscription is already
    /// closed: nothing is counted and `recv` yields `None`.
    pub fn subscribe(&self) -> Subscription {
        let inner = &self.inner;
        let id = SubscriberId(inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();

        if inner.closed.load(Ordering::Acquire) {
            log::debug!("Refusing subscriber {}: hub is shut down", id);
            return Subscription {
                id,
                rx,
                hub: self.clone(),
            };
        }

        let state = Arc::new(Mutex::new(SubscriberState::Streaming));
        let connected_at = inner.monitor.now_millis();
        inner.monitor.subscriber_connected();
        log::info!("Subscriber {} connected", id);

        // The receiver is still held here, so the first push cannot fail
        let _ = deliver(&state, &tx, Arc::new(inner.monitor.snapshot()));

        {
            let mut subscribers = inner.subscribers.lock();
            if inner.closed.load(Ordering::Acquire) {
                // Lost the race with shutdown
                drop(subscribers);
                *state.lock() = SubscriberState::Closed;
                inner.monitor.subscriber_disconnected();
                log::debug!("Subscriber {} closed by concurrent shutdown", id);
                return Subscription {
                    id,
                    rx,
                    hub: self.clone(),
                };
            }

            let task = tokio::spawn(push_task(
                Arc::downgrade(inner),
                id,
                inner.monitor.clone(),
                state.clone(),
                tx,
                inner.push_interval,
            ));
            subscribers.insert(
                id,
                SubscriberEntry {
                    connected_at,
                    state,
                    task,
                },
            );
        }

        Subscription {
            id,
            rx,
            hub: self.clone(),
        }
    }

    /// Close a subscriber: stop its timer and release its connection slot.
    ///
    /// Returns `false` when the subscriber was already closed.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.close(id)
    }

    /// `Streaming` while registered, `Closed` otherwise.
    pub fn subscriber_state(&self, id: SubscriberId) -> SubscriberState {
        if self.inner.subscribers.lock().contains_key(&id) {
            SubscriberState::Streaming
        } else {
            SubscriberState::Closed
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        let mut infos: Vec<_> = self
            .inner
            .subscribers
            .lock()
            .iter()
            .map(|(id, entry)| SubscriberInfo {
                id: *id,
                connected_at: entry.connected_at,
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Close every subscriber, refuse new ones and stop the shared sampling
    /// loop. Idempotent.
    pub fn shutdown(&self) {
        let ids: Vec<_> = {
            let subscribers = self.inner.subscribers.lock();
            self.inner.closed.store(true, Ordering::Release);
            subscribers.keys().copied().collect()
        };
        for id in ids {
            self.inner.close(id);
        }
        if let Some(sampler) = self.inner.sampler.lock().take() {
            sampler.stop();
            log::debug!("Shared CPU sampling stopped");
        }
    }
}

impl HubInner {
    fn close(&self, id: SubscriberId) -> bool {
        let Some(entry) = self.subscribers.lock().remove(&id) else {
            return false;
        };

        *entry.state.lock() = SubscriberState::Closed;
        entry.task.abort();
        self.monitor.subscriber_disconnected();

        let connected_ms = self.monitor.now_millis() - entry.connected_at;
        log::info!(
            "Subscriber {} disconnected after {:.1}s",
            id,
            connected_ms.max(0) as f64 / 1000.0
        );
        true
    }
}

/// Push `snapshot` unless the subscriber is closed. The state lock is held
/// across the send so a concurrent close cannot interleave with it.
fn deliver(
    state: &Mutex<SubscriberState>,
    tx: &mpsc::UnboundedSender<Arc<Snapshot>>,
    snapshot: Arc<Snapshot>,
) -> Delivery {
    let state = state.lock();
    if *state != SubscriberState::Streaming {
        return Delivery::Closed;
    }
    match tx.send(snapshot) {
        Ok(()) => Delivery::Sent,
        Err(_) => Delivery::ReceiverGone,
    }
}

async fn push_task(
    hub: Weak<HubInner>,
    id: SubscriberId,
    monitor: Monitor,
    state: Arc<Mutex<SubscriberState>>,
    tx: mpsc::UnboundedSender<Arc<Snapshot>>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if *state.lock() != SubscriberState::Streaming {
            break;
        }

        let snapshot = Arc::new(monitor.snapshot_async().await);
        match deliver(&state, &tx, snapshot) {
            Delivery::Sent => log::trace!("Pushed snapshot to subscriber {}", id),
            Delivery::Closed => break,
            Delivery::ReceiverGone => {
                log::debug!("Subscriber {} receiver dropped, closing", id);
                if let Some(hub) = hub.upgrade() {
                    hub.close(id);
                }
                break;
            }
        }
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<Arc<Snapshot>>,
    hub: BroadcastHub,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next pushed snapshot; `None` once closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.recv().await
    }

    /// Take an already delivered snapshot without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}
