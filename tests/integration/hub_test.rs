use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use selfmon::core::self_monitor::{
    BroadcastHub, CpuTimes, CpuTimesSource, ManualClock, Monitor, SamplingMode, SubscriberState,
};
use tokio::time::{sleep, timeout};

use super::common::{fake_monitor, FakeProbe, START_MILLIS};

/// Counts how often the CPU counters are read.
struct CountingSource {
    reads: Arc<AtomicUsize>,
}

impl CpuTimesSource for CountingSource {
    fn read(&mut self) -> selfmon::Result<Vec<CpuTimes>> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        Ok(vec![CpuTimes {
            user: n * 10,
            idle: n * 30,
            ..Default::default()
        }])
    }
}

const PUSH: Duration = Duration::from_millis(100);

#[tokio::test(start_paused = true)]
async fn test_subscribe_pushes_immediately() {
    let (monitor, _clock) = fake_monitor(SamplingMode::PerSubscriber);
    let hub = BroadcastHub::new(monitor.clone(), PUSH);

    let mut subscription = hub.subscribe();
    let first = subscription
        .try_recv()
        .expect("first snapshot is pushed on subscribe");

    assert_eq!(first.active_connections, 1);
    assert_eq!(monitor.active_connections(), 1);
    assert_eq!(hub.subscriber_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pushes_every_interval() {
    let (monitor, _clock) = fake_monitor(SamplingMode::PerSubscriber);
    let hub = BroadcastHub::new(monitor, PUSH);

    let mut subscription = hub.subscribe();
    assert!(subscription.try_recv().is_some());
    assert!(subscription.try_recv().is_none());

    for _ in 0..3 {
        let pushed = timeout(PUSH * 2, subscription.recv())
            .await
            .expect("push arrives within the interval");
        assert!(pushed.is_some());
    }
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_before_first_tick() {
    let (monitor, _clock) = fake_monitor(SamplingMode::PerSubscriber);
    let hub = BroadcastHub::new(monitor.clone(), PUSH);
    let before = monitor.active_connections();

    let mut subscription = hub.subscribe();
    assert!(subscription.try_recv().is_some());
    assert!(hub.unsubscribe(subscription.id()));
    assert_eq!(monitor.active_connections(), before);

    sleep(PUSH * 5).await;
    assert!(subscription.try_recv().is_none());
    assert_eq!(
        timeout(PUSH, subscription.recv()).await.ok().flatten(),
        None
    );
}

#[tokio::test(start_paused = true)]
async fn test_double_unsubscribe_is_noop() {
    let (monitor, _clock) = fake_monitor(SamplingMode::PerSubscriber);
    let hub = BroadcastHub::new(monitor.clone(), PUSH);

    let first = hub.subscribe();
    let _second = hub.subscribe();
    assert_eq!(monitor.active_connections(), 2);

    assert!(hub.unsubscribe(first.id()));
    assert!(!hub.unsubscribe(first.id()));
    assert_eq!(monitor.active_connections(), 1);

    drop(first);
    assert_eq!(monitor.active_connections(), 1);
    assert_eq!(hub.subscriber_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_subscription_unsubscribes() {
    let (monitor, _clock) = fake_monitor(SamplingMode::PerSubscriber);
    let hub = BroadcastHub::new(monitor.clone(), PUSH);

    {
        let _subscription = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
    }

    assert_eq!(hub.subscriber_count(), 0);
    assert_eq!(monitor.active_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_listing() {
    let (monitor, _clock) = fake_monitor(SamplingMode::PerSubscriber);
    let hub = BroadcastHub::new(monitor, PUSH);

    let a = hub.subscribe();
    let b = hub.subscribe();

    let listed = hub.subscribers();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, a.id());
    assert_eq!(listed[1].id, b.id());
    assert!(listed.iter().all(|info| info.connected_at == START_MILLIS));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_every_stream() {
    let (monitor, _clock) = fake_monitor(SamplingMode::Shared);
    let hub = BroadcastHub::new(monitor.clone(), PUSH);

    let mut a = hub.subscribe();
    let mut b = hub.subscribe();
    hub.shutdown();

    assert_eq!(hub.subscriber_count(), 0);
    assert_eq!(monitor.active_connections(), 0);

    for subscription in [&mut a, &mut b] {
        // The snapshot pushed on subscribe is still queued
        assert!(subscription.recv().await.is_some());
        let end = timeout(PUSH * 2, subscription.recv())
            .await
            .expect("stream ends after shutdown");
        assert!(end.is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn test_shared_sampling_ignores_subscriber_count() {
    let (monitor, _clock) = fake_monitor(SamplingMode::Shared);
    let hub = BroadcastHub::new(monitor.clone(), PUSH);

    let _subscriptions: Vec<_> = (0..4).map(|_| hub.subscribe()).collect();
    sleep(PUSH * 3 + PUSH / 2).await;

    assert_eq!(monitor.cached_cpu(), 25);
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.cpu, 25);
    assert_eq!(snapshot.active_connections, 4);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_after_shutdown_is_closed() {
    let (monitor, _clock) = fake_monitor(SamplingMode::Shared);
    let hub = BroadcastHub::new(monitor.clone(), PUSH);
    hub.shutdown();
    assert!(hub.is_shut_down());

    let mut late = hub.subscribe();
    assert_eq!(hub.subscriber_count(), 0);
    assert_eq!(monitor.active_connections(), 0);
    assert_eq!(hub.subscriber_state(late.id()), SubscriberState::Closed);

    for _ in 0..3 {
        let next = timeout(PUSH * 2, late.recv())
            .await
            .expect("closed subscription resolves immediately");
        assert!(next.is_none());
    }

    drop(late);
    assert_eq!(monitor.active_connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_shared_sampling() {
    let reads = Arc::new(AtomicUsize::new(0));
    let monitor = Monitor::builder()
        .clock(Arc::new(ManualClock::new(START_MILLIS)))
        .cpu_source(Box::new(CountingSource {
            reads: reads.clone(),
        }))
        .probe(Box::new(FakeProbe { disk_fails: false }))
        .sampling_mode(SamplingMode::Shared)
        .build();
    let hub = BroadcastHub::new(monitor, PUSH);

    sleep(PUSH * 3 + PUSH / 2).await;
    assert!(reads.load(Ordering::SeqCst) >= 3);

    hub.shutdown();
    tokio::task::yield_now().await;
    let after_shutdown = reads.load(Ordering::SeqCst);

    sleep(PUSH * 5).await;
    assert_eq!(reads.load(Ordering::SeqCst), after_shutdown);
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_state_follows_lifecycle() {
    let (monitor, _clock) = fake_monitor(SamplingMode::PerSubscriber);
    let hub = BroadcastHub::new(monitor, PUSH);

    let subscription = hub.subscribe();
    let id = subscription.id();
    assert_eq!(hub.subscriber_state(id), SubscriberState::Streaming);

    drop(subscription);
    assert_eq!(hub.subscriber_state(id), SubscriberState::Closed);
}
