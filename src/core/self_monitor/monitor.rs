use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::clock::{Clock, SystemClock};
use super::cpu::{CpuSampler, CpuTimesSource, ProcStatSource};
use super::health::HealthThresholds;
use super::probe::{HostProbe, HostReading, SysinfoProbe};
use super::sampler::SamplingMode;
use super::snapshot::{Snapshot, SnapshotBuilder, SnapshotInputs};
use super::state::{BodyCounter, MetricsState, RequestHandle};

/// Shared handle to the metrics core.
///
/// Cloning is cheap; all clones observe the same counters. Every mutable
/// component sits behind its own mutex, and no lock is held across an
/// `.await`.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    clock: Arc<dyn Clock>,
    state: Mutex<MetricsState>,
    cpu: Mutex<CpuSampler>,
    cached_cpu: AtomicU8,
    probe: Mutex<Box<dyn HostProbe>>,
    builder: SnapshotBuilder,
    sampling_mode: SamplingMode,
}

/// Builder for [`Monitor`]; unset parts default to the real system sources.
#[derive(Default)]
pub struct MonitorBuilder {
    clock: Option<Arc<dyn Clock>>,
    cpu_source: Option<Box<dyn CpuTimesSource>>,
    probe: Option<Box<dyn HostProbe>>,
    thresholds: HealthThresholds,
    sampling_mode: SamplingMode,
}

impl MonitorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn cpu_source(mut self, source: Box<dyn CpuTimesSource>) -> Self {
        self.cpu_source = Some(source);
        self
    }

    pub fn probe(mut self, probe: Box<dyn HostProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn sampling_mode(mut self, mode: SamplingMode) -> Self {
        self.sampling_mode = mode;
        self
    }

    pub fn build(self) -> Monitor {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        let cpu_source = self
            .cpu_source
            .unwrap_or_else(|| Box::new(ProcStatSource) as Box<dyn CpuTimesSource>);
        let probe = self
            .probe
            .unwrap_or_else(|| Box::new(SysinfoProbe::new()) as Box<dyn HostProbe>);

        Monitor {
            inner: Arc::new(MonitorInner {
                clock,
                state: Mutex::new(MetricsState::new()),
                cpu: Mutex::new(CpuSampler::new(cpu_source)),
                cached_cpu: AtomicU8::new(0),
                probe: Mutex::new(probe),
                builder: SnapshotBuilder::new(self.thresholds),
                sampling_mode: self.sampling_mode,
            }),
        }
    }
}

impl Monitor {
    /// Monitor over the real system with default thresholds.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MonitorBuilder {
        MonitorBuilder::default()
    }

    pub fn sampling_mode(&self) -> SamplingMode {
        self.inner.sampling_mode
    }

    pub fn now_millis(&self) -> i64 {
        self.inner.clock.now_millis()
    }

    pub fn on_request_start(&self, url: &str) -> RequestHandle {
        let clock = &self.inner.clock;
        self.inner
            .state
            .lock()
            .record_request_start(url, clock.now_millis(), clock.monotonic_millis())
    }

    pub fn on_bytes_received(&self, handle: &RequestHandle, bytes: u64) {
        self.inner.state.lock().record_bytes_received(handle, bytes);
    }

    pub fn on_body_bytes(&self, counter: BodyCounter, bytes: u64) {
        self.inner.state.lock().record_body_bytes(counter, bytes);
    }

    pub fn on_request_end(
        &self,
        handle: RequestHandle,
        status_code: u16,
        elapsed: Duration,
        bytes_out: u64,
    ) {
        self.inner
            .state
            .lock()
            .record_request_end(handle, status_code, elapsed, bytes_out);
    }

    pub fn active_connections(&self) -> u64 {
        self.inner.state.lock().active_connections()
    }

    pub(crate) fn subscriber_connected(&self) {
        self.inner.state.lock().subscriber_connected();
    }

    pub(crate) fn subscriber_disconnected(&self) {
        self.inner.state.lock().subscriber_disconnected();
    }

    /// Advance the CPU sampler and cache the result.
    pub fn sample_cpu(&self) -> u8 {
        let percent = self.inner.cpu.lock().sample();
        self.inner.cached_cpu.store(percent, Ordering::Relaxed);
        percent
    }

    /// Most recent value produced by [`Monitor::sample_cpu`].
    pub fn cached_cpu(&self) -> u8 {
        self.inner.cached_cpu.load(Ordering::Relaxed)
    }

    /// Build a snapshot of the current state.
    ///
    /// Prunes the sliding windows. In per-subscriber mode this also advances
    /// the CPU sampler, so two builds in quick succession see a short delta.
    pub fn snapshot(&self) -> Snapshot {
        let cpu_percent = match self.inner.sampling_mode {
            SamplingMode::PerSubscriber => self.sample_cpu(),
            SamplingMode::Shared => self.cached_cpu(),
        };

        let clock = &self.inner.clock;
        let monotonic = clock.monotonic_millis();
        let traffic = self.inner.state.lock().read(monotonic);
        let host = {
            let mut probe = self.inner.probe.lock();
            HostReading::collect(probe.as_mut())
        };

        self.inner.builder.assemble(SnapshotInputs {
            timestamp_millis: clock.now_millis(),
            cpu_percent,
            process_uptime: Duration::from_millis(monotonic),
            traffic,
            host,
        })
    }

    /// [`Monitor::snapshot`] on the blocking pool.
    ///
    /// Host introspection refreshes sysinfo tables under the probe lock, so
    /// async callers build here instead of on a runtime worker.
    pub async fn snapshot_async(&self) -> Snapshot {
        let monitor = self.clone();
        match tokio::task::spawn_blocking(move || monitor.snapshot()).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::debug!("Blocking snapshot build failed ({}), building inline", e);
                self.snapshot()
            }
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
