// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Motion engine - discovery once, then start/stop polling on demand

use std::cell::RefCell;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{info, warn};

use super::poller::{PollShared, PollState, Poller, SampleClock};
use super::publisher::{Change, SamplePublisher, Snapshot, Subscription};
use crate::config::Config;
use crate::discovery::{Discovery, DiscoveryStatus, ServiceLocator};
use crate::error::{Error, Result};
use crate::registry::DeviceRegistry;
use crate::sensors::{SampleSource, SyntheticSource};

/// Sensor discovery and polling engine
///
/// Discovery runs exactly once, in the constructor. Build a new engine to
/// discover again. Dropping the engine stops polling, invalidates every
/// subscription and releases the discovered device handle.
///
/// Lifecycle calls are safe from any thread, including from inside an
/// observer callback. Locks are always taken publisher gate first, then
/// poller.
pub struct MotionEngine {
    config: Arc<Config>,
    registry: Arc<dyn DeviceRegistry>,
    discovery: Discovery,
    publisher: Arc<SamplePublisher>,
    poller: ReentrantMutex<RefCell<Poller>>,
}

impl MotionEngine {
    /// Discover sensors and prepare a synthetic sample source.
    ///
    /// Must be called from within a tokio runtime; the polling loop is
    /// spawned on it.
    pub fn new(registry: Arc<dyn DeviceRegistry>, config: Arc<Config>) -> Result<Self> {
        Self::with_source(registry, config, Box::new(SyntheticSource::new()))
    }

    /// Discover sensors and poll `source` once monitoring starts
    pub fn with_source(
        registry: Arc<dyn DeviceRegistry>,
        config: Arc<Config>,
        source: Box<dyn SampleSource>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        info!("Starting sensor discovery...");
        let discovery = ServiceLocator::new(&config.discovery).locate(registry.as_ref());
        info!("Discovery finished: {} (sensor found: {})", discovery.status, discovery.sensor_found);

        let publisher = Arc::new(SamplePublisher::new(discovery.sensor_found, discovery.status));
        let shared = Arc::new(PollShared {
            publisher: publisher.clone(),
            source: AsyncMutex::new(source),
            next_sequence: AtomicU64::new(0),
            clock: SampleClock::new(),
        });
        let poller = Poller::new(config.polling.interval(), runtime, shared);

        Ok(Self {
            config,
            registry,
            discovery,
            publisher,
            poller: ReentrantMutex::new(RefCell::new(poller)),
        })
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether discovery located a usable sensor
    pub fn sensor_found(&self) -> bool {
        self.discovery.sensor_found
    }

    /// Current status
    pub fn status(&self) -> DiscoveryStatus {
        self.publisher.status()
    }

    /// Current status text
    pub fn status_message(&self) -> &'static str {
        self.status().message()
    }

    /// The discovery run, including fallback diagnostics
    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Latest sample and status
    pub fn snapshot(&self) -> Snapshot {
        self.publisher.snapshot()
    }

    /// Shared publisher, for consumers that outlive a borrow of the engine
    pub fn publisher(&self) -> &Arc<SamplePublisher> {
        &self.publisher
    }

    /// Register an observer for samples and status changes
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Change, &Snapshot) + Send + Sync + 'static,
    {
        self.publisher.subscribe(callback)
    }

    /// Remove an observer. No-op if already removed.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.publisher.unsubscribe(subscription)
    }

    /// Receiver holding the latest snapshot
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.publisher.watch()
    }

    /// Polling lifecycle state
    pub fn poll_state(&self) -> PollState {
        self.poller.lock().borrow().state()
    }

    /// Whether the tick task is running
    pub fn is_running(&self) -> bool {
        self.poll_state() == PollState::Running
    }

    /// Start polling, or explain why not
    ///
    /// Fails with [`Error::StartWithoutDiscovery`] when discovery found no
    /// sensor. Starting while running is a no-op.
    pub fn try_start(&self) -> Result<()> {
        if !self.discovery.sensor_found {
            return Err(Error::StartWithoutDiscovery);
        }

        // Gate before poller, the order a delivering tick takes them in.
        // No RefCell borrow is held while observers run, so they may
        // re-enter start/stop.
        let _gate = self.publisher.lock_gate();
        let poller = self.poller.lock();
        if poller.borrow().state() == PollState::Running {
            return Ok(());
        }

        let generation = self.publisher.begin_run(DiscoveryStatus::MonitoringActive);
        poller.borrow_mut().start(generation);
        Ok(())
    }

    /// Start polling. Without a discovered sensor this only reports
    /// "no sensors" through the status.
    pub fn start_monitoring(&self) {
        if let Err(e) = self.try_start() {
            warn!("Monitoring not started: {}", e);
            self.publisher.set_status(DiscoveryStatus::NoSensorsFound);
        }
    }

    /// Stop polling. Idempotent; a tick already delivering completes, no
    /// later tick of this run is published.
    pub fn stop_monitoring(&self) {
        let _gate = self.publisher.lock_gate();
        let poller = self.poller.lock();
        let stopped = poller.borrow_mut().stop();
        if stopped {
            self.publisher.end_run(DiscoveryStatus::MonitoringStopped);
        }
    }
}

impl Drop for MotionEngine {
    fn drop(&mut self) {
        self.poller.get_mut().get_mut().shutdown();
        self.publisher.close();

        if let Some(handle) = self.discovery.handle.as_mut() {
            self.registry.release(handle);
        }
        info!("Motion engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use chrono::{DateTime, Utc};

    use crate::registry::{MemoryRegistry, PropertyTree, PropertyValue};
    use crate::sensors::{MotionReading, MotionSample};

    fn sensor_registry() -> Arc<MemoryRegistry> {
        Arc::new(MemoryRegistry::new().with_service(
            "AppleSPUHIDInterface",
            PropertyTree::new().with(
                "AOP Sensors",
                PropertyValue::Tree(PropertyTree::new().with("accelX", PropertyValue::Float(0.0))),
            ),
        ))
    }

    fn engine(registry: Arc<MemoryRegistry>) -> MotionEngine {
        MotionEngine::new(registry, Arc::new(Config::default())).unwrap()
    }

    fn collect_samples(engine: &MotionEngine) -> (Subscription, Arc<Mutex<Vec<MotionSample>>>) {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink = samples.clone();
        let sub = engine.subscribe(move |change, snapshot| {
            if change == Change::Sample {
                if let Some(sample) = snapshot.sample {
                    sink.lock().push(sample);
                }
            }
        });
        (sub, samples)
    }

    #[test]
    fn test_requires_runtime() {
        let result = MotionEngine::new(sensor_registry(), Arc::new(Config::default()));
        assert!(matches!(result, Err(Error::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_delivers_samples_at_tick_rate() {
        let engine = engine(sensor_registry());
        assert!(engine.sensor_found());
        assert_eq!(engine.status(), DiscoveryStatus::SensorsDetected);

        let (_sub, samples) = collect_samples(&engine);
        engine.start_monitoring();
        assert!(engine.is_running());
        assert_eq!(engine.status(), DiscoveryStatus::MonitoringActive);
        assert_eq!(engine.status_message(), "Monitoring sensors...");

        tokio::time::sleep(Duration::from_millis(100)).await;

        let samples = samples.lock().clone();
        assert!(samples.len() >= 5, "only {} samples", samples.len());
        assert!(samples.len() <= 7, "{} samples", samples.len());
        for pair in samples.windows(2) {
            assert!(pair[0].sequence < pair[1].sequence);
            assert!(pair[0].timestamp < pair[1].timestamp);
        }
        let gap = samples[1].timestamp - samples[0].timestamp;
        assert_eq!(gap.num_milliseconds(), 16);

        // Gravity bias on Z
        assert!(samples.iter().all(|s| (s.accel_z - 1.0).abs() <= 0.1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_without_sensor_is_noop() {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = engine(registry);
        assert!(!engine.sensor_found());
        assert_eq!(engine.status(), DiscoveryStatus::PrimaryServiceNotFound);

        let (_sub, samples) = collect_samples(&engine);
        assert!(matches!(engine.try_start(), Err(Error::StartWithoutDiscovery)));
        engine.start_monitoring();

        assert_eq!(engine.poll_state(), PollState::Idle);
        assert_eq!(engine.status(), DiscoveryStatus::NoSensorsFound);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(samples.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_runs_one_timer() {
        let engine = engine(sensor_registry());
        let (_sub, samples) = collect_samples(&engine);

        engine.start_monitoring();
        engine.start_monitoring();
        tokio::time::sleep(Duration::from_millis(165)).await;

        // Ticks at 0, 16, ..., 160
        assert_eq!(samples.lock().len(), 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_halts_delivery() {
        let engine = engine(sensor_registry());
        let (_sub, samples) = collect_samples(&engine);

        engine.stop_monitoring();
        assert_eq!(engine.status(), DiscoveryStatus::SensorsDetected);

        engine.start_monitoring();
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.stop_monitoring();
        engine.stop_monitoring();

        assert_eq!(engine.poll_state(), PollState::Idle);
        assert_eq!(engine.status(), DiscoveryStatus::MonitoringStopped);

        let count = samples.lock().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(samples.lock().len(), count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_resumes_without_stale_sample() {
        let engine = engine(sensor_registry());
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let sink = snapshots.clone();
        let _sub = engine.subscribe(move |change, snapshot| sink.lock().push((change, snapshot.clone())));

        engine.start_monitoring();
        tokio::time::sleep(Duration::from_millis(40)).await;
        engine.stop_monitoring();
        let last_before = engine.snapshot().sample.unwrap();
        let stopped_at = snapshots.lock().len();

        engine.start_monitoring();
        assert!(engine.is_running());
        assert!(engine.snapshot().sample.is_none());
        tokio::time::sleep(Duration::from_millis(40)).await;

        let after: Vec<(Change, Snapshot)> = snapshots.lock()[stopped_at..].to_vec();
        assert_eq!(after[0].0, Change::Status);
        assert_eq!(after[0].1.status, DiscoveryStatus::MonitoringActive);
        assert!(after[0].1.sample.is_none());

        let resumed: Vec<MotionSample> = after.iter().filter_map(|(_, s)| s.sample).collect();
        assert!(!resumed.is_empty());
        assert!(resumed.iter().all(|s| s.sequence > last_before.sequence));
        assert!(resumed.iter().all(|s| s.timestamp > last_before.timestamp));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_delivery() {
        let engine = engine(sensor_registry());
        let (sub, samples) = collect_samples(&engine);

        engine.start_monitoring();
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.unsubscribe(&sub);
        let count = samples.lock().len();
        assert!(count > 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(samples.lock().len(), count);
        assert!(!sub.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_handle_and_subscriptions() {
        let registry = sensor_registry();
        let engine = engine(registry.clone());
        assert_eq!(registry.live_handles(), 1);

        let (sub, samples) = collect_samples(&engine);
        engine.start_monitoring();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let publisher = engine.publisher().clone();
        drop(engine);

        assert_eq!(registry.live_handles(), 0);
        assert!(!sub.is_active());
        assert!(publisher.is_closed());

        let count = samples.lock().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(samples.lock().len(), count);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_without_sensor_releases_nothing_twice() {
        let registry = Arc::new(
            MemoryRegistry::new().with_service("AppleSPUHIDInterface", PropertyTree::new()),
        );
        let engine = engine(registry.clone());
        assert_eq!(engine.status(), DiscoveryStatus::SensorsNotAccessible);
        assert_eq!(registry.live_handles(), 1);

        drop(engine);
        assert_eq!(registry.live_handles(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_can_stop_engine() {
        let engine = Arc::new(engine(sensor_registry()));
        let weak = Arc::downgrade(&engine);
        let _sub = engine.subscribe(move |change, snapshot| {
            if change == Change::Sample && snapshot.sample.map(|s| s.sequence) == Some(2) {
                if let Some(engine) = weak.upgrade() {
                    engine.stop_monitoring();
                }
            }
        });

        engine.start_monitoring();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!engine.is_running());
        assert_eq!(engine.status(), DiscoveryStatus::MonitoringStopped);
        assert_eq!(engine.snapshot().sample.map(|s| s.sequence), Some(2));
    }

    struct FlakySource {
        reads: u32,
    }

    #[async_trait]
    impl SampleSource for FlakySource {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn read(&mut self, _timestamp: DateTime<Utc>) -> Result<MotionReading> {
            self.reads += 1;
            if self.reads % 2 == 0 {
                return Err(Error::NoUsableSensor);
            }
            Ok(MotionReading {
                accel: [self.reads as f64, 0.0, 1.0],
                gyro: [0.0; 3],
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_holds_previous_sample() {
        let engine = MotionEngine::with_source(
            sensor_registry(),
            Arc::new(Config::default()),
            Box::new(FlakySource { reads: 0 }),
        )
        .unwrap();
        let (_sub, samples) = collect_samples(&engine);

        engine.start_monitoring();
        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(engine.is_running());

        // Reads 1..=5: ok, fail, ok, fail, ok
        let xs: Vec<f64> = samples.lock().iter().map(|s| s.accel_x).collect();
        assert_eq!(xs, vec![1.0, 1.0, 3.0, 3.0, 5.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_sees_latest_sample() {
        let engine = engine(sensor_registry());
        let mut rx = engine.watch();

        engine.start_monitoring();
        tokio::time::sleep(Duration::from_millis(40)).await;
        rx.changed().await.unwrap();

        let latest = rx.borrow().clone();
        assert!(latest.sensor_found);
        assert_eq!(latest.status, DiscoveryStatus::MonitoringActive);
        assert_eq!(latest.sample, engine.snapshot().sample);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lifecycle_from_other_thread_while_observer_reads_state() {
        let mut config = Config::default();
        config.polling.interval_ms = 1;
        let engine = Arc::new(MotionEngine::new(sensor_registry(), Arc::new(config)).unwrap());

        let weak = Arc::downgrade(&engine);
        let _sub = engine.subscribe(move |change, _| {
            if change == Change::Sample {
                std::thread::sleep(Duration::from_millis(2));
                if let Some(engine) = weak.upgrade() {
                    let _ = engine.is_running();
                }
            }
        });

        let toggler = engine.clone();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            for _ in 0..200 {
                toggler.start_monitoring();
                std::thread::sleep(Duration::from_micros(500));
                toggler.stop_monitoring();
            }
            let _ = done_tx.send(());
        });

        let finished = tokio::task::spawn_blocking(move || done_rx.recv_timeout(Duration::from_secs(20)))
            .await
            .unwrap();
        assert!(finished.is_ok(), "start/stop blocked against sample delivery");
        assert!(!engine.is_running());
        assert_eq!(engine.status(), DiscoveryStatus::MonitoringStopped);
    }
}
