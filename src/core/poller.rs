// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Fixed-rate polling loop

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::SamplePublisher;
use crate::sensors::{MotionReading, MotionSample, SampleSource};

/// Polling lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    /// No tick task
    Idle,
    /// Tick task publishing samples
    Running,
}

/// Shared by every run of one engine
pub(crate) struct PollShared {
    pub publisher: Arc<SamplePublisher>,
    pub source: AsyncMutex<Box<dyn SampleSource>>,
    /// Sequence number of the next sample, continuous across runs
    pub next_sequence: AtomicU64,
    pub clock: SampleClock,
}

/// Monotonic clock anchored to wall time once per engine, so timestamps
/// strictly increase across runs even if the wall clock steps.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SampleClock {
    anchor: Instant,
    anchor_wall: DateTime<Utc>,
}

impl SampleClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            anchor_wall: Utc::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.anchor.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.anchor_wall + elapsed
    }
}

struct Run {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns the periodic tick task of one engine
pub(crate) struct Poller {
    interval: Duration,
    runtime: Handle,
    shared: Arc<PollShared>,
    run: Option<Run>,
}

impl Poller {
    pub fn new(interval: Duration, runtime: Handle, shared: Arc<PollShared>) -> Self {
        Self {
            interval,
            runtime,
            shared,
            run: None,
        }
    }

    pub fn state(&self) -> PollState {
        match self.run {
            Some(_) => PollState::Running,
            None => PollState::Idle,
        }
    }

    /// Spawn the tick task for run `generation`. No-op while running.
    pub fn start(&mut self, generation: u64) {
        if self.run.is_some() {
            return;
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = self.runtime.spawn(tick_loop(
            self.shared.clone(),
            generation,
            self.interval,
            shutdown_rx,
        ));
        self.run = Some(Run { shutdown, task });
        info!("Polling started every {:?} (run {})", self.interval, generation);
    }

    /// Signal the tick task to exit. Returns `false` if already idle.
    pub fn stop(&mut self) -> bool {
        match self.run.take() {
            Some(run) => {
                let _ = run.shutdown.send(());
                info!("Polling stopped");
                true
            }
            None => false,
        }
    }

    /// Stop and cancel the task outright
    pub fn shutdown(&mut self) {
        if let Some(run) = self.run.take() {
            let _ = run.shutdown.send(());
            run.task.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn tick_loop(
    shared: Arc<PollShared>,
    generation: u64,
    period: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last: Option<MotionReading> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let timestamp = shared.clock.now();
        let reading = {
            let mut source = shared.source.lock().await;
            match source.read(timestamp).await {
                Ok(reading) => reading,
                Err(e) => {
                    debug!("{} read failed, holding previous sample: {}", source.name(), e);
                    match last {
                        Some(previous) => previous,
                        None => continue,
                    }
                }
            }
        };
        last = Some(reading);

        let sequence = shared.next_sequence.fetch_add(1, Ordering::Relaxed);
        let sample = MotionSample::new(sequence, timestamp, reading);
        if !shared.publisher.publish_sample(generation, sample) {
            debug!("Run {} retired, tick dropped", generation);
            break;
        }
    }

    debug!("Tick loop for run {} exited", generation);
}
