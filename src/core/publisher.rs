// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Sample publisher - current values, status text and observer fan-out

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::discovery::DiscoveryStatus;
use crate::sensors::MotionSample;

/// What the presentation layer sees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Whether discovery located a usable sensor
    pub sensor_found: bool,
    /// Current status
    pub status: DiscoveryStatus,
    /// Latest sample of the current monitoring run
    pub sample: Option<MotionSample>,
}

impl Snapshot {
    /// Current status text
    pub fn status_message(&self) -> &'static str {
        self.status.message()
    }

    /// Acceleration x, y, z in g; zeros before the first sample
    pub fn accel(&self) -> [f64; 3] {
        self.sample.map(|s| s.accel()).unwrap_or_default()
    }

    /// Angular velocity x, y, z in rad/s; zeros before the first sample
    pub fn gyro(&self) -> [f64; 3] {
        self.sample.map(|s| s.gyro()).unwrap_or_default()
    }
}

/// Which part of the snapshot an update carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// A new sample
    Sample,
    /// A status change
    Status,
}

type ObserverFn = dyn Fn(Change, &Snapshot) + Send + Sync + 'static;

struct Observer {
    id: u64,
    active: AtomicBool,
    callback: Box<ObserverFn>,
}

/// One observer's registration
///
/// Becomes inactive on [`SamplePublisher::unsubscribe`] or when the
/// publisher is closed. Nothing is delivered to an inactive subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    observer: Weak<Observer>,
}

impl Subscription {
    /// Identifier unique within one publisher
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether updates are still delivered to this subscription
    pub fn is_active(&self) -> bool {
        self.observer
            .upgrade()
            .map(|o| o.active.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

/// In-process publish/subscribe surface
///
/// All writes go through one delivery gate, so every observer sees a
/// sample before the next one is published. Samples are tagged with the
/// monitoring run (generation) that produced them; once a run is retired,
/// its late samples are dropped.
pub struct SamplePublisher {
    state: RwLock<Snapshot>,
    observers: Mutex<Vec<Arc<Observer>>>,
    gate: ReentrantMutex<Cell<u64>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    watch_tx: watch::Sender<Snapshot>,
}

impl SamplePublisher {
    /// Publisher with no sample and the given discovery outcome
    pub fn new(sensor_found: bool, status: DiscoveryStatus) -> Self {
        let snapshot = Snapshot {
            sensor_found,
            status,
            sample: None,
        };
        let (watch_tx, _) = watch::channel(snapshot.clone());

        Self {
            state: RwLock::new(snapshot),
            observers: Mutex::new(Vec::new()),
            gate: ReentrantMutex::new(Cell::new(0)),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            watch_tx,
        }
    }

    /// Register an observer. It is called on every sample and status change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Change, &Snapshot) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let observer = Arc::new(Observer {
            id,
            active: AtomicBool::new(!self.closed.load(Ordering::Acquire)),
            callback: Box::new(callback),
        });
        let subscription = Subscription {
            id,
            observer: Arc::downgrade(&observer),
        };

        if !self.closed.load(Ordering::Acquire) {
            self.observers.lock().push(observer);
            debug!("Observer {} subscribed", id);
        }
        subscription
    }

    /// Remove an observer. Unsubscribing twice is a no-op.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut observers = self.observers.lock();
        if let Some(pos) = observers.iter().position(|o| o.id == subscription.id) {
            let observer = observers.remove(pos);
            observer.active.store(false, Ordering::Release);
            debug!("Observer {} unsubscribed", subscription.id);
        }
    }

    /// Number of active observers
    pub fn subscriber_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.watch_tx.subscribe()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Snapshot {
        self.state.read().clone()
    }

    /// Current status
    pub fn status(&self) -> DiscoveryStatus {
        self.state.read().status
    }

    /// Whether discovery located a usable sensor
    pub fn sensor_found(&self) -> bool {
        self.state.read().sensor_found
    }

    /// Current monitoring run
    pub fn generation(&self) -> u64 {
        self.gate.lock().get()
    }

    /// Whether [`close`](Self::close) has run
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publish a status change
    pub fn set_status(&self, status: DiscoveryStatus) {
        let _gate = self.gate.lock();
        if self.is_closed() {
            return;
        }
        self.state.write().status = status;
        self.deliver(Change::Status);
    }

    /// Hold off delivery while a lifecycle change is decided. Observers run
    /// with this gate held, so it must be taken before any engine lock.
    pub(crate) fn lock_gate(&self) -> ReentrantMutexGuard<'_, Cell<u64>> {
        self.gate.lock()
    }

    /// Retire the current run and start a new one, clearing the sample so
    /// nothing from the retired run is shown again. Returns the new run.
    pub(crate) fn begin_run(&self, status: DiscoveryStatus) -> u64 {
        let gate = self.gate.lock();
        let generation = gate.get() + 1;
        gate.set(generation);

        if !self.is_closed() {
            {
                let mut state = self.state.write();
                state.status = status;
                state.sample = None;
            }
            self.deliver(Change::Status);
        }
        generation
    }

    /// Retire the current run without starting another
    pub(crate) fn end_run(&self, status: DiscoveryStatus) {
        let gate = self.gate.lock();
        gate.set(gate.get() + 1);

        if !self.is_closed() {
            self.state.write().status = status;
            self.deliver(Change::Status);
        }
    }

    /// Publish a sample from run `generation`. Returns `false` if the run
    /// was retired and the sample dropped.
    pub(crate) fn publish_sample(&self, generation: u64, sample: MotionSample) -> bool {
        let gate = self.gate.lock();
        if gate.get() != generation || self.is_closed() {
            return false;
        }

        self.state.write().sample = Some(sample);
        self.deliver(Change::Sample);
        true
    }

    /// Deactivate every subscription. Nothing is delivered afterwards.
    pub fn close(&self) {
        let gate = self.gate.lock();
        gate.set(gate.get() + 1);

        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for observer in self.observers.lock().drain(..) {
            observer.active.store(false, Ordering::Release);
        }
        debug!("Publisher closed");
    }

    /// Must be called with the gate held
    fn deliver(&self, change: Change) {
        let snapshot = self.state.read().clone();
        self.watch_tx.send_replace(snapshot.clone());

        // Observers may (un)subscribe from their callback.
        let observers: Vec<Arc<Observer>> = self.observers.lock().clone();
        for observer in observers {
            if observer.active.load(Ordering::Acquire) {
                (observer.callback)(change, &snapshot);
            }
        }
    }
}
