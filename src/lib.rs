// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! spumotion - motion sensor discovery and polling engine
//!
//! Finds a motion-sensor service in the host device registry and samples
//! it at a fixed rate for display:
//! - Exact-name lookup of the SPU HID interface, with a diagnostic fallback
//!   over generic HID devices and known alternate services
//! - Depth-first search of registry property trees for sensor-shaped entries
//! - A 60 Hz polling loop with explicit start/stop
//! - Subscribe/unsubscribe publication of samples and status text
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      MotionEngine                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌───────────┐   ┌────────┐               │
//! │  │ Registry │ → │  Service  │ → │ Poller │ → SampleSource│
//! │  │ Adapter  │   │  Locator  │   │ (16ms) │               │
//! │  └──────────┘   └───────────┘   └────────┘               │
//! │                  PropertySearch      ↓                   │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │                 Sample Publisher                   │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │           ↓ observers            ↓ watch channel         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ```no_run
//! use std::sync::Arc;
//! use spumotion::{Config, MemoryRegistry, MotionEngine};
//!
//! # #[tokio::main]
//! # async fn main() -> spumotion::Result<()> {
//! let registry = Arc::new(MemoryRegistry::from_snapshot("registry.json".as_ref())?);
//! let engine = MotionEngine::new(registry, Arc::new(Config::default()))?;
//!
//! let _sub = engine.subscribe(|_, snapshot| {
//!     println!("{} {:?}", snapshot.status_message(), snapshot.accel());
//! });
//! engine.start_monitoring();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod core;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod sensors;

// Re-exports for convenience
pub use config::Config;
pub use core::{Change, MotionEngine, PollState, SamplePublisher, Snapshot, Subscription};
pub use discovery::{Discovery, DiscoveryStatus, PropertySearch, ServiceLocator};
pub use error::{Error, Result};
pub use registry::{DeviceHandle, DeviceRegistry, MemoryRegistry, PropertyTree, PropertyValue, SysfsRegistry};
pub use sensors::{MotionReading, MotionSample, SampleSource, SyntheticSource};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "spumotion";
