// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Error types for the discovery and polling engine

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error types
///
/// None of these abort discovery or polling: the engine recovers locally and
/// reports through [`DiscoveryStatus`](crate::discovery::DiscoveryStatus).
/// They surface from constructors and from direct adapter calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No registered service matches the requested class name
    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    /// The native property read reported non-success
    #[error("Property read failed for {service}: status {code:#x}")]
    PropertyRead {
        /// Class name of the service being read
        service: String,
        /// Native status code
        code: i32,
    },

    /// Discovery finished without a sensor-shaped property subtree
    #[error("No usable sensor found")]
    NoUsableSensor,

    /// Monitoring requested without a successful discovery
    #[error("Cannot start monitoring without a discovered sensor")]
    StartWithoutDiscovery,

    /// The engine was built outside of a tokio runtime
    #[error("No tokio runtime available for the polling loop")]
    NoRuntime,

    /// Malformed registry snapshot
    #[error("Invalid registry snapshot: {0}")]
    Snapshot(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
