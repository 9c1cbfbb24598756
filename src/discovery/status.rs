// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Discovery and monitoring status

use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress marker shown to the presentation layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscoveryStatus {
    /// Before discovery starts
    #[default]
    Initializing,
    /// Discovery in progress
    Searching,
    /// The primary service exists
    PrimaryServiceFound,
    /// The primary service is missing; fallback diagnostics ran
    PrimaryServiceNotFound,
    /// A sensor subtree was found
    SensorsDetected,
    /// The primary service has no readable sensor subtree
    SensorsNotAccessible,
    /// Monitoring was requested without a sensor
    NoSensorsFound,
    /// Polling is running
    MonitoringActive,
    /// Polling was stopped
    MonitoringStopped,
}

impl DiscoveryStatus {
    /// Human-readable status text
    pub fn message(&self) -> &'static str {
        match self {
            DiscoveryStatus::Initializing => "Initializing...",
            DiscoveryStatus::Searching => "Searching for SPU sensors...",
            DiscoveryStatus::PrimaryServiceFound => "SPU HID interface found",
            DiscoveryStatus::PrimaryServiceNotFound => "SPU HID interface not found",
            DiscoveryStatus::SensorsDetected => "AOP sensors detected",
            DiscoveryStatus::SensorsNotAccessible => "AOP sensors could not be accessed",
            DiscoveryStatus::NoSensorsFound => "No sensors found",
            DiscoveryStatus::MonitoringActive => "Monitoring sensors...",
            DiscoveryStatus::MonitoringStopped => "Monitoring stopped",
        }
    }
}

impl fmt::Display for DiscoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
