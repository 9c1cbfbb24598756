// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Discovery - locating a sensor-bearing service in the device registry

mod locator;
mod search;
mod status;

pub use locator::{CandidateSource, Discovery, FallbackCandidate, ServiceLocator};
pub use search::{dump_tree, CaseMode, PropertySearch, DIAGNOSTIC_TOKENS, SENSOR_TOKENS};
pub use status::DiscoveryStatus;

/// Service class probed first
pub const PRIMARY_SERVICE: &str = "AppleSPUHIDInterface";

/// Generic HID class enumerated on the fallback path
pub const HID_DEVICE_CLASS: &str = "IOHIDDevice";

/// Alternate service names tried in order on the fallback path
pub const FALLBACK_SERVICES: [&str; 5] = [
    "AppleEmbeddedAccel",
    "AppleEmbeddedGyro",
    "AppleSMC",
    "IOHIDDevice",
    "AppleHSSPIController",
];
