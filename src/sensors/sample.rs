// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Motion sample types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw channel values from one read of a sample source
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionReading {
    /// Acceleration x, y, z in g
    pub accel: [f64; 3],
    /// Angular velocity x, y, z in rad/s
    pub gyro: [f64; 3],
}

/// One timestamped motion sample
///
/// Samples are never mutated after capture; each tick replaces the previous
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Monotonic counter across all runs of one engine
    pub sequence: u64,
    /// Capture time
    pub timestamp: DateTime<Utc>,

    /// Acceleration in g
    pub accel_x: f64,
    /// Acceleration in g
    pub accel_y: f64,
    /// Acceleration in g
    pub accel_z: f64,

    /// Angular velocity in rad/s
    pub gyro_x: f64,
    /// Angular velocity in rad/s
    pub gyro_y: f64,
    /// Angular velocity in rad/s
    pub gyro_z: f64,
}

impl MotionSample {
    /// Sample from one reading
    pub fn new(sequence: u64, timestamp: DateTime<Utc>, reading: MotionReading) -> Self {
        Self {
            sequence,
            timestamp,
            accel_x: reading.accel[0],
            accel_y: reading.accel[1],
            accel_z: reading.accel[2],
            gyro_x: reading.gyro[0],
            gyro_y: reading.gyro[1],
            gyro_z: reading.gyro[2],
        }
    }

    /// Acceleration x, y, z in g
    pub fn accel(&self) -> [f64; 3] {
        [self.accel_x, self.accel_y, self.accel_z]
    }

    /// Angular velocity x, y, z in rad/s
    pub fn gyro(&self) -> [f64; 3] {
        [self.gyro_x, self.gyro_y, self.gyro_z]
    }

    /// Acceleration magnitude in g
    pub fn accel_magnitude(&self) -> f64 {
        self.accel().iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Channel values without sequence and timestamp
    pub fn reading(&self) -> MotionReading {
        MotionReading {
            accel: self.accel(),
            gyro: self.gyro(),
        }
    }
}
