// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Synthetic motion source
//!
//! Placeholder until the SPU sensor payload is decoded: channels are
//! phase-shifted sinusoids of wall-clock time, with a +1 g bias on Z for
//! gravity. Do not rely on these values for anything but exercising the
//! polling and display path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{MotionReading, SampleSource};
use crate::error::Result;

const ACCEL_AMPLITUDE: f64 = 0.1;  // g
const GYRO_AMPLITUDE: f64 = 0.05;  // rad/s
const GRAVITY_BIAS: f64 = 1.0;  // g

/// Sinusoid generator standing in for decoded sensor data
#[derive(Debug, Default)]
pub struct SyntheticSource;

impl SyntheticSource {
    /// Stateless source
    pub fn new() -> Self {
        Self
    }

    /// Channels at `t` seconds since the Unix epoch
    pub fn generate(t: f64) -> MotionReading {
        MotionReading {
            accel: [
                t.sin() * ACCEL_AMPLITUDE,
                (t * 1.2).cos() * ACCEL_AMPLITUDE,
                (t * 0.8).sin() * ACCEL_AMPLITUDE + GRAVITY_BIAS,
            ],
            gyro: [
                (t * 2.0).sin() * GYRO_AMPLITUDE,
                (t * 1.5).cos() * GYRO_AMPLITUDE,
                (t * 3.0).sin() * GYRO_AMPLITUDE,
            ],
        }
    }
}

#[async_trait]
impl SampleSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn read(&mut self, timestamp: DateTime<Utc>) -> Result<MotionReading> {
        let t = timestamp.timestamp_micros() as f64 / 1_000_000.0;
        Ok(Self::generate(t))
    }
}
