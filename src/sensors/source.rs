// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Sample source trait - where a tick's channel values come from

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MotionReading;
use crate::error::Result;

/// Produces channel values for one polling tick
///
/// The polling loop owns timing, sequencing and publication. A source only
/// turns "now" into a reading, so a real payload decoder can replace the
/// synthetic generator without touching the loop.
#[async_trait]
pub trait SampleSource: Send {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Read the channels for a tick captured at `timestamp`
    async fn read(&mut self, timestamp: DateTime<Utc>) -> Result<MotionReading>;
}
