// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Sensor module - motion samples and the sources that produce them

mod sample;
mod source;
mod synthetic;

pub use sample::{MotionReading, MotionSample};
pub use source::SampleSource;
pub use synthetic::SyntheticSource;
