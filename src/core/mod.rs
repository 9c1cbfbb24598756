// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/spumotion

//! Core engine module - polling lifecycle and sample publication

mod engine;
mod poller;
mod publisher;

pub use engine::MotionEngine;
pub use poller::PollState;
pub use publisher::{Change, SamplePublisher, Snapshot, Subscription};
