// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Depth frame source abstraction.
//!
//! This module provides a [`DepthSource`] trait that abstracts where depth
//! frames come from, enabling:
//!
//! - **Live operation**: an adapter over a vendor sensor callback
//! - **Testing**: replaying pre-defined frames
//! - **Demos and benchmarks**: procedurally generated clouds
//!
//! Sources fill a client-owned [`DepthFrame`]; allocate the frame once at
//! the expected sensor size and reuse it across calls.
//!
//! # Example
//!
//! ```
//! use depthswap::depth::DepthFrame;
//! use depthswap::source::{DepthSource, TestSource};
//!
//! let mut stored = DepthFrame::with_capacity(1);
//! stored.xyz[..3].copy_from_slice(&[0.0, 0.0, 2.0]);
//! stored.count = 1;
//!
//! let mut source = TestSource::new(vec![stored]);
//! let mut frame = DepthFrame::default();
//!
//! assert!(source.next_frame(&mut frame).unwrap());
//! assert_eq!(frame.count, 1);
//!
//! // Finite sources report exhaustion instead of erroring.
//! assert!(!source.next_frame(&mut frame).unwrap());
//! ```

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::buffer::FLOATS_PER_POINT;
use crate::depth::{DepthFrame, DevicePose, Error, timestamp};

/// Trait for depth frame sources.
///
/// Implementations overwrite the client's frame in place, growing its
/// coordinate storage when a cloud is larger than the frame has seen before.
pub trait DepthSource: Send {
    /// Fill `frame` with the next cloud, pose, and timestamp.
    ///
    /// # Returns
    /// - `Ok(true)` - a frame was produced
    /// - `Ok(false)` - the source is exhausted
    /// - `Err` - source error
    fn next_frame(&mut self, frame: &mut DepthFrame) -> Result<bool, Error>;

    /// Check if more frames are available.
    ///
    /// For infinite sources (live sensors, synthetic), always returns
    /// `true`. For finite sources, returns `false` when exhausted.
    fn has_more(&self) -> bool;
}

/// Test frame source for unit testing.
///
/// Replays a sequence of pre-defined frames without hardware. Stored frames
/// must be well formed (`xyz` holding at least `3 * count` values).
pub struct TestSource {
    frames: Vec<DepthFrame>,
    index: usize,
}

impl TestSource {
    /// Create a new test source with the given frames.
    pub fn new(frames: Vec<DepthFrame>) -> Self {
        Self { frames, index: 0 }
    }

    /// Create an empty test source.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Reset the source to the beginning.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Get the number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get the current index.
    pub fn current_index(&self) -> usize {
        self.index
    }
}

impl DepthSource for TestSource {
    fn next_frame(&mut self, frame: &mut DepthFrame) -> Result<bool, Error> {
        let Some(stored) = self.frames.get(self.index) else {
            return Ok(false);
        };

        let floats = stored.count * FLOATS_PER_POINT;
        if frame.xyz.len() < floats {
            frame.xyz.resize(floats, 0.0);
        }
        frame.xyz[..floats].copy_from_slice(&stored.xyz[..floats]);
        frame.count = stored.count;
        frame.timestamp = stored.timestamp;
        frame.pose = stored.pose;

        self.index += 1;
        Ok(true)
    }

    fn has_more(&self) -> bool {
        self.index < self.frames.len()
    }
}

/// Procedural depth source standing in for a live sensor.
///
/// Generates clouds sampling a floor patch and a facing wall, with a slowly
/// drifting device pose and real acquisition timestamps. Deterministic for
/// a given seed, so demo runs and benchmarks are repeatable.
pub struct SyntheticSource {
    rng: StdRng,
    points: usize,
    frame_idx: u64,
}

impl SyntheticSource {
    /// Create a source producing `points` points per frame from `seed`.
    pub fn new(points: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            points,
            frame_idx: 0,
        }
    }

    /// Points per generated frame.
    pub fn points(&self) -> usize {
        self.points
    }
}

impl DepthSource for SyntheticSource {
    fn next_frame(&mut self, frame: &mut DepthFrame) -> Result<bool, Error> {
        let floats = self.points * FLOATS_PER_POINT;
        if frame.xyz.len() < floats {
            frame.xyz.resize(floats, 0.0);
        }

        for i in 0..self.points {
            // Mostly floor below the device, the rest a wall ahead.
            let (x, y, z) = if i % 10 < 7 {
                (
                    self.rng.gen_range(-1.5f32..1.5),
                    -1.4 + self.rng.gen_range(-0.005f32..0.005),
                    self.rng.gen_range(0.5f32..3.0),
                )
            } else {
                (
                    self.rng.gen_range(-1.5f32..1.5),
                    self.rng.gen_range(-1.4f32..0.6),
                    2.5 + self.rng.gen_range(-0.005f32..0.005),
                )
            };
            let base = i * FLOATS_PER_POINT;
            frame.xyz[base] = x;
            frame.xyz[base + 1] = y;
            frame.xyz[base + 2] = z;
        }
        frame.count = self.points;
        frame.timestamp = timestamp()?;

        // Slow sideways drift with a gentle turn, like a handheld device.
        let drift = self.frame_idx as f64;
        frame.pose = DevicePose::new(
            Isometry3::from_parts(
                Translation3::new(0.002 * drift, 0.0, 0.0),
                UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.0005 * drift),
            ),
            frame.timestamp,
        );

        self.frame_idx += 1;
        Ok(true)
    }

    fn has_more(&self) -> bool {
        true // Synthetic sources are infinite
    }
}
