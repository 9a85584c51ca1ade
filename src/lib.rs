// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Depth Cloud Exchange Library
//!
//! This library moves point clouds from a depth sensor's callback thread to
//! a render thread with bounded latency and no allocation or copying in the
//! hand-off, and assembles plane fit requests against the most recent cloud.
//!
//! # Architecture
//!
//! Three pre-allocated buffers rotate between the producer, a shared slot,
//! and the consumer; only references move across threads:
//!
//! ```text
//! ┌─────────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │  DepthSource    │ ──► │  CloudWriter  │ ◄─► │  shared slot    │
//! │  (sensor/test)  │     │  ingest()     │swap │  + fresh flag   │
//! └─────────────────┘     └───────────────┘     └─────────────────┘
//!         │                                              ▲
//!         │ update()                                swap │
//!         ▼                                              ▼
//! ┌─────────────────┐                           ┌─────────────────┐
//! │  FitBuffer      │ ──► PlaneFitQuery         │  CloudReader    │
//! │  (cloud + pose) │     (for PlaneFitter)     │  latest()       │
//! └─────────────────┘                           └─────────────────┘
//! ```
//!
//! The exchange is latest-wins: when the sensor outruns the renderer,
//! superseded clouds are overwritten in the shared slot and the renderer
//! always picks up the newest complete one. Both critical sections swap a
//! buffer and toggle a flag, nothing more, so neither thread can delay the
//! other by more than a pointer exchange.
//!
//! The fit path is independent by design. It keeps one copy of the latest
//! cloud together with the device pose it was captured under, behind its
//! own lock, and packages cloud, calibration, relative transform, and the
//! interaction point into a [`fit::PlaneFitQuery`] for an external solver.
//!
//! # Modules
//!
//! - [`buffer`]: Pre-allocated interleaved cloud storage
//! - [`depth`]: Common types, error handling, timestamps
//! - [`exchange`]: The writer/reader cloud exchange
//! - [`fit`]: Plane fit request assembly and collaborator traits
//! - [`source`]: Depth frame source abstraction for testing and demos
//!
//! # Example
//!
//! ```
//! use depthswap::exchange;
//! use std::thread;
//!
//! let (mut writer, mut reader) = exchange::pair(4);
//!
//! let sensor = thread::spawn(move || {
//!     for i in 0..3 {
//!         let v = i as f32;
//!         writer.ingest(&[v, v, v], 1).unwrap();
//!     }
//! });
//! sensor.join().unwrap();
//!
//! // The renderer sees the newest cloud, earlier ones were superseded.
//! let cloud = reader.latest();
//! assert_eq!(cloud.len(), 1);
//! assert_eq!(cloud.point(0), [2.0, 2.0, 2.0]);
//! ```

pub mod buffer;
pub mod depth;
pub mod exchange;
pub mod fit;
pub mod source;

// Re-exports for convenience
pub use buffer::CloudBuffer;
pub use depth::{CameraIntrinsics, DepthFrame, DevicePose, Error};
pub use exchange::{CloudReader, CloudWriter, pair};
pub use fit::{FitBuffer, FitGeometry, FixedExtrinsics, PlaneFit, PlaneFitQuery, PlaneFitter};
pub use source::{DepthSource, SyntheticSource, TestSource};
