// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Common depth camera types shared across the crate.
//!
//! This module provides the sensor-agnostic frame, pose, and intrinsics
//! types used by the exchange, the fit path, and frame sources, plus the
//! crate-wide error type.

use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::buffer::FLOATS_PER_POINT;

/// One depth frame as delivered by a sensor callback.
///
/// Coordinates are interleaved `x y z` triples in the depth camera frame.
/// The slice may be larger than the valid region; `count` says how many
/// points are real. Consumers must not read past `count * 3` values, and
/// [`crate::exchange::CloudWriter::ingest`] rejects frames whose slice
/// cannot even hold `count` points.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    /// Interleaved coordinates, `3 * count` valid values.
    pub xyz: Vec<f32>,
    /// Number of valid points in `xyz`.
    pub count: usize,
    /// Acquisition timestamp in nanoseconds.
    pub timestamp: u64,
    /// Device pose at acquisition time.
    pub pose: DevicePose,
}

impl DepthFrame {
    /// Create an empty frame with room for `capacity` points.
    ///
    /// Sources fill the frame in place, so allocating it once at the
    /// expected sensor resolution avoids per-frame allocations.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xyz: vec![0.0; capacity * FLOATS_PER_POINT],
            count: 0,
            timestamp: 0,
            pose: DevicePose::default(),
        }
    }
}

impl Default for DepthFrame {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

/// A stamped device pose.
///
/// `transform` maps device coordinates into the world (start-of-service)
/// frame. Poses are sampled at cloud acquisition and at interaction time,
/// and the difference between two of them drives the fit request assembly
/// in [`crate::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePose {
    /// Device-to-world transform.
    pub transform: Isometry3<f64>,
    /// Sample timestamp in nanoseconds.
    pub timestamp: u64,
}

impl DevicePose {
    pub fn new(transform: Isometry3<f64>, timestamp: u64) -> Self {
        Self {
            transform,
            timestamp,
        }
    }
}

impl Default for DevicePose {
    fn default() -> Self {
        Self {
            transform: Isometry3::identity(),
            timestamp: 0,
        }
    }
}

/// Pinhole camera calibration for the camera the interaction coordinates
/// refer to.
///
/// Loaded once (from the sensor stack or a JSON calibration file) and
/// captured by [`crate::fit::FitBuffer`] at construction, then attached to
/// every fit request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Focal length in pixels, horizontal.
    pub fx: f64,
    /// Focal length in pixels, vertical.
    pub fy: f64,
    /// Principal point, horizontal.
    pub cx: f64,
    /// Principal point, vertical.
    pub cy: f64,
    /// Polynomial distortion coefficients, zero when unknown.
    #[serde(default)]
    pub distortion: [f64; 5],
}

impl Default for CameraIntrinsics {
    /// Calibration of a typical mobile RGB camera, used by the demo when no
    /// calibration file is given.
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fx: 1043.0,
            fy: 1043.0,
            cx: 637.0,
            cy: 362.0,
            distortion: [0.0; 5],
        }
    }
}

/// Common error type for depth cloud operations.
#[derive(Debug)]
pub enum Error {
    /// I/O error (clock, file operations)
    Io(std::io::Error),
    /// Coordinate slice too short for the declared point count
    ShortCloud {
        /// Values actually present in the slice
        floats: usize,
        /// Points the caller declared valid
        count: usize,
    },
    /// No point cloud has been received yet
    NoCloud,
    /// System time error
    SystemTime(std::time::SystemTimeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::ShortCloud { floats, count } => write!(
                f,
                "short cloud: {} points need {} values, slice holds {}",
                count,
                count * FLOATS_PER_POINT,
                floats
            ),
            Error::NoCloud => write!(f, "no point cloud available yet"),
            Error::SystemTime(err) => write!(f, "system time error: {}", err),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<std::time::SystemTimeError> for Error {
    fn from(err: std::time::SystemTimeError) -> Self {
        Error::SystemTime(err)
    }
}

/// Get current timestamp in nanoseconds.
///
/// On Linux, uses `CLOCK_MONOTONIC_RAW` for best accuracy.
/// On other platforms, falls back to `SystemTime`.
#[cfg(target_os = "linux")]
pub fn timestamp() -> Result<u64, Error> {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(tp.tv_sec as u64 * 1_000_000_000 + tp.tv_nsec as u64)
}

#[cfg(not(target_os = "linux"))]
pub fn timestamp() -> Result<u64, Error> {
    let now = std::time::SystemTime::now();
    let duration = now.duration_since(std::time::UNIX_EPOCH)?;
    Ok(duration.as_nanos() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion, Vector3};

    #[test]
    fn test_short_cloud_display() {
        let err = Error::ShortCloud {
            floats: 5,
            count: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("2 points"));
        assert!(msg.contains("6 values"));
        assert!(msg.contains("holds 5"));
    }

    #[test]
    fn test_device_pose_roundtrip() {
        let transform = Isometry3::from_parts(
            Translation3::new(0.5, -1.0, 2.0),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.25),
        );
        let pose = DevicePose::new(transform, 42);

        let p = pose.transform * nalgebra::Point3::new(0.0, 0.0, 0.0);
        assert!((p.x - 0.5).abs() < 1e-12);
        assert!((p.y + 1.0).abs() < 1e-12);
        assert!((p.z - 2.0).abs() < 1e-12);
        assert_eq!(pose.timestamp, 42);
    }

    #[test]
    fn test_intrinsics_json() {
        let json = r#"{
            "width": 1280, "height": 720,
            "fx": 1042.8, "fy": 1042.8, "cx": 637.3, "cy": 362.1
        }"#;
        let intr: CameraIntrinsics = serde_json::from_str(json).unwrap();
        assert_eq!(intr.width, 1280);
        assert_eq!(intr.distortion, [0.0; 5]);

        let back = serde_json::to_string(&intr).unwrap();
        let again: CameraIntrinsics = serde_json::from_str(&back).unwrap();
        assert_eq!(intr, again);
    }

    #[test]
    fn test_timestamp_monotonic() {
        let a = timestamp().unwrap();
        let b = timestamp().unwrap();
        assert!(b >= a);
    }
}
