// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Plane fit request assembly.
//!
//! Interactive plane fitting needs a consistent snapshot of the world: the
//! cloud the user was looking at, the device pose when that cloud was
//! captured, the pose when the user tapped, and the camera calibration that
//! maps the tap's image coordinates into rays. This module keeps the
//! cloud-plus-pose half of that snapshot in a [`FitBuffer`] and assembles
//! the whole package into a [`PlaneFitQuery`] on demand.
//!
//! The fit slot is deliberately separate from the render exchange in
//! [`crate::exchange`]: it has its own lock, its own (single) buffer, and it
//! copies data in and out instead of swapping references. Fit requests are
//! rare and happen on an interaction thread, so copy cost is irrelevant
//! there, while the exchange's swap-only discipline keeps the sensor and
//! render threads fast. No code path takes both locks.
//!
//! Fitting geometry itself stays outside the crate. Implement
//! [`PlaneFitter`] to plug in a solver; [`FitGeometry`] supplies the
//! relative transform between the two stamped poses, with
//! [`FixedExtrinsics`] covering the common rigid-device case.
//!
//! # Example
//!
//! ```
//! use depthswap::depth::{CameraIntrinsics, DepthFrame, DevicePose};
//! use depthswap::fit::{FitBuffer, FixedExtrinsics};
//!
//! let fit = FitBuffer::new(CameraIntrinsics::default());
//!
//! let mut frame = DepthFrame::with_capacity(4);
//! frame.xyz[..3].copy_from_slice(&[0.0, 0.0, 1.5]);
//! frame.count = 1;
//! frame.timestamp = 1_000;
//! fit.update(&frame).unwrap();
//!
//! let query = fit
//!     .prepare_fit_request(0.5, 0.5, &DevicePose::default(), &FixedExtrinsics::default())
//!     .unwrap();
//! assert_eq!(query.count, 1);
//! assert_eq!(query.cloud_timestamp, 1_000);
//! ```

use nalgebra::{Isometry3, Point3};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::{CloudBuffer, FLOATS_PER_POINT};
use crate::depth::{CameraIntrinsics, DepthFrame, DevicePose, Error};

/// Latest cloud retained for fitting, together with its stamps.
#[derive(Debug)]
struct FitSlot {
    cloud: CloudBuffer,
    timestamp: u64,
    pose: DevicePose,
}

/// Single-slot store of the most recent cloud and the pose it was captured
/// under.
///
/// [`update`](Self::update) overwrites the slot wholesale, so cloud and pose
/// can never drift apart. The slot's backing storage is allocated on the
/// first update, grows when a larger cloud arrives, and is reused otherwise.
///
/// Shared between the sensor thread (updating) and an interaction thread
/// (requesting fits); wrap in an `Arc` for that.
#[derive(Debug)]
pub struct FitBuffer {
    intrinsics: CameraIntrinsics,
    slot: Mutex<Option<FitSlot>>,
}

impl FitBuffer {
    /// Create an empty fit buffer carrying the camera calibration that all
    /// assembled requests will reference.
    pub fn new(intrinsics: CameraIntrinsics) -> Self {
        Self {
            intrinsics,
            slot: Mutex::new(None),
        }
    }

    /// The calibration captured at construction.
    #[inline]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// True once at least one cloud has been stored.
    pub fn has_cloud(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Store `frame` as the cloud to fit against, replacing any previous
    /// one. Coordinates, timestamp, and pose are taken together under the
    /// slot lock.
    ///
    /// # Errors
    ///
    /// [`Error::ShortCloud`] when the frame's slice cannot hold its declared
    /// point count, including counts so large that `3 * count` overflows
    /// `usize`; the slot keeps its previous content.
    pub fn update(&self, frame: &DepthFrame) -> Result<(), Error> {
        let covered = frame
            .count
            .checked_mul(FLOATS_PER_POINT)
            .is_some_and(|floats| frame.xyz.len() >= floats);
        if !covered {
            return Err(Error::ShortCloud {
                floats: frame.xyz.len(),
                count: frame.count,
            });
        }

        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(s) => {
                s.cloud.copy_from(&frame.xyz, frame.count);
                s.timestamp = frame.timestamp;
                s.pose = frame.pose;
            }
            None => {
                debug!("first cloud retained for fitting, {} points", frame.count);
                let mut cloud = CloudBuffer::with_capacity(frame.count);
                cloud.copy_from(&frame.xyz, frame.count);
                *slot = Some(FitSlot {
                    cloud,
                    timestamp: frame.timestamp,
                    pose: frame.pose,
                });
            }
        }
        Ok(())
    }

    /// Assemble everything a plane fit needs around the image point
    /// `(u, v)` (normalized coordinates in the calibrated camera's image).
    ///
    /// Copies the retained cloud out under the slot lock, then asks
    /// `geometry` for the transform between the cloud's capture pose and
    /// `tap_pose`. The returned query owns its data; later updates do not
    /// touch it.
    ///
    /// # Errors
    ///
    /// [`Error::NoCloud`] when no cloud has been stored yet.
    pub fn prepare_fit_request(
        &self,
        u: f32,
        v: f32,
        tap_pose: &DevicePose,
        geometry: &impl FitGeometry,
    ) -> Result<PlaneFitQuery, Error> {
        let (coords, count, cloud_pose, cloud_timestamp) = {
            let guard = self.slot.lock();
            let slot = guard.as_ref().ok_or(Error::NoCloud)?;
            (
                slot.cloud.coords().to_vec(),
                slot.cloud.len(),
                slot.pose,
                slot.timestamp,
            )
        };

        let color_from_depth = geometry.relative_transform(tap_pose, &cloud_pose);
        trace!(
            "assembled fit request: {} points at uv=({:.3}, {:.3})",
            count,
            u,
            v
        );

        Ok(PlaneFitQuery {
            coords,
            count,
            intrinsics: self.intrinsics,
            color_from_depth,
            u,
            v,
            cloud_timestamp,
        })
    }

    /// Assemble a request and hand it straight to `fitter`.
    ///
    /// Returns `Ok(None)` when the solver finds no plane near `(u, v)`.
    pub fn fit_plane(
        &self,
        u: f32,
        v: f32,
        tap_pose: &DevicePose,
        geometry: &impl FitGeometry,
        fitter: &impl PlaneFitter,
    ) -> Result<Option<PlaneFit>, Error> {
        let query = self.prepare_fit_request(u, v, tap_pose, geometry)?;
        Ok(fitter.fit(&query))
    }
}

/// Everything an external plane solver needs, marshalled into one owned
/// value.
#[derive(Debug, Clone)]
pub struct PlaneFitQuery {
    /// Interleaved `x y z` coordinates, `3 * count` values, in the depth
    /// camera frame at capture time.
    pub coords: Vec<f32>,
    /// Valid points in `coords`.
    pub count: usize,
    /// Calibration of the camera `(u, v)` refers to.
    pub intrinsics: CameraIntrinsics,
    /// Maps depth-camera coordinates at capture time into the calibrated
    /// camera's frame at interaction time.
    pub color_from_depth: Isometry3<f64>,
    /// Normalized horizontal image coordinate of the interaction point.
    pub u: f32,
    /// Normalized vertical image coordinate of the interaction point.
    pub v: f32,
    /// Capture timestamp of the cloud, nanoseconds.
    pub cloud_timestamp: u64,
}

/// Result of a plane fit: the surface point hit by the interaction ray and
/// the plane model around it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneFit {
    /// Intersection of the interaction ray with the fitted plane.
    pub intersection: Point3<f64>,
    /// Plane coefficients `[a, b, c, d]` with `ax + by + cz + d = 0` and
    /// unit normal `(a, b, c)`.
    pub plane: [f64; 4],
}

/// Supplies the relative transform between the interaction pose and the
/// cloud capture pose.
pub trait FitGeometry {
    /// Transform mapping depth-camera coordinates under `cloud_pose` into
    /// the calibrated camera's frame under `tap_pose`.
    fn relative_transform(
        &self,
        tap_pose: &DevicePose,
        cloud_pose: &DevicePose,
    ) -> Isometry3<f64>;
}

/// External plane solver seam. The crate assembles queries; implementations
/// do the geometry.
pub trait PlaneFitter {
    /// Fit a plane near the query's interaction point, or report that none
    /// was found.
    fn fit(&self, query: &PlaneFitQuery) -> Option<PlaneFit>;
}

/// Rigid-device geometry: fixed transforms from the device body to each
/// camera, composed around the two stamped device poses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedExtrinsics {
    /// Device body to color camera.
    pub device_from_color: Isometry3<f64>,
    /// Device body to depth camera.
    pub device_from_depth: Isometry3<f64>,
}

impl Default for FixedExtrinsics {
    /// Both cameras coincident with the device body. Useful for sensors
    /// that already report poses in the camera frame, and for tests.
    fn default() -> Self {
        Self {
            device_from_color: Isometry3::identity(),
            device_from_depth: Isometry3::identity(),
        }
    }
}

impl FitGeometry for FixedExtrinsics {
    fn relative_transform(
        &self,
        tap_pose: &DevicePose,
        cloud_pose: &DevicePose,
    ) -> Isometry3<f64> {
        let world_from_color = tap_pose.transform * self.device_from_color;
        let world_from_depth = cloud_pose.transform * self.device_from_depth;
        world_from_color.inv_mul(&world_from_depth)
    }
}
