// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Pre-allocated point cloud storage.
//!
//! This module provides the fixed-capacity buffer underlying the exchange in
//! [`crate::exchange`] and the fit slot in [`crate::fit`]. Coordinates are
//! stored interleaved (`x0 y0 z0 x1 y1 z1 ...`) in a single backing array
//! that is allocated once and reused for every frame, so steady-state
//! operation performs no allocations. The valid-point count travels inside
//! the buffer, which keeps data and count paired when buffers are exchanged
//! by reference.
//!
//! Capacity never shrinks. When a frame larger than the current capacity
//! arrives, [`CloudBuffer::copy_from`] replaces the backing array with a
//! larger one and the buffer stays at that size from then on.
//!
//! # Example
//!
//! ```
//! use depthswap::buffer::CloudBuffer;
//!
//! let mut buf = CloudBuffer::with_capacity(4);
//! buf.push(1.0, 2.0, 3.0);
//! buf.push(4.0, 5.0, 6.0);
//!
//! assert_eq!(buf.len(), 2);
//! assert_eq!(buf.coords(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//!
//! // Bulk overwrite from a sensor frame
//! buf.copy_from(&[9.0, 9.0, 9.0], 1);
//! assert_eq!(buf.len(), 1);
//! assert_eq!(buf.point(0), [9.0, 9.0, 9.0]);
//! ```

/// Default per-buffer capacity in points.
///
/// Sized for the largest cloud a structured-light depth camera emits in a
/// single frame; smaller sensors simply leave the tail unused.
pub const DEFAULT_CLOUD_CAPACITY: usize = 60_000;

/// Values per point in the interleaved layout (`x`, `y`, `z`).
pub const FLOATS_PER_POINT: usize = 3;

/// Pre-allocated interleaved point cloud buffer.
///
/// Stores `x y z` triples contiguously with a separate count of valid
/// points. The backing array always spans the full capacity; `clear()` and
/// shorter frames only move the count, they never release or zero memory.
#[derive(Debug, Clone)]
pub struct CloudBuffer {
    xyz: Vec<f32>,
    count: usize,
}

impl CloudBuffer {
    /// Create a new buffer with room for `capacity` points.
    ///
    /// Memory is allocated once here; no allocations occur during normal
    /// operation unless a frame exceeds the capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xyz: vec![0.0; capacity * FLOATS_PER_POINT],
            count: 0,
        }
    }

    /// Returns the number of valid points in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true if the buffer contains no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the maximum number of points the buffer can currently hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.xyz.len() / FLOATS_PER_POINT
    }

    /// Clear all points, resetting the count to zero.
    ///
    /// Does NOT zero the underlying memory; the buffer retains its capacity
    /// and no allocations occur.
    #[inline]
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Add a single point to the buffer.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if the buffer is full. In release mode, points
    /// beyond capacity are silently ignored.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32) {
        debug_assert!(
            self.count < self.capacity(),
            "CloudBuffer overflow: {} >= {}",
            self.count,
            self.capacity()
        );

        if self.count < self.capacity() {
            let base = self.count * FLOATS_PER_POINT;
            self.xyz[base] = x;
            self.xyz[base + 1] = y;
            self.xyz[base + 2] = z;
            self.count += 1;
        }
    }

    /// Returns the valid coordinates as one interleaved slice of length
    /// `3 * len()`.
    #[inline]
    pub fn coords(&self) -> &[f32] {
        &self.xyz[..self.count * FLOATS_PER_POINT]
    }

    /// Returns the `idx`-th point as `[x, y, z]`.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= len()`.
    #[inline]
    pub fn point(&self, idx: usize) -> [f32; 3] {
        assert!(idx < self.count, "point {} out of range {}", idx, self.count);
        let base = idx * FLOATS_PER_POINT;
        [self.xyz[base], self.xyz[base + 1], self.xyz[base + 2]]
    }

    /// Overwrite the buffer with `count` points taken from an interleaved
    /// coordinate slice.
    ///
    /// Grows the backing array when `count` exceeds the current capacity and
    /// keeps the larger allocation afterwards. Growth replaces the backing
    /// array outright; previous contents are not carried over. Within
    /// capacity this is a plain `copy_from_slice` with no allocation.
    ///
    /// # Panics
    ///
    /// Panics if `3 * count` overflows `usize` or `coords` holds fewer than
    /// `3 * count` values. Callers that accept counts from outside the crate
    /// should validate first; the exchange front door
    /// [`crate::exchange::CloudWriter::ingest`] does.
    pub fn copy_from(&mut self, coords: &[f32], count: usize) {
        let floats = count
            .checked_mul(FLOATS_PER_POINT)
            .expect("point count overflows the coordinate space");
        if self.xyz.len() < floats {
            self.xyz = vec![0.0; floats];
        }
        self.xyz[..floats].copy_from_slice(&coords[..floats]);
        self.count = count;
    }
}

impl Default for CloudBuffer {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_buffer_basic() {
        let mut buf = CloudBuffer::with_capacity(100);
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 100);

        buf.push(1.0, 2.0, 3.0);
        assert_eq!(buf.len(), 1);
        assert!(!buf.is_empty());
        assert_eq!(buf.point(0), [1.0, 2.0, 3.0]);

        buf.push(4.0, 5.0, 6.0);
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.coords(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        buf.clear();
        assert_eq!(buf.len(), 0);
        assert!(buf.is_empty());
        // Capacity unchanged
        assert_eq!(buf.capacity(), 100);
    }

    #[test]
    fn test_coords_covers_valid_region_only() {
        let mut buf = CloudBuffer::with_capacity(10);
        for i in 0..5 {
            buf.push(i as f32, (i * 2) as f32, (i * 3) as f32);
        }

        assert_eq!(buf.coords().len(), 15);
        assert_eq!(buf.point(4), [4.0, 8.0, 12.0]);
    }

    #[test]
    #[cfg_attr(debug_assertions, ignore)]
    fn test_push_overflow_ignored() {
        // Runs in release mode only since debug_assert! panics in debug.
        let mut buf = CloudBuffer::with_capacity(2);
        buf.push(1.0, 1.0, 1.0);
        buf.push(2.0, 2.0, 2.0);
        // Third push exceeds capacity and is silently ignored in release.
        buf.push(3.0, 3.0, 3.0);

        assert_eq!(buf.len(), 2);
        assert_eq!(buf.point(1), [2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_copy_from_within_capacity_keeps_allocation() {
        let mut buf = CloudBuffer::with_capacity(8);
        let before = buf.coords().as_ptr();

        let frame: Vec<f32> = (0..24).map(|v| v as f32).collect();
        buf.copy_from(&frame, 8);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.coords().as_ptr(), before);

        // A shorter frame reuses the same backing array as well.
        buf.copy_from(&[7.0, 8.0, 9.0], 1);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.coords().as_ptr(), before);
        assert_eq!(buf.point(0), [7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_copy_from_grows_and_stays_grown() {
        let mut buf = CloudBuffer::with_capacity(2);

        let frame: Vec<f32> = (0..30).map(|v| v as f32).collect();
        buf.copy_from(&frame, 10);
        assert_eq!(buf.len(), 10);
        assert!(buf.capacity() >= 10);
        assert_eq!(buf.coords(), &frame[..]);

        // Shrinking never happens, a later small frame keeps the capacity.
        buf.copy_from(&[1.0, 2.0, 3.0], 1);
        assert!(buf.capacity() >= 10);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    #[should_panic(expected = "overflows")]
    fn test_copy_from_overflowing_count_panics() {
        let mut buf = CloudBuffer::with_capacity(4);
        // 3 * count wraps usize; the wrapped value must never be used.
        buf.copy_from(&[1.0, 2.0, 3.0], usize::MAX / FLOATS_PER_POINT + 1);
    }

    #[test]
    fn test_copy_from_ignores_slice_tail() {
        let mut buf = CloudBuffer::with_capacity(4);
        // Slice holds 4 points but only 2 are declared valid.
        let frame: Vec<f32> = (0..12).map(|v| v as f32).collect();
        buf.copy_from(&frame, 2);

        assert_eq!(buf.len(), 2);
        assert_eq!(buf.coords(), &frame[..6]);
    }

    #[test]
    fn test_clone_detaches_storage() {
        let mut buf = CloudBuffer::with_capacity(4);
        buf.push(1.0, 2.0, 3.0);

        let mut copy = buf.clone();
        copy.push(4.0, 5.0, 6.0);

        assert_eq!(buf.len(), 1);
        assert_eq!(copy.len(), 2);
        assert_ne!(buf.coords().as_ptr(), copy.coords().as_ptr());
    }
}
