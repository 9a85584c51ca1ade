// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Latest-snapshot point cloud exchange between two threads.
//!
//! This module provides the hand-off at the heart of the crate: a sensor
//! callback thread deposits complete clouds through a [`CloudWriter`] while a
//! render thread picks up the most recent one through a [`CloudReader`].
//! Three [`CloudBuffer`]s rotate between the two sides and a shared slot, so
//! steady-state operation exchanges references only; cloud data is copied
//! exactly once, from the sensor's slice into the writer's buffer, outside
//! any lock.
//!
//! # Architecture
//!
//! ```text
//!  sensor thread                                   render thread
//!  ┌───────────────┐                             ┌───────────────┐
//!  │  CloudWriter  │                             │  CloudReader  │
//!  │  ┌──────────┐ │    ┌───────────────────┐    │  ┌──────────┐ │
//!  │  │ callback │ │ ←→ │  Mutex            │ ←→ │  │ render   │ │
//!  │  │ buffer   │ │swap│  ┌─────────────┐  │swap│  │ buffer   │ │
//!  │  └──────────┘ │    │  │ shared buf  │  │    │  └──────────┘ │
//!  └───────────────┘    │  │ fresh: bool │  │    └───────────────┘
//!                       │  └─────────────┘  │
//!                       └───────────────────┘
//! ```
//!
//! The writer swaps its filled buffer into the shared slot and raises the
//! `fresh` flag; the reader swaps the slot out when the flag is up and
//! clears it. Both critical sections are O(1) regardless of cloud size, so
//! neither thread can stall the other for longer than a pointer exchange.
//! When the sensor outruns the renderer, superseded clouds are simply
//! overwritten in the slot: the reader always observes the newest complete
//! cloud, never a partial or stale mix.
//!
//! Each buffer carries its own point count, so a swap can never pair one
//! frame's coordinates with another frame's count.
//!
//! # Example
//!
//! ```
//! use depthswap::exchange;
//!
//! let (mut writer, mut reader) = exchange::pair(4);
//! writer.ingest(&[1.0, 2.0, 3.0], 1).unwrap();
//!
//! let cloud = reader.latest();
//! assert_eq!(cloud.len(), 1);
//! assert_eq!(cloud.point(0), [1.0, 2.0, 3.0]);
//! ```

use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use tracing::debug;

use crate::buffer::{CloudBuffer, FLOATS_PER_POINT};
use crate::depth::Error;

/// The middle slot of the exchange plus the freshness flag, always accessed
/// together under the one lock both handles share.
#[derive(Debug)]
struct SharedSlot {
    buf: CloudBuffer,
    fresh: bool,
}

/// Create a connected writer/reader pair with `capacity` points per buffer.
///
/// Allocates all three buffers up front. Capacities grow later only if a
/// larger frame arrives. The writer belongs on the sensor callback thread
/// and the reader on the render thread; both handles are `Send`, and
/// `ingest` and `latest` take `&mut self`, so exclusive use of each
/// endpoint is enforced by the borrow checker rather than by the lock.
pub fn pair(capacity: usize) -> (CloudWriter, CloudReader) {
    let shared = Arc::new(Mutex::new(SharedSlot {
        buf: CloudBuffer::with_capacity(capacity),
        fresh: false,
    }));

    let writer = CloudWriter {
        callback: CloudBuffer::with_capacity(capacity),
        shared: shared.clone(),
    };
    let reader = CloudReader {
        render: CloudBuffer::with_capacity(capacity),
        shared,
    };

    (writer, reader)
}

/// Producer endpoint of the exchange.
///
/// Owns the callback-role buffer outright; only [`ingest`](Self::ingest)
/// touches the shared slot, and only to swap.
#[derive(Debug)]
pub struct CloudWriter {
    callback: CloudBuffer,
    shared: Arc<Mutex<SharedSlot>>,
}

impl CloudWriter {
    /// Deposit a complete cloud for the reader to pick up.
    ///
    /// `coords` holds interleaved `x y z` values of which the first
    /// `3 * count` are valid; any tail beyond that is ignored. The data is
    /// copied into the writer's own buffer first (growing it when `count`
    /// exceeds capacity), then the filled buffer changes places with the
    /// shared slot under the lock. A cloud still sitting in the slot is
    /// superseded, not queued.
    ///
    /// # Errors
    ///
    /// [`Error::ShortCloud`] when the slice cannot hold `count` points,
    /// including counts so large that `3 * count` overflows `usize`. The
    /// frame is rejected whole and neither buffers nor flag change.
    pub fn ingest(&mut self, coords: &[f32], count: usize) -> Result<(), Error> {
        let covered = count
            .checked_mul(FLOATS_PER_POINT)
            .is_some_and(|floats| coords.len() >= floats);
        if !covered {
            return Err(Error::ShortCloud {
                floats: coords.len(),
                count,
            });
        }

        if count > self.callback.capacity() {
            debug!(
                "growing cloud buffer from {} to {} points",
                self.callback.capacity(),
                count
            );
        }
        self.callback.copy_from(coords, count);

        let mut slot = self.shared.lock();
        mem::swap(&mut self.callback, &mut slot.buf);
        slot.fresh = true;
        Ok(())
    }

    /// Current capacity of the buffer the next frame will be copied into.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.callback.capacity()
    }
}

/// Consumer endpoint of the exchange.
///
/// Owns the render-role buffer outright. [`latest`](Self::latest) returns a
/// borrow of it, which the borrow checker confines to the span before the
/// next `latest` call; the content is guaranteed stable for exactly that
/// long.
#[derive(Debug)]
pub struct CloudReader {
    render: CloudBuffer,
    shared: Arc<Mutex<SharedSlot>>,
}

impl CloudReader {
    /// Return the most recent complete cloud.
    ///
    /// When the writer has deposited a new cloud since the last call, the
    /// shared slot and the render buffer change places under the lock and
    /// the freshness flag is cleared. Otherwise the render buffer is
    /// returned as-is; repeated calls without producer activity perform no
    /// swap and observe identical content.
    ///
    /// Before the first deposit this returns the initial empty buffer
    /// (`len() == 0`).
    pub fn latest(&mut self) -> &CloudBuffer {
        let mut slot = self.shared.lock();
        if slot.fresh {
            mem::swap(&mut self.render, &mut slot.buf);
            slot.fresh = false;
        }
        drop(slot);

        &self.render
    }

    /// True if a cloud newer than the one last returned is waiting.
    pub fn has_fresh(&self) -> bool {
        self.shared.lock().fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn frame(value: f32, count: usize) -> Vec<f32> {
        vec![value; count * FLOATS_PER_POINT]
    }

    #[test]
    fn test_empty_exchange() {
        let (_writer, mut reader) = pair(16);

        assert!(!reader.has_fresh());
        let first = reader.latest().coords().as_ptr() as usize;
        assert!(reader.latest().is_empty());
        // No producer activity, no swap.
        assert_eq!(reader.latest().coords().as_ptr() as usize, first);
    }

    #[test]
    fn test_ingest_then_latest() {
        let (mut writer, mut reader) = pair(16);

        writer.ingest(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2).unwrap();
        assert!(reader.has_fresh());

        let cloud = reader.latest();
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.coords(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(!reader.has_fresh());
    }

    #[test]
    fn test_latest_wins() {
        let (mut writer, mut reader) = pair(16);

        writer.ingest(&frame(1.0, 4), 4).unwrap();
        writer.ingest(&frame(2.0, 8), 8).unwrap();
        writer.ingest(&frame(3.0, 2), 2).unwrap();

        // Only the newest deposit is observable, the rest were superseded.
        let cloud = reader.latest();
        assert_eq!(cloud.len(), 2);
        assert!(cloud.coords().iter().all(|&v| v == 3.0));
    }

    #[test]
    fn test_no_spurious_swap() {
        let (mut writer, mut reader) = pair(16);
        writer.ingest(&frame(7.0, 3), 3).unwrap();

        let first = reader.latest().coords().as_ptr() as usize;
        let second = reader.latest().coords().as_ptr() as usize;
        assert_eq!(first, second);
        assert_eq!(reader.latest().len(), 3);
    }

    #[test]
    fn test_short_cloud_rejected_whole() {
        let (mut writer, mut reader) = pair(16);
        writer.ingest(&frame(1.0, 2), 2).unwrap();
        assert_eq!(reader.latest().len(), 2);

        // 4 floats cannot hold 2 points.
        let err = writer.ingest(&[0.0; 4], 2).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortCloud {
                floats: 4,
                count: 2
            }
        ));

        // Rejected frames leave no trace.
        assert!(!reader.has_fresh());
        assert_eq!(reader.latest().len(), 2);
        assert!(reader.latest().coords().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_overflowing_count_rejected() {
        let (mut writer, mut reader) = pair(16);
        writer.ingest(&frame(1.0, 2), 2).unwrap();
        assert_eq!(reader.latest().len(), 2);

        // 3 * count wraps usize here; the wrapped product must not be
        // mistaken for a satisfiable size.
        let absurd = usize::MAX / FLOATS_PER_POINT + 1;
        let err = writer.ingest(&[1.0, 2.0, 3.0], absurd).unwrap_err();
        assert!(matches!(
            err,
            Error::ShortCloud { floats: 3, count } if count == absurd
        ));

        assert!(!reader.has_fresh());
        assert_eq!(reader.latest().len(), 2);
    }

    #[test]
    fn test_empty_frame_supersedes() {
        let (mut writer, mut reader) = pair(16);

        writer.ingest(&frame(5.0, 10), 10).unwrap();
        assert_eq!(reader.latest().len(), 10);

        writer.ingest(&[], 0).unwrap();
        let cloud = reader.latest();
        assert_eq!(cloud.len(), 0);
        assert!(cloud.coords().is_empty());
    }

    #[test]
    fn test_steady_state_cycles_three_allocations() {
        let (mut writer, mut reader) = pair(8);

        let mut seen = HashSet::new();
        for round in 0..32 {
            writer.ingest(&frame(round as f32, 8), 8).unwrap();
            let cloud = reader.latest();
            assert_eq!(cloud.len(), 8);
            seen.insert(cloud.coords().as_ptr() as usize);
        }

        // The same three backing arrays rotate forever, nothing reallocates.
        assert!(seen.len() <= 3, "expected at most 3 backing arrays, saw {}", seen.len());
    }

    #[test]
    fn test_growth_replaces_then_settles() {
        let (mut writer, mut reader) = pair(2);
        assert_eq!(writer.capacity(), 2);

        writer.ingest(&frame(1.0, 100), 100).unwrap();
        let cloud = reader.latest();
        assert_eq!(cloud.len(), 100);
        assert!(cloud.capacity() >= 100);

        // Later, smaller frames ride in the grown buffers.
        writer.ingest(&frame(2.0, 1), 1).unwrap();
        let cloud = reader.latest();
        assert_eq!(cloud.len(), 1);
        assert_eq!(cloud.coords(), &[2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_burst_then_empty_scenario() {
        let (mut writer, mut reader) = pair(100);

        writer.ingest(&frame(9.0, 100), 100).unwrap();
        assert_eq!(reader.latest().len(), 100);

        writer.ingest(&[], 0).unwrap();
        assert_eq!(reader.latest().len(), 0);

        // No stale mixture ever surfaces afterwards either.
        assert_eq!(reader.latest().len(), 0);
    }

    #[test]
    fn test_handles_are_send() {
        fn check<T: Send>() {}
        check::<CloudWriter>();
        check::<CloudReader>();
    }

    #[test]
    fn test_handles_move_across_threads() {
        let (mut writer, mut reader) = pair(4);

        let producer = std::thread::spawn(move || {
            writer.ingest(&frame(4.0, 4), 4).unwrap();
            writer
        });
        producer.join().unwrap();

        let consumer = std::thread::spawn(move || {
            assert_eq!(reader.latest().len(), 4);
        });
        consumer.join().unwrap();
    }
}
