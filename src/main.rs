// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Demonstration of the depth cloud exchange under realistic thread timing.
//!
//! A sensor thread generates synthetic depth frames at sensor rate and
//! deposits them through a [`CloudWriter`]; the main thread plays the
//! renderer, polling [`CloudReader::latest`] at an independent (usually
//! faster) rate. Mid-run one plane fit request is assembled from the
//! retained cloud, and a drop/staleness report is printed at the end.

mod args;

use args::Args;
use clap::Parser;
use depthswap::{
    depth::{CameraIntrinsics, DepthFrame, DevicePose, timestamp},
    exchange::{self, CloudReader, CloudWriter},
    fit::{FitBuffer, FixedExtrinsics},
    source::{DepthSource, SyntheticSource},
};
use std::{
    fs::File,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, sleep},
    time::{Duration, Instant},
};
use tracing::{debug, error, info, trace};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.rust_log)
        .init();

    let intrinsics: CameraIntrinsics = match &args.intrinsics {
        Some(path) => serde_json::from_reader(File::open(path)?)?,
        None => CameraIntrinsics::default(),
    };
    debug!(
        "camera calibration {}x{} fx={:.1} fy={:.1}",
        intrinsics.width, intrinsics.height, intrinsics.fx, intrinsics.fy
    );

    let (writer, reader) = exchange::pair(args.points);
    let fit = Arc::new(FitBuffer::new(intrinsics));
    let running = Arc::new(AtomicBool::new(true));

    let producer = thread::Builder::new().name("sensor".to_string()).spawn({
        let fit = fit.clone();
        let running = running.clone();
        let args = args.clone();
        move || sensor_thread(writer, fit, running, &args)
    })?;

    let observed = render_loop(reader, &fit, &running, &args);

    let produced = producer.join().expect("sensor thread panicked");
    info!(
        "produced {} frames, rendered {} ({} superseded before pickup)",
        produced,
        observed,
        produced.saturating_sub(observed)
    );

    Ok(())
}

/// Sensor-side loop: generate frames at sensor rate and deposit each into
/// the exchange and the fit slot. Returns the number of frames produced.
fn sensor_thread(
    mut writer: CloudWriter,
    fit: Arc<FitBuffer>,
    running: Arc<AtomicBool>,
    args: &Args,
) -> u64 {
    let mut source = SyntheticSource::new(args.points, args.seed);
    let mut frame = DepthFrame::with_capacity(args.points);

    let interval = Duration::from_secs(1) / args.sensor_hz.max(1);
    let mut target_time = Instant::now() + interval;
    let mut produced = 0;

    while produced < args.frames {
        match source.next_frame(&mut frame) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("depth source failed: {}", e);
                break;
            }
        }

        if let Err(e) = writer.ingest(&frame.xyz, frame.count) {
            error!("rejected frame: {}", e);
            continue;
        }
        if let Err(e) = fit.update(&frame) {
            error!("fit slot rejected frame: {}", e);
        }
        produced += 1;
        trace!("deposited frame {} with {} points", produced, frame.count);

        sleep(target_time.saturating_duration_since(Instant::now()));
        target_time += interval;
    }

    running.store(false, Ordering::Relaxed);
    produced
}

/// Render-side loop: poll the freshest cloud at render rate until the
/// sensor stops, assembling one fit request halfway through. Returns the
/// number of new clouds observed.
fn render_loop(
    mut reader: CloudReader,
    fit: &FitBuffer,
    running: &AtomicBool,
    args: &Args,
) -> u64 {
    let geometry = FixedExtrinsics::default();
    let tap_at = tap_time(args.frames, args.sensor_hz);
    let start = Instant::now();

    let interval = Duration::from_secs(1) / args.render_hz.max(1);
    let mut target_time = Instant::now() + interval;
    let mut observed = 0;
    let mut stale_polls = 0u64;
    let mut tapped = false;

    loop {
        let fresh = reader.has_fresh();
        let cloud = reader.latest();
        if fresh {
            observed += 1;
            trace!("rendering cloud of {} points", cloud.len());
        } else {
            stale_polls += 1;
        }

        // One simulated tap halfway through the expected sensor run. Tied
        // to elapsed time rather than observed frames so it fires at any
        // render/sensor rate ratio.
        if !tapped && start.elapsed() >= tap_at {
            tapped = true;
            let tap_pose = DevicePose::new(
                nalgebra::Isometry3::identity(),
                timestamp().unwrap_or_default(),
            );
            match fit.prepare_fit_request(args.tap[0], args.tap[1], &tap_pose, &geometry) {
                Ok(query) => {
                    let t = query.color_from_depth.translation.vector;
                    info!(
                        "fit request assembled: {} points around uv=({:.2}, {:.2}), \
                         camera offset ({:.3}, {:.3}, {:.3}) m, cloud age stamp {} ns",
                        query.count, query.u, query.v, t.x, t.y, t.z, query.cloud_timestamp
                    );
                }
                Err(e) => error!("fit request failed: {}", e),
            }
        }

        if !running.load(Ordering::Relaxed) && !reader.has_fresh() {
            break;
        }
        sleep(target_time.saturating_duration_since(Instant::now()));
        target_time += interval;
    }

    debug!("render loop exiting after {} stale polls", stale_polls);
    observed
}

/// Half the expected production run: `frames` frames at `sensor_hz`, the
/// point where the demo issues its simulated tap.
fn tap_time(frames: u64, sensor_hz: u32) -> Duration {
    Duration::from_secs(frames) / sensor_hz.max(1) / 2
}
