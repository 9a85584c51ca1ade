// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Points generated per depth frame.
    #[arg(long, env, default_value = "16000")]
    pub points: usize,

    /// Depth sensor frame rate in Hz.
    #[arg(long, env, default_value = "5")]
    pub sensor_hz: u32,

    /// Render loop rate in Hz.  Typically faster than the sensor, which
    /// makes the superseded and stale counts in the final report visible.
    #[arg(long, env, default_value = "60")]
    pub render_hz: u32,

    /// Depth frames to produce before shutting down.
    #[arg(long, env, default_value = "100")]
    pub frames: u64,

    /// Seed for the synthetic depth source.
    #[arg(long, env, default_value = "0")]
    pub seed: u64,

    /// Camera calibration file (JSON).  Falls back to a typical mobile
    /// camera calibration when not given.
    #[arg(long, env)]
    pub intrinsics: Option<PathBuf>,

    /// Simulated tap in normalized image coordinates, issued once mid-run.
    #[arg(
        long,
        env,
        default_value = "0.5 0.5",
        value_delimiter = ' ',
        num_args = 2,
        value_names = ["U", "V"]
    )]
    pub tap: Vec<f32>,

    /// Application log level
    #[arg(long, env, default_value = "info")]
    pub rust_log: LevelFilter,
}
