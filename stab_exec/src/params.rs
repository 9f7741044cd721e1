//! # Stabiliser Executable Parameters
//!
//! This module provides parameters for the stabiliser executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{path::PathBuf, time::Duration};

use comms_if::eqpt::cam::{ImageSource, PixelEncoding};
use serde::Deserialize;

use crate::{replay::RawFormat, stab_loop::StabLoopParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StabExecParams {

    /// Minimum level of log messages, one of `INFO`, `DEBUG` or `TRACE`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Which image stream the camera provides, `raw` or `compressed_jpeg`
    pub image_source: ImageSource,

    // ---- DATASET ----

    /// Directory holding the replayed dataset. A relative path is taken from the software root.
    pub dataset_dir: String,

    /// IMU recording, relative to the dataset directory
    #[serde(default = "default_imu_file")]
    pub imu_file: String,

    /// Frame list, relative to the dataset directory
    #[serde(default = "default_frames_file")]
    pub frames_file: String,

    /// Per-frame tracker output, relative to the dataset directory
    #[serde(default = "default_poses_file")]
    pub poses_file: String,

    /// Width of raw frames in pixels
    #[serde(default)]
    pub raw_width: u32,

    /// Height of raw frames in pixels
    #[serde(default)]
    pub raw_height: u32,

    /// Pixel layout of raw frames
    #[serde(default = "default_raw_encoding")]
    pub raw_encoding: PixelEncoding,

    /// Playback speed relative to the recording, 0 replays as fast as possible
    #[serde(default = "default_playback_speed")]
    pub playback_speed: f64,

    // ---- LOOP ----

    /// Longest time the loop blocks waiting for a frame before checking for shutdown.
    ///
    /// Units: milliseconds
    #[serde(default = "default_frame_wait_timeout_ms")]
    pub frame_wait_timeout_ms: u64,

    /// Cap on the IMU queue length, the oldest samples are shed beyond it
    #[serde(default)]
    pub imu_queue_max_len: Option<usize>,

    /// Cap on the frame queue length, the oldest frames are shed beyond it
    #[serde(default)]
    pub frame_queue_max_len: Option<usize>,

    /// Number of frames between queue statistics reports, 0 to disable
    #[serde(default = "default_queue_report_period_frames")]
    pub queue_report_period_frames: u64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StabExecParams {
    /// Absolute path to the dataset directory.
    pub fn dataset_path(&self) -> PathBuf {
        let dir = PathBuf::from(&self.dataset_dir);

        match util::host::get_sw_root() {
            Ok(root) if dir.is_relative() => root.join(dir),
            _ => dir,
        }
    }

    pub fn raw_format(&self) -> RawFormat {
        RawFormat {
            width: self.raw_width,
            height: self.raw_height,
            encoding: self.raw_encoding,
        }
    }

    pub fn loop_params(&self) -> StabLoopParams {
        StabLoopParams {
            frame_wait_timeout: Duration::from_millis(self.frame_wait_timeout_ms),
            queue_report_period_frames: self.queue_report_period_frames,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_log_level() -> String {
    String::from("DEBUG")
}

fn default_imu_file() -> String {
    String::from("imu.csv")
}

fn default_frames_file() -> String {
    String::from("frames.csv")
}

fn default_poses_file() -> String {
    String::from("poses.csv")
}

fn default_raw_encoding() -> PixelEncoding {
    PixelEncoding::Mono8
}

fn default_playback_speed() -> f64 {
    1.0
}

fn default_frame_wait_timeout_ms() -> u64 {
    5
}

fn default_queue_report_period_frames() -> u64 {
    100
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_minimal() {
        let p: StabExecParams = util::params::from_str(
            r#"
            image_source = "compressed_jpeg"
            dataset_dir = "/data/run_1"
            "#,
        )
        .unwrap();

        assert_eq!(p.image_source, ImageSource::CompressedJpeg);
        assert_eq!(p.log_level, "DEBUG");
        assert_eq!(p.frames_file, "frames.csv");
        assert_eq!(p.imu_queue_max_len, None);
        assert_eq!(p.loop_params().frame_wait_timeout, Duration::from_millis(5));
        assert_eq!(p.dataset_path(), PathBuf::from("/data/run_1"));
    }

    #[test]
    fn test_raw() {
        let p: StabExecParams = util::params::from_str(
            r#"
            image_source = "raw"
            dataset_dir = "/data/run_2"
            raw_width = 640
            raw_height = 480
            raw_encoding = "bgr8"
            frame_queue_max_len = 8
            "#,
        )
        .unwrap();

        let raw = p.raw_format();
        assert_eq!((raw.width, raw.height), (640, 480));
        assert_eq!(raw.encoding, PixelEncoding::Bgr8);
        assert_eq!(p.frame_queue_max_len, Some(8));
    }

    #[test]
    fn test_invalid_image_source() {
        let r = util::params::from_str::<StabExecParams>(
            r#"
            image_source = "h264"
            dataset_dir = "/data"
            "#,
        );

        assert!(matches!(r, Err(util::params::LoadError::DeserialiseError(_, _))));
    }
}
