//! Tracker which replays a recorded per-frame pose log.
//!
//! Useful for tuning the controller offline: the log is the output of a tracker run over the same
//! recording, one row per frame in frame order, with lost frames written as all-zero rows.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;
use std::path::Path;

use comms_if::eqpt::imu::ImuSample;
use image::DynamicImage;
use log::{debug, info};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;

use super::{Pose, PoseTracker, TrackerError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Replays poses from a log, one per tracked frame.
pub struct SequentialPoseTracker {
    poses: VecDeque<Pose>,

    num_tracked: usize,
}

/// One row of the pose log.
#[derive(Debug, Deserialize)]
struct PoseRecord {
    #[allow(dead_code)]
    timestamp_s: f64,
    x: f64,
    y: f64,
    z: f64,
    qx: f64,
    qy: f64,
    qz: f64,
    qw: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SequentialPoseTracker {
    /// Load a pose log with a `timestamp_s,x,y,z,qx,qy,qz,qw` header.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, TrackerError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path.as_ref())
            .map_err(TrackerError::PoseLogError)?;

        let mut poses = VecDeque::new();
        for rec in reader.deserialize::<PoseRecord>() {
            poses.push_back(Pose::from(rec.map_err(TrackerError::PoseLogError)?));
        }

        if poses.is_empty() {
            return Err(TrackerError::EmptyPoseLog(path.as_ref().to_path_buf()));
        }

        info!("Loaded {} poses from {:?}", poses.len(), path.as_ref());

        Ok(Self::from_poses(poses))
    }

    /// Build the tracker from an in-memory sequence of poses.
    pub fn from_poses<I: IntoIterator<Item = Pose>>(poses: I) -> Self {
        Self {
            poses: poses.into_iter().collect(),
            num_tracked: 0,
        }
    }
}

impl PoseTracker for SequentialPoseTracker {
    fn track(&mut self, _image: &DynamicImage, imu: &[ImuSample], timestamp_s: f64) -> Option<Pose> {
        let pose = self.poses.pop_front();

        if pose.is_some() {
            self.num_tracked += 1;
        }

        debug!(
            "Replayed pose {} at {:.3} s with {} IMU samples",
            self.num_tracked,
            timestamp_s,
            imu.len()
        );

        pose
    }

    fn shutdown(&mut self) {
        info!(
            "Pose replay finished, {} poses used, {} unused",
            self.num_tracked,
            self.poses.len()
        );
    }
}

impl From<PoseRecord> for Pose {
    fn from(r: PoseRecord) -> Self {
        let q = Quaternion::new(r.qw, r.qx, r.qy, r.qz);

        // Lost frames are logged with a zero quaternion, which can't be normalised
        let attitude = match q.norm() > 0.0 {
            true => UnitQuaternion::from_quaternion(q).to_rotation_matrix(),
            false => UnitQuaternion::identity().to_rotation_matrix(),
        };

        Pose::new(Vector3::new(r.x, r.y, r.z), attitude)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use image::{DynamicImage, GrayImage};

    #[test]
    fn test_from_csv() {
        let dir = std::env::temp_dir().join(format!("stab_seq_tracker_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("poses.csv");
        std::fs::write(
            &path,
            "timestamp_s,x,y,z,qx,qy,qz,qw\n\
             0.0, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 1.0\n\
             0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0\n\
             0.2, 1.0, 2.0, 3.5, 0.0, 0.0, 0.7071068, 0.7071068\n",
        )
        .unwrap();

        let mut tracker = SequentialPoseTracker::from_csv(&path).unwrap();
        assert_eq!(tracker.poses.len(), 3);

        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));

        let p0 = tracker.track(&img, &[], 0.0).unwrap();
        assert_eq!(p0.position, Vector3::new(1.0, 2.0, 3.0));
        assert!(p0.is_tracked());

        let p1 = tracker.track(&img, &[], 0.0).unwrap();
        assert!(!p1.is_tracked());

        let p2 = tracker.track(&img, &[], 0.0).unwrap();
        let m = p2.attitude.matrix();
        // 90 degrees about z
        assert!((m[(1, 0)] - 1.0).abs() < 1e-6);
        assert!(m[(0, 0)].abs() < 1e-6);

        assert!(tracker.track(&img, &[], 0.0).is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_log() {
        let dir = std::env::temp_dir().join(format!("stab_seq_tracker_empty_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("poses.csv");
        std::fs::write(&path, "timestamp_s,x,y,z,qx,qy,qz,qw\n").unwrap();

        assert!(matches!(
            SequentialPoseTracker::from_csv(&path),
            Err(TrackerError::EmptyPoseLog(_))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
