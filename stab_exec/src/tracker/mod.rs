//! # Pose tracker interface
//!
//! The visual-inertial tracker is an external collaborator. The stabilisation loop only needs it
//! to turn a frame plus the inertial samples which preceded it into a pose, so it is hidden
//! behind the narrow [`PoseTracker`] trait.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod seq_file;

pub use seq_file::SequentialPoseTracker;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::imu::ImuSample;
use image::DynamicImage;
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Rigid 6-DoF pose estimated by the tracker, in the tracker's map frame and native scale.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation of the camera in the map frame
    pub position: Vector3<f64>,

    /// Orientation of the camera in the map frame
    pub attitude: Rotation3<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while setting up a tracker.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Could not read the pose log: {0}")]
    PoseLogError(csv::Error),

    #[error("The pose log {0:?} contains no poses")]
    EmptyPoseLog(std::path::PathBuf),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A visual-inertial pose tracker.
pub trait PoseTracker: Send {
    /// Track a frame.
    ///
    /// `imu` holds, in time order, the inertial samples measured since the previous frame and no
    /// later than this one. `timestamp_s` is the wall clock time at which tracking was requested.
    ///
    /// Returns `None` on tracking failure. A pose with a zero translation is also treated as a
    /// failure by the caller.
    fn track(&mut self, image: &DynamicImage, imu: &[ImuSample], timestamp_s: f64) -> Option<Pose>;

    /// Release any resources held by the tracker. Called once before the stabilisation loop
    /// exits.
    fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    pub fn new(position: Vector3<f64>, attitude: Rotation3<f64>) -> Self {
        Self { position, attitude }
    }

    /// True if the pose carries a real estimate.
    ///
    /// Trackers report a lost frame with an all-zero translation, so an exactly zero translation
    /// norm marks the pose as invalid. A pose with any non-finite component is degenerate and is
    /// invalid too.
    pub fn is_tracked(&self) -> bool {
        let norm = self.position.norm();

        norm.is_finite() && norm != 0.0 && self.attitude.matrix().iter().all(|v| v.is_finite())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            attitude: Rotation3::identity(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_tracked() {
        assert!(!Pose::default().is_tracked());
        assert!(Pose::new(Vector3::new(0.0, 0.0, 1e-9), Rotation3::identity()).is_tracked());
        assert!(Pose::new(Vector3::new(-1.0, 0.0, 0.0), Rotation3::identity()).is_tracked());
    }

    #[test]
    fn test_degenerate_poses_are_not_tracked() {
        let nan = Pose::new(Vector3::new(std::f64::NAN, 0.0, 1.0), Rotation3::identity());
        assert!(!nan.is_tracked());

        let inf = Pose::new(Vector3::new(0.0, std::f64::INFINITY, 0.0), Rotation3::identity());
        assert!(!inf.is_tracked());

        let bad_att = Pose::new(
            Vector3::new(1.0, 0.0, 0.0),
            Rotation3::from_matrix_unchecked(nalgebra::Matrix3::from_element(std::f64::NAN)),
        );
        assert!(!bad_att.is_tracked());
    }
}
