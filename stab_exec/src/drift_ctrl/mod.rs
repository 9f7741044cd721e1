//! Drift control module
//!
//! Converts the offset between the current pose and the checkpoint pose into a body frame
//! velocity command which drives the vehicle back to the checkpoint.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Matrix3;

// Internal
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Translation offsets with a norm below this value are not corrected.
///
/// Units: tracker units
pub const DEAD_ZONE: f64 = 0.002;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriftCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum DriftCtrlError {
    #[error("The {0} gain is not finite ({1})")]
    NonFiniteGain(&'static str, f64),

    #[error("The pose offset is not finite, the tracker output may be corrupt")]
    NonFiniteOffset,

    #[error("Could not initialise the DriftCtrl archive: {0}")]
    ArchiveInitError(util::archive::ArchiveError),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Decompose a rotation matrix into `(pitch, yaw, roll)` in radians.
///
/// The convention is fixed, it decides which physical axes drive which command channel:
///
/// - `pitch = asin(-R[2][0])`
/// - `yaw = atan2(R[1][0], R[0][0])`
/// - `roll = atan2(R[2][1], R[2][2])`
pub fn pitch_yaw_roll(r: &Matrix3<f64>) -> (f64, f64, f64) {
    // Rounding can push a valid element just outside [-1, 1]
    let pitch = (-r[(2, 0)]).max(-1.0).min(1.0).asin();
    let yaw = r[(1, 0)].atan2(r[(0, 0)]);
    let roll = r[(2, 1)].atan2(r[(2, 2)]);

    (pitch, yaw, roll)
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Rotation3;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_identity_has_zero_angles() {
        let (p, y, r) = pitch_yaw_roll(&Matrix3::identity());
        assert_eq!((p, y, r), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_single_axis_rotations() {
        // Rotation about z is yaw
        let m = *Rotation3::from_euler_angles(0.0, 0.0, 0.3).matrix();
        let (p, y, r) = pitch_yaw_roll(&m);
        assert!(p.abs() < EPS && (y - 0.3).abs() < EPS && r.abs() < EPS);

        // Rotation about y is pitch
        let m = *Rotation3::from_euler_angles(0.0, -0.2, 0.0).matrix();
        let (p, y, r) = pitch_yaw_roll(&m);
        assert!((p + 0.2).abs() < EPS && y.abs() < EPS && r.abs() < EPS);

        // Rotation about x is roll
        let m = *Rotation3::from_euler_angles(0.1, 0.0, 0.0).matrix();
        let (p, y, r) = pitch_yaw_roll(&m);
        assert!(p.abs() < EPS && y.abs() < EPS && (r - 0.1).abs() < EPS);
    }

    #[test]
    fn test_pitch_saturates_instead_of_nan() {
        let mut m = Matrix3::identity();
        m[(2, 0)] = -1.0 - 1e-9;
        let (p, _, _) = pitch_yaw_roll(&m);
        assert!((p - FRAC_PI_2).abs() < EPS);
    }
}
