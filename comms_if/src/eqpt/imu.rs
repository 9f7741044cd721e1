//! # Inertial Measurement Unit Communications Module

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single reading from the IMU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuSample {
    /// Sensor timestamp of the reading.
    ///
    /// Units: seconds
    pub timestamp_s: f64,

    /// Linear acceleration in the IMU frame.
    ///
    /// Units: meters/second^2
    pub lin_acc_ms2: Vector3<f64>,

    /// Angular velocity in the IMU frame.
    ///
    /// Units: radians/second
    pub ang_vel_rads: Vector3<f64>,
}

/// Flat form of an [`ImuSample`], as stored in a CSV recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImuRecord {
    pub timestamp_s: f64,
    pub acc_x: f64,
    pub acc_y: f64,
    pub acc_z: f64,
    pub gyr_x: f64,
    pub gyr_y: f64,
    pub gyr_z: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ImuSample {
    /// Build a sample from its components.
    pub fn new(timestamp_s: f64, lin_acc_ms2: Vector3<f64>, ang_vel_rads: Vector3<f64>) -> Self {
        Self {
            timestamp_s,
            lin_acc_ms2,
            ang_vel_rads,
        }
    }
}

impl From<ImuRecord> for ImuSample {
    fn from(r: ImuRecord) -> Self {
        Self {
            timestamp_s: r.timestamp_s,
            lin_acc_ms2: Vector3::new(r.acc_x, r.acc_y, r.acc_z),
            ang_vel_rads: Vector3::new(r.gyr_x, r.gyr_y, r.gyr_z),
        }
    }
}
