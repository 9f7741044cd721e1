//! # Velocity Command Communications Module
//!
//! Velocity setpoints sent to the vehicle's flight controller.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A timestamped body frame velocity setpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityCmd {
    /// UTC time at which the command was generated
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Name of the frame the command is expressed in
    pub frame_id: String,

    /// Linear velocity demand.
    ///
    /// Units: tracker units/second
    pub linear: Vector3<f64>,

    /// Angular rate demand about the body axes.
    ///
    /// Units: radians/second
    pub angular: Vector3<f64>,
}

/// Flat form of a [`VelocityCmd`] suitable for CSV archives.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VelocityCmdRecord {
    pub timestamp_ms: i64,
    pub lin_x: f64,
    pub lin_y: f64,
    pub lin_z: f64,
    pub ang_x: f64,
    pub ang_y: f64,
    pub ang_z: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl From<&VelocityCmd> for VelocityCmdRecord {
    fn from(cmd: &VelocityCmd) -> Self {
        Self {
            timestamp_ms: cmd.timestamp.timestamp_millis(),
            lin_x: cmd.linear.x,
            lin_y: cmd.linear.y,
            lin_z: cmd.linear.z,
            ang_x: cmd.angular.x,
            ang_y: cmd.angular.y,
            ang_z: cmd.angular.z,
        }
    }
}
