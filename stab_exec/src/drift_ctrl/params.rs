//! Parameters structure for DriftCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::control_state::{DEFAULT_MOVEMENT_GAIN, DEFAULT_ROTATION_GAIN};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for drift control.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- GAINS ----

    /// Initial gain from translation offset to linear velocity demand. Can be replaced at
    /// runtime by telecommand.
    ///
    /// Units: 1/seconds
    pub movement_gain: f64,

    /// Initial gain from rotation offset to angular rate demand. Can be replaced at runtime by
    /// telecommand.
    ///
    /// Units: 1/seconds
    pub rotation_gain: f64,

    // ---- OUTPUT ----

    /// Frame the velocity commands are expressed in.
    pub frame_id: String,

    // ---- CAPABILITIES ----

    /// Maximum magnitude of the linear velocity demand, `None` for no limit.
    ///
    /// Units: tracker units/second
    pub max_linear: Option<f64>,

    /// Maximum magnitude of the angular rate demand, `None` for no limit.
    ///
    /// Units: radians/second
    pub max_angular_rads: Option<f64>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            movement_gain: DEFAULT_MOVEMENT_GAIN,
            rotation_gain: DEFAULT_ROTATION_GAIN,
            frame_id: String::from("base_link"),
            max_linear: None,
            max_angular_rads: None,
        }
    }
}
