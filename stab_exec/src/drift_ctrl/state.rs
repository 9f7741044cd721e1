//! Implementations for the DriftCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use chrono::Utc;
use comms_if::eqpt::vel::VelocityCmd;
use log::{debug, trace};
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

// Internal
use super::{pitch_yaw_roll, DriftCtrlError, Params, DEAD_ZONE};
use crate::tracker::Pose;
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drift control module state
#[derive(Default)]
pub struct DriftCtrl {
    pub(crate) params: Params,

    pub(crate) report: StatusReport,
    arch_report: Archiver,
}

/// Input data to Drift Control.
#[derive(Debug, Clone, Copy)]
pub struct InputData {
    /// The pose just produced by the tracker
    pub pose: Pose,

    /// The checkpoint pose to hold
    pub reference: Pose,

    /// Gain from translation offset to linear velocity
    pub movement_gain: f64,

    /// Gain from rotation offset to angular rate
    pub rotation_gain: f64,
}

/// Output of Drift Control.
#[derive(Debug, Clone, Default)]
pub struct OutputData {
    /// The velocity command to send, or `None` if the offset is inside the dead zone.
    pub vel_cmd: Option<VelocityCmd>,
}

/// Status report for DriftCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// Translation offset from the checkpoint, in tracker axes
    pub offset_x: f64,
    pub offset_y: f64,
    pub offset_z: f64,

    /// Norm of the translation offset
    pub offset_norm: f64,

    /// Rotation offset from the checkpoint
    pub pitch_rad: f64,
    pub yaw_rad: f64,
    pub roll_rad: f64,

    /// True if the offset was too small to correct
    pub in_dead_zone: bool,

    /// True if the linear demand was scaled down to its limit
    pub linear_limited: bool,

    /// True if the angular demand was scaled down to its limit
    pub angular_limited: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for DriftCtrl {
    type InitData = Params;
    type InitError = DriftCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriftCtrlError;

    /// Initialise the DriftCtrl module, setting up the status report archive in the session.
    fn init(&mut self, init_data: Self::InitData, session: &Session) 
        -> Result<(), Self::InitError> 
    {
        self.params = init_data;

        self.arch_report = Archiver::from_path(session, "drift_ctrl/status_report.csv")
            .map_err(DriftCtrlError::ArchiveInitError)?;

        Ok(())
    }

    /// Compute the correction for one tracked frame.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> 
    {
        self.report = StatusReport::default();

        check_gain("movement", input_data.movement_gain)?;
        check_gain("rotation", input_data.rotation_gain)?;

        let pose = &input_data.pose;
        let reference = &input_data.reference;

        // Offsets from the checkpoint to the current pose
        let offset = pose.position - reference.position;
        let rot_offset: Matrix3<f64> = pose.attitude.matrix() * reference.attitude.matrix().transpose();

        let (pitch, yaw, roll) = pitch_yaw_roll(&rot_offset);

        self.report.offset_x = offset.x;
        self.report.offset_y = offset.y;
        self.report.offset_z = offset.z;
        self.report.offset_norm = offset.norm();
        self.report.pitch_rad = pitch;
        self.report.yaw_rad = yaw;
        self.report.roll_rad = roll;

        if !self.report.offset_norm.is_finite() || !(pitch.is_finite() && yaw.is_finite() && roll.is_finite()) {
            return Err(DriftCtrlError::NonFiniteOffset);
        }

        debug!(
            "Drift: dx: {:.4}, dy: {:.4}, dz: {:.4}, norm: {:.4}, pitch: {:.4}, yaw: {:.4}, roll: {:.4}",
            offset.x, offset.y, offset.z, self.report.offset_norm, pitch, yaw, roll
        );

        if self.report.offset_norm < DEAD_ZONE {
            self.report.in_dead_zone = true;
            return Ok((OutputData::default(), self.report));
        }

        // Map from the tracker's camera axes onto the vehicle body axes
        let mut linear = Vector3::new(
            offset.y * input_data.movement_gain,
            offset.x * input_data.movement_gain,
            -offset.z * input_data.movement_gain,
        );
        let mut angular = Vector3::new(
            -roll * input_data.rotation_gain,
            -pitch * input_data.rotation_gain,
            -yaw * input_data.rotation_gain,
        );

        self.report.linear_limited = limit_norm(&mut linear, self.params.max_linear);
        self.report.angular_limited = limit_norm(&mut angular, self.params.max_angular_rads);

        let vel_cmd = VelocityCmd {
            timestamp: Utc::now(),
            frame_id: self.params.frame_id.clone(),
            linear,
            angular,
        };

        trace!("DriftCtrl output:\n    lin: {:?}\n    ang: {:?}", vel_cmd.linear, vel_cmd.angular);

        Ok((OutputData { vel_cmd: Some(vel_cmd) }, self.report))
    }
}

impl Archived for DriftCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_report.serialise(self.report)
    }
}

impl DriftCtrl {
    /// Create a new controller with the given parameters and no archive.
    pub fn new(params: Params) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// True if the status report is being archived.
    pub fn is_archiving(&self) -> bool {
        self.arch_report.is_init()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_gain(name: &'static str, gain: f64) -> Result<(), DriftCtrlError> {
    match gain.is_finite() {
        true => Ok(()),
        false => Err(DriftCtrlError::NonFiniteGain(name, gain)),
    }
}

/// Scale `v` down so its norm doesn't exceed `max`, returning true if it was scaled.
fn limit_norm(v: &mut Vector3<f64>, max: Option<f64>) -> bool {
    match max {
        Some(max) if v.norm() > max => {
            *v *= max / v.norm();
            true
        }
        _ => false,
    }
}
