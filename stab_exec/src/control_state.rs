//! # Control state
//!
//! Operator-facing state of the stabiliser: the controller gains and the capture and hold mode
//! flags. Each field is updated atomically and independently by telecommand handlers on any
//! thread, and re-read by the stabilisation loop at the moment it is used. No cross-field
//! consistency is provided: a cycle may see a new gain with an old hold flag.
//!
//! The reference pose itself lives in [`Checkpoint`], owned by the stabilisation loop, since only
//! the loop ever reads or writes it.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::info;
use serde::Serialize;

use crate::tracker::Pose;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default gain applied to the translation offset
pub const DEFAULT_MOVEMENT_GAIN: f64 = 5.0;

/// Default gain applied to the rotation offset
pub const DEFAULT_ROTATION_GAIN: f64 = 0.25;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Shared, externally mutated controller state.
#[derive(Debug)]
pub struct ControlState {
    /// Bits of the `f64` movement gain
    movement_gain: AtomicU64,

    /// Bits of the `f64` rotation gain
    rotation_gain: AtomicU64,

    capture_requested: AtomicBool,

    hold_engaged: AtomicBool,
}

/// The reference pose the loop holds the vehicle at.
#[derive(Debug, Default)]
pub struct Checkpoint {
    reference: Option<Pose>,

    num_captures: u64,
}

/// Record of a captured checkpoint, saved into the session.
#[derive(Debug, Serialize)]
struct CheckpointRecord {
    index: u64,
    pose: Pose,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ControlState {
    /// Create a new state with the given gains, no pending capture and hold released.
    pub fn new(movement_gain: f64, rotation_gain: f64) -> Self {
        Self {
            movement_gain: AtomicU64::new(movement_gain.to_bits()),
            rotation_gain: AtomicU64::new(rotation_gain.to_bits()),
            capture_requested: AtomicBool::new(false),
            hold_engaged: AtomicBool::new(false),
        }
    }

    /// Replace the movement gain. Takes effect on the next control cycle.
    pub fn set_movement_gain(&self, gain: f64) {
        self.movement_gain.store(gain.to_bits(), Ordering::SeqCst);
    }

    /// Replace the rotation gain. Takes effect on the next control cycle.
    pub fn set_rotation_gain(&self, gain: f64) {
        self.rotation_gain.store(gain.to_bits(), Ordering::SeqCst);
    }

    /// Ask for the next tracked pose to become the checkpoint.
    ///
    /// Requests made before a pending one has been serviced are coalesced into it.
    pub fn request_capture(&self) {
        self.capture_requested.store(true, Ordering::SeqCst);
    }

    /// Engage or release the position hold.
    pub fn set_hold(&self, engaged: bool) {
        self.hold_engaged.store(engaged, Ordering::SeqCst);
    }

    pub fn movement_gain(&self) -> f64 {
        f64::from_bits(self.movement_gain.load(Ordering::SeqCst))
    }

    pub fn rotation_gain(&self) -> f64 {
        f64::from_bits(self.rotation_gain.load(Ordering::SeqCst))
    }

    pub fn capture_requested(&self) -> bool {
        self.capture_requested.load(Ordering::SeqCst)
    }

    pub fn hold_engaged(&self) -> bool {
        self.hold_engaged.load(Ordering::SeqCst)
    }

    /// Atomically consume a pending capture request, returning true if there was one.
    fn take_capture_request(&self) -> bool {
        self.capture_requested
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new(DEFAULT_MOVEMENT_GAIN, DEFAULT_ROTATION_GAIN)
    }
}

impl Checkpoint {
    /// Capture `pose` as the new reference if a capture has been requested.
    ///
    /// Clears the request and returns the captured pose, or `None` if no request was pending.
    pub fn try_capture(&mut self, state: &ControlState, pose: &Pose) -> Option<Pose> {
        if !state.take_capture_request() {
            return None;
        }

        self.reference = Some(*pose);
        self.num_captures += 1;

        info!(
            "Saved checkpoint pose {}: x: {:.4}, y: {:.4}, z: {:.4}",
            self.num_captures, pose.position.x, pose.position.y, pose.position.z
        );

        util::session::save_with_timestamp(
            "checkpoints/checkpoint.json",
            CheckpointRecord {
                index: self.num_captures,
                pose: *pose,
            },
        );

        Some(*pose)
    }

    /// The current reference pose, if one has been captured.
    pub fn reference(&self) -> Option<&Pose> {
        self.reference.as_ref()
    }

    /// Number of checkpoints captured so far.
    pub fn num_captures(&self) -> u64 {
        self.num_captures
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::{Rotation3, Vector3};

    fn pose(x: f64) -> Pose {
        Pose::new(Vector3::new(x, 0.0, 0.0), Rotation3::identity())
    }

    #[test]
    fn test_defaults() {
        let s = ControlState::default();
        assert_eq!(s.movement_gain(), 5.0);
        assert_eq!(s.rotation_gain(), 0.25);
        assert!(!s.capture_requested());
        assert!(!s.hold_engaged());
    }

    #[test]
    fn test_mutators_replace_values() {
        let s = ControlState::default();

        s.set_movement_gain(1.5);
        s.set_rotation_gain(-0.1);
        s.set_hold(true);
        s.set_hold(true);
        assert_eq!(s.movement_gain(), 1.5);
        assert_eq!(s.rotation_gain(), -0.1);
        assert!(s.hold_engaged());

        s.set_hold(false);
        assert!(!s.hold_engaged());
    }

    #[test]
    fn test_no_capture_without_request() {
        let s = ControlState::default();
        let mut cp = Checkpoint::default();

        assert!(cp.try_capture(&s, &pose(1.0)).is_none());
        assert!(cp.reference().is_none());
    }

    #[test]
    fn test_capture_is_edge_triggered() {
        let s = ControlState::default();
        let mut cp = Checkpoint::default();

        s.request_capture();
        s.request_capture();

        assert_eq!(cp.try_capture(&s, &pose(1.0)), Some(pose(1.0)));
        assert!(!s.capture_requested());

        // The second request was coalesced into the first
        assert!(cp.try_capture(&s, &pose(2.0)).is_none());
        assert_eq!(cp.reference(), Some(&pose(1.0)));
        assert_eq!(cp.num_captures(), 1);

        // A fresh request replaces the reference
        s.request_capture();
        cp.try_capture(&s, &pose(3.0));
        assert_eq!(cp.reference(), Some(&pose(3.0)));
        assert_eq!(cp.num_captures(), 2);
    }

    #[test]
    fn test_checkpoint_record() {
        let record = CheckpointRecord {
            index: 2,
            pose: Pose::new(Vector3::new(0.5, -1.0, 2.0), Rotation3::from_euler_angles(0.0, 0.0, 0.3)),
        };

        let json: serde_json::Value = serde_json::to_value(&record).unwrap();

        assert_eq!(json["index"], 2);
        assert_eq!(json["pose"]["position"], serde_json::json!([0.5, -1.0, 2.0]));

        let pose: Pose = serde_json::from_value(json["pose"].clone()).unwrap();
        assert_eq!(pose.position, record.pose.position);
        assert!((pose.attitude.matrix() - record.pose.attitude.matrix()).norm() < 1e-12);
    }
}
