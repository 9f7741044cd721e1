//! # Stabiliser library.
//!
//! Position hold for a camera-carrying vehicle. Camera frames and IMU samples are queued by their
//! producers, paired up, fed through a visual-inertial pose tracker, and the offset from an
//! operator-captured checkpoint pose is turned into a velocity command which drives the vehicle
//! back to the checkpoint.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Command sinks - destinations for the velocity commands
pub mod cmd_sink;

/// Control state - operator gains and mode flags, and the checkpoint pose
pub mod control_state;

/// Drift control module - converts the checkpoint offset into a velocity command
pub mod drift_ctrl;

/// IMU synchronisation - pairs each frame with the IMU samples measured before it
pub mod imu_sync;

/// Executable parameters
pub mod params;

/// Dataset replay - produces frames and IMU samples from a recording
pub mod replay;

/// Sensor queues - unbounded FIFOs between the sensor producers and the loop
pub mod sensor_queue;

/// Stabilisation loop - the frame consumer tying everything together
pub mod stab_loop;

/// Pose tracking interface and implementations
pub mod tracker;
