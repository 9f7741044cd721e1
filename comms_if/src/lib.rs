//! # Communications interface crate.
//!
//! Provides the data types exchanged between the stabilisation core and the transport layer:
//! sensor samples and frames coming in, velocity commands going out, and the telecommands which
//! tune and arm the controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommand definitions
pub mod tc;

/// Sensor and actuator data definitions for equipment (IMU, camera, flight controller)
pub mod eqpt;
