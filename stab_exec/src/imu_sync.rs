//! # IMU synchronisation
//!
//! Pairs each camera frame with the inertial samples that were measured up to and including the
//! frame's sensor timestamp.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::imu::ImuSample;
use log::trace;

use crate::sensor_queue::SensorQueue;

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Remove and return, in arrival order, every sample at the head of the queue with a timestamp
/// less than or equal to `cutoff_s`.
///
/// Extraction stops at the first sample newer than the cutoff, which stays queued for the next
/// frame. Samples are therefore consumed at most once and never out of order. An empty result is
/// valid and means the tracker runs on vision alone for this frame.
pub fn extract_up_to(queue: &SensorQueue<ImuSample>, cutoff_s: f64) -> Vec<ImuSample> {
    let samples = queue.drain_while(|s| s.timestamp_s <= cutoff_s);

    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        trace!(
            "Got {} IMU samples for frame at {:.6} s ({:.6} s to {:.6} s)",
            samples.len(),
            cutoff_s,
            first.timestamp_s,
            last.timestamp_s
        );
    }

    samples
}
