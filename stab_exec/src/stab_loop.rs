//! # Stabilisation loop
//!
//! The single consumer of the frame queue. For each frame the loop gathers the IMU samples
//! measured up to the frame, runs the tracker, services capture requests and, while hold is
//! engaged and a checkpoint exists, runs drift control and forwards the resulting command to the
//! command sink.
//!
//! The loop blocks on the frame queue with a short timeout so that a shutdown request is noticed
//! promptly. An in-flight frame is always completed before the loop exits.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use comms_if::eqpt::{cam::CamImage, imu::ImuSample, vel::VelocityCmd};
use log::{debug, info, trace, warn};
use serde::Serialize;
use util::{archive::Archived, module::State};

use crate::{
    cmd_sink::CmdSink,
    control_state::{Checkpoint, ControlState},
    drift_ctrl::{self, DriftCtrl},
    imu_sync,
    sensor_queue::SensorQueue,
    tracker::PoseTracker,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Timing parameters of the loop.
#[derive(Debug, Clone, Copy)]
pub struct StabLoopParams {
    /// Maximum time to block waiting for a frame before re-checking the shutdown flag
    pub frame_wait_timeout: Duration,

    /// Log the queue statistics every this many frames, 0 disables the report
    pub queue_report_period_frames: u64,
}

/// Counters accumulated over the life of the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    pub num_frames: u64,
    pub num_tracking_failures: u64,
    pub num_captures: u64,
    pub num_cmds: u64,
    pub num_sink_errors: u64,
    pub num_ctrl_errors: u64,
}

/// The stabilisation loop, generic over its tracker and command sink.
pub struct StabLoop<T, S> {
    control: Arc<ControlState>,
    imu_queue: Arc<SensorQueue<ImuSample>>,
    frame_queue: Arc<SensorQueue<CamImage>>,

    tracker: T,
    sink: S,

    drift_ctrl: DriftCtrl,
    checkpoint: Checkpoint,

    params: StabLoopParams,
    stats: LoopStats,

    shutdown: Arc<AtomicBool>,
}

/// Handle to a loop running on its own thread.
pub struct StabHandle {
    shutdown: Arc<AtomicBool>,
    join_handle: JoinHandle<LoopStats>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// What the loop did with a single frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The tracker produced no usable pose, the frame is skipped
    TrackingLost,

    /// Tracking succeeded but no checkpoint has been captured yet
    NoCheckpoint,

    /// A checkpoint exists but hold is released
    HoldDisengaged,

    /// The vehicle is close enough to the checkpoint that no command is needed
    InDeadZone,

    /// Drift control could not produce a command for this frame
    CtrlError,

    /// A command was produced and handed to the sink
    Commanded(VelocityCmd),
}

#[derive(Debug, thiserror::Error)]
pub enum StabLoopError {
    #[error("Could not spawn the stabilisation thread: {0}")]
    SpawnError(std::io::Error),

    #[error("The stabilisation thread panicked")]
    LoopPanicked,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for StabLoopParams {
    fn default() -> Self {
        Self {
            frame_wait_timeout: Duration::from_millis(5),
            queue_report_period_frames: 100,
        }
    }
}

impl<T, S> StabLoop<T, S>
where
    T: PoseTracker + 'static,
    S: CmdSink + 'static,
{
    pub fn new(
        control: Arc<ControlState>,
        imu_queue: Arc<SensorQueue<ImuSample>>,
        frame_queue: Arc<SensorQueue<CamImage>>,
        tracker: T,
        sink: S,
        drift_ctrl: DriftCtrl,
        params: StabLoopParams,
    ) -> Self {
        Self {
            control,
            imu_queue,
            frame_queue,
            tracker,
            sink,
            drift_ctrl,
            checkpoint: Checkpoint::default(),
            params,
            stats: LoopStats::default(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag which, once raised, stops the loop after the current frame.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Process a single frame.
    pub fn step(&mut self, frame: CamImage) -> StepOutcome {
        self.stats.num_frames += 1;

        let imu = imu_sync::extract_up_to(&self.imu_queue, frame.timestamp_s);

        let pose = match self
            .tracker
            .track(&frame.image, &imu, util::time::wall_clock_s())
        {
            Some(p) if p.is_tracked() => p,
            _ => {
                self.stats.num_tracking_failures += 1;
                debug!("Tracking lost on frame at {:.3} s", frame.timestamp_s);
                return StepOutcome::TrackingLost;
            }
        };

        trace!(
            "Pose at {:.3} s: x: {:.4}, y: {:.4}, z: {:.4}",
            frame.timestamp_s,
            pose.position.x,
            pose.position.y,
            pose.position.z
        );

        if self.checkpoint.try_capture(&self.control, &pose).is_some() {
            self.stats.num_captures += 1;
        }

        let reference = match self.checkpoint.reference() {
            Some(r) => *r,
            None => return StepOutcome::NoCheckpoint,
        };

        if !self.control.hold_engaged() {
            return StepOutcome::HoldDisengaged;
        }

        let input = drift_ctrl::InputData {
            pose,
            reference,
            movement_gain: self.control.movement_gain(),
            rotation_gain: self.control.rotation_gain(),
        };

        let output = match self.drift_ctrl.proc(&input) {
            Ok((o, _)) => o,
            Err(e) => {
                self.stats.num_ctrl_errors += 1;
                warn!("Error during DriftCtrl processing: {}", e);
                return StepOutcome::CtrlError;
            }
        };

        if self.drift_ctrl.is_archiving() {
            if let Err(e) = self.drift_ctrl.write() {
                warn!("Could not archive the DriftCtrl status report: {}", e);
            }
        }

        match output.vel_cmd {
            Some(cmd) => {
                self.stats.num_cmds += 1;

                if let Err(e) = self.sink.send(&cmd) {
                    self.stats.num_sink_errors += 1;
                    warn!("Could not send velocity command: {}", e);
                }

                StepOutcome::Commanded(cmd)
            }
            None => StepOutcome::InDeadZone,
        }
    }

    /// Run the loop on the current thread until the shutdown flag is raised.
    pub fn run(mut self) -> LoopStats {
        info!("Stabilisation loop started");

        while !self.shutdown.load(Ordering::Relaxed) {
            let frame = match self.frame_queue.pop_front_timeout(self.params.frame_wait_timeout) {
                Some(f) => f,
                None => continue,
            };

            self.step(frame);

            let period = self.params.queue_report_period_frames;
            if period > 0 && self.stats.num_frames % period == 0 {
                self.report_queues();
            }
        }

        self.tracker.shutdown();

        info!("Stabilisation loop stopped: {:?}", self.stats);

        self.stats
    }

    /// Run the loop on a dedicated thread.
    pub fn spawn(self) -> Result<StabHandle, StabLoopError> {
        let shutdown = self.shutdown.clone();

        let join_handle = thread::Builder::new()
            .name("stab_loop".into())
            .spawn(move || self.run())
            .map_err(StabLoopError::SpawnError)?;

        Ok(StabHandle {
            shutdown,
            join_handle,
        })
    }

    fn report_queues(&self) {
        for stats in [
            (self.imu_queue.name(), self.imu_queue.stats()),
            (self.frame_queue.name(), self.frame_queue.stats()),
        ]
        .iter()
        {
            debug!(
                "{} queue: len {}, high water {}, pushed {}, shed {}",
                stats.0, stats.1.len, stats.1.high_water_mark, stats.1.num_pushed, stats.1.num_shed
            );
        }
    }
}

impl StabHandle {
    /// Raise the shutdown flag and wait for the loop to finish.
    pub fn stop(self) -> Result<LoopStats, StabLoopError> {
        self.shutdown.store(true, Ordering::Relaxed);
        self.join_handle
            .join()
            .map_err(|_| StabLoopError::LoopPanicked)
    }
}
