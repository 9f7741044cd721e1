//! Main stabiliser executable entry point.
//!
//! # Architecture
//!
//! The executable replays a recorded dataset through the stabilisation loop:
//!
//!     - Initialise the session, parameters and modules
//!     - Spawn the sensor producers (IMU and one image stream)
//!     - Spawn the stabilisation loop, which consumes frames as they arrive
//!     - Main loop:
//!         - Telecommand processing from the optional script
//!         - Replay and queue monitoring
//!     - Shutdown the loop and producers and close the session
//!
//! Velocity commands are archived into the session as `arch/vel_cmd.csv`.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use stab_lib::{
    cmd_sink::ArchiveSink,
    control_state::ControlState,
    drift_ctrl::{self, DriftCtrl},
    params::StabExecParams,
    replay::{self, Pacer},
    sensor_queue::SensorQueue,
    stab_loop::StabLoop,
    tracker::SequentialPoseTracker,
};

mod tc_processor;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, info, warn};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};
use structopt::StructOpt;

// Internal
use util::{
    host,
    logger::{logger_init, parse_level},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Vision-inertial position hold, replaying a recorded dataset.
#[derive(Debug, StructOpt)]
#[structopt(name = "stab_exec")]
struct Opts {
    /// Executable parameter file, defaults to `params/stab_exec.toml` under the software root
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Telecommand script to execute
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("stab_exec", "sessions").wrap_err("Failed to create the session")?;

    // ---- LOAD PARAMETERS ----

    let exec_params: StabExecParams = match opts.params {
        Some(ref path) => util::params::load_from_path(path),
        None => util::params::load("stab_exec.toml"),
    }
    .wrap_err("Could not load exec params")?;

    // Initialise logger
    let log_level = parse_level(&exec_params.log_level).wrap_err("Invalid log level")?;
    logger_init(log_level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Stabiliser Executable\n");
    info!(
        "Running on: {}",
        host::get_hostname().unwrap_or_else(|| String::from("unknown host"))
    );
    info!("Session directory: {:?}\n", session.session_root);

    let drift_params: drift_ctrl::Params =
        util::params::load("drift_ctrl.toml").wrap_err("Could not load DriftCtrl params")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE TC SOURCE ----

    let mut script = match opts.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path).wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            Some(si)
        }
        None => {
            info!("No script provided, hold stays released for the whole replay\n");
            None
        }
    };

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let control = Arc::new(ControlState::new(
        drift_params.movement_gain,
        drift_params.rotation_gain,
    ));

    let mut drift_ctrl = DriftCtrl::default();
    drift_ctrl
        .init(drift_params, &session)
        .wrap_err("Failed to initialise DriftCtrl")?;
    info!("DriftCtrl init complete");

    let imu_queue = Arc::new(SensorQueue::with_max_len("imu", exec_params.imu_queue_max_len));
    let frame_queue = Arc::new(SensorQueue::with_max_len(
        "frame",
        exec_params.frame_queue_max_len,
    ));

    let dataset = exec_params.dataset_path();

    let tracker = SequentialPoseTracker::from_csv(dataset.join(&exec_params.poses_file))
        .wrap_err("Failed to initialise the tracker")?;
    info!("Tracker init complete");

    let sink =
        ArchiveSink::new(&session, "vel_cmd.csv").wrap_err("Failed to initialise the command sink")?;

    info!("Module initialisation complete\n");

    // ---- INITIALISE REPLAY ----

    let imu = replay::load_imu(dataset.join(&exec_params.imu_file))
        .wrap_err("Failed to load the IMU recording")?;
    let frames = replay::load_frames(dataset.join(&exec_params.frames_file))
        .wrap_err("Failed to load the frame list")?;

    info!(
        "Replaying {} IMU samples and {} {:?} frames from {:?} at {}x speed",
        imu.len(),
        frames.len(),
        exec_params.image_source,
        dataset,
        exec_params.playback_speed
    );

    // Both streams are paced from the earliest sample in either
    let start_s = imu
        .first()
        .map(|s| s.timestamp_s)
        .into_iter()
        .chain(frames.first().map(|f| f.timestamp_s))
        .fold(std::f64::INFINITY, f64::min);
    let start_s = if start_s.is_finite() { start_s } else { 0.0 };

    let pacer = Pacer::new(Instant::now(), start_s, exec_params.playback_speed);
    let replay_shutdown = Arc::new(AtomicBool::new(false));

    let stab_loop = StabLoop::new(
        control.clone(),
        imu_queue.clone(),
        frame_queue.clone(),
        tracker,
        sink,
        drift_ctrl,
        exec_params.loop_params(),
    );

    let imu_producer =
        replay::spawn_imu_producer(imu, imu_queue.clone(), pacer, replay_shutdown.clone())
            .wrap_err("Failed to start the IMU producer")?;

    let image_producer = replay::spawn_image_producer(
        frames,
        dataset,
        exec_params.image_source,
        exec_params.raw_format(),
        frame_queue.clone(),
        pacer,
        replay_shutdown.clone(),
    )
    .wrap_err("Failed to start the image producer")?;

    let stab_handle = stab_loop
        .spawn()
        .wrap_err("Failed to start the stabilisation loop")?;

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let mut num_cycles: u64 = 0;

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- TELECOMMAND PROCESSING ----

        if let Some(ref mut si) = script {
            match si.get_pending_tcs() {
                PendingTcs::None => (),
                PendingTcs::Some(tc_vec) => {
                    for tc in tc_vec.iter() {
                        tc_processor::exec(&control, tc);
                    }
                }
                // Exit if end of script reached
                PendingTcs::EndOfScript => {
                    info!("End of TC script reached, stopping");
                    break;
                }
            }
        }

        // ---- REPLAY MONITORING ----

        if image_producer.is_finished() && frame_queue.is_empty() {
            info!("Replay complete, stopping");
            break;
        }

        if num_cycles % (CYCLE_FREQUENCY_HZ as u64) == 0 {
            let imu_stats = imu_queue.stats();
            let frame_stats = frame_queue.stats();
            debug!(
                "Queues: imu {} (max {}, shed {}), frame {} (max {}, shed {})",
                imu_stats.len,
                imu_stats.high_water_mark,
                imu_stats.num_shed,
                frame_stats.len,
                frame_stats.high_water_mark,
                frame_stats.num_shed
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => thread::sleep(d),
            None => warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
            ),
        }

        num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    replay_shutdown.store(true, Ordering::Relaxed);

    let loop_stats = stab_handle
        .stop()
        .wrap_err("Failed to stop the stabilisation loop")?;
    info!("Stabilisation loop: {:?}", loop_stats);
    session.save("loop_stats.json", loop_stats);

    for producer in vec![imu_producer, image_producer] {
        let name = producer.name();
        match producer.join() {
            Ok(stats) => info!("{} producer: {:?}", name, stats),
            Err(e) => warn!("{} producer did not complete: {}", name, e),
        }
    }

    info!(
        "Commanded {} of {} frames, {} checkpoint(s) captured",
        loop_stats.num_cmds, loop_stats.num_frames, loop_stats.num_captures
    );

    session.exit();

    info!("End of execution");

    Ok(())
}
