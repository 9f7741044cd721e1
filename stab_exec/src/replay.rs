//! # Dataset replay
//!
//! Stands in for the camera and IMU drivers by replaying a recorded dataset. Each sensor gets its
//! own producer thread which pushes into the matching [`SensorQueue`], paced against a shared
//! epoch so the two streams keep their recorded relative timing.
//!
//! A dataset directory holds:
//!
//! - an IMU CSV with columns `timestamp_s,acc_x,acc_y,acc_z,gyr_x,gyr_y,gyr_z`,
//! - a frames CSV with columns `timestamp_s,file`, where `file` is relative to the dataset
//!   directory and holds either raw pixels or a JPEG depending on the configured image source.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use comms_if::eqpt::{
    cam::{CamError, CamFrame, CamImage, ImageFormat, ImageSource, PixelEncoding, RawImage},
    imu::{ImuRecord, ImuSample},
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::sensor_queue::SensorQueue;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Longest single sleep while waiting for a sample to fall due, bounds the shutdown latency.
const MAX_SLEEP: Duration = Duration::from_millis(20);

/// Largest offset from the replay start that is paced, later samples are released immediately.
///
/// Units: seconds
const MAX_PACED_OFFSET_S: f64 = 1.0e9;

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// One row of the frames CSV.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FrameRecord {
    pub timestamp_s: f64,
    pub file: String,
}

/// Geometry of the raw frames in a dataset.
#[derive(Debug, Clone, Copy)]
pub struct RawFormat {
    pub width: u32,
    pub height: u32,
    pub encoding: PixelEncoding,
}

/// Maps dataset timestamps onto wall clock instants.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    epoch: Instant,
    start_s: f64,
    speed: f64,
}

/// Counters returned by a producer once it has finished.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProducerStats {
    pub num_pushed: u64,
    pub num_dropped: u64,
}

/// A running producer thread.
pub struct ProducerHandle {
    name: &'static str,
    finished: Arc<AtomicBool>,
    join_handle: JoinHandle<ProducerStats>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Could not read {0:?}: {1}")]
    CsvError(PathBuf, csv::Error),

    #[error("Could not spawn the {0} producer thread: {1}")]
    SpawnError(&'static str, std::io::Error),

    #[error("The {0} producer thread panicked")]
    ProducerPanicked(&'static str),
}

/// Why a single frame could not be produced.
#[derive(Debug, thiserror::Error)]
enum FrameError {
    #[error("could not read the file: {0}")]
    ReadError(std::io::Error),

    #[error("could not decode the image: {0}")]
    CamError(CamError),
}

// -----------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Load an IMU recording, sorted by timestamp.
pub fn load_imu<P: AsRef<Path>>(path: P) -> Result<Vec<ImuSample>, ReplayError> {
    let mut samples: Vec<ImuSample> = load_csv::<ImuRecord, _>(path.as_ref())?
        .into_iter()
        .map(ImuSample::from)
        .collect();

    samples.sort_by(|a, b| cmp_timestamps(a.timestamp_s, b.timestamp_s));

    Ok(samples)
}

/// Load a frame list, sorted by timestamp.
pub fn load_frames<P: AsRef<Path>>(path: P) -> Result<Vec<FrameRecord>, ReplayError> {
    let mut frames: Vec<FrameRecord> = load_csv(path.as_ref())?;

    frames.sort_by(|a, b| cmp_timestamps(a.timestamp_s, b.timestamp_s));

    Ok(frames)
}

/// Start a thread pushing every sample into `queue`.
pub fn spawn_imu_producer(
    samples: Vec<ImuSample>,
    queue: Arc<SensorQueue<ImuSample>>,
    pacer: Pacer,
    shutdown: Arc<AtomicBool>,
) -> Result<ProducerHandle, ReplayError> {
    ProducerHandle::spawn("imu", move || {
        let mut stats = ProducerStats::default();

        for sample in samples {
            if !pacer.wait_for(sample.timestamp_s, &shutdown) {
                break;
            }

            queue.push(sample);
            stats.num_pushed += 1;
        }

        stats
    })
}

/// Start a thread reading, decoding and pushing every frame into `queue`.
///
/// Frames which cannot be read or decoded are logged and dropped, the stream carries on.
pub fn spawn_image_producer(
    frames: Vec<FrameRecord>,
    dataset_dir: PathBuf,
    source: ImageSource,
    raw_format: RawFormat,
    queue: Arc<SensorQueue<CamImage>>,
    pacer: Pacer,
    shutdown: Arc<AtomicBool>,
) -> Result<ProducerHandle, ReplayError> {
    let name = match source {
        ImageSource::Raw => "raw_image",
        ImageSource::CompressedJpeg => "compressed_image",
    };

    ProducerHandle::spawn(name, move || {
        let mut stats = ProducerStats::default();

        for frame in frames {
            if !pacer.wait_for(frame.timestamp_s, &shutdown) {
                break;
            }

            let path = dataset_dir.join(&frame.file);

            match read_frame(&path, frame.timestamp_s, source, &raw_format) {
                Ok(image) => {
                    queue.push(image);
                    stats.num_pushed += 1;
                }
                Err(e) => {
                    warn!("Dropping frame {:?} at {:.3} s, {}", path, frame.timestamp_s, e);
                    stats.num_dropped += 1;
                }
            }
        }

        stats
    })
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl Pacer {
    /// Create a pacer which releases the sample stamped `start_s` at `epoch`.
    ///
    /// `speed` scales playback, `2.0` runs twice as fast as recorded. A speed of zero or less
    /// disables pacing altogether.
    pub fn new(epoch: Instant, start_s: f64, speed: f64) -> Self {
        Self {
            epoch,
            start_s,
            speed,
        }
    }

    /// True if samples are released at their recorded rate.
    pub fn is_paced(&self) -> bool {
        self.speed > 0.0
    }

    /// The instant a sample falls due, or `None` if playback is unpaced or the timestamp cannot be
    /// placed on the wall clock.
    pub fn due(&self, timestamp_s: f64) -> Option<Instant> {
        if !self.is_paced() {
            return None;
        }

        let offset_s = ((timestamp_s - self.start_s) / self.speed).max(0.0);

        if !offset_s.is_finite() || offset_s > MAX_PACED_OFFSET_S {
            return None;
        }

        self.epoch.checked_add(Duration::from_secs_f64(offset_s))
    }

    /// Block until the sample is due. Returns false if `shutdown` was raised while waiting.
    pub fn wait_for(&self, timestamp_s: f64, shutdown: &AtomicBool) -> bool {
        let due = self.due(timestamp_s);

        if due.is_none() && self.is_paced() {
            warn!(
                "Sample at {} s is too far from the replay start to pace, releasing it now",
                timestamp_s
            );
        }

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return false;
            }

            let remaining = match due {
                Some(d) => d.saturating_duration_since(Instant::now()),
                None => return true,
            };

            if remaining == Duration::from_secs(0) {
                return true;
            }

            thread::sleep(remaining.min(MAX_SLEEP));
        }
    }
}

impl ProducerHandle {
    fn spawn<F>(name: &'static str, body: F) -> Result<Self, ReplayError>
    where
        F: FnOnce() -> ProducerStats + Send + 'static,
    {
        let finished = Arc::new(AtomicBool::new(false));
        let finished_thread = finished.clone();

        let join_handle = thread::Builder::new()
            .name(format!("replay::{}", name))
            .spawn(move || {
                let _finished = FinishedGuard(finished_thread);
                let stats = body();
                info!(
                    "{} producer finished, {} pushed, {} dropped",
                    name, stats.num_pushed, stats.num_dropped
                );
                stats
            })
            .map_err(|e| ReplayError::SpawnError(name, e))?;

        debug!("{} producer started", name);

        Ok(Self {
            name,
            finished,
            join_handle,
        })
    }

    /// True once the producer has pushed its last sample.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wait for the producer to exit.
    pub fn join(self) -> Result<ProducerStats, ReplayError> {
        let name = self.name;
        self.join_handle
            .join()
            .map_err(|_| ReplayError::ProducerPanicked(name))
    }
}

/// Raises the producer's finished flag when dropped, so a panicking producer still reports done.
struct FinishedGuard(Arc<AtomicBool>);

impl Drop for FinishedGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

// -----------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// -----------------------------------------------------------------------------------------------

fn cmp_timestamps(a: f64, b: f64) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

fn load_csv<T, P>(path: P) -> Result<Vec<T>, ReplayError>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let to_err = |e| ReplayError::CsvError(path.as_ref().to_path_buf(), e);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path.as_ref())
        .map_err(to_err)?;

    reader
        .deserialize::<T>()
        .collect::<Result<Vec<T>, _>>()
        .map_err(to_err)
}

fn read_frame(
    path: &Path,
    timestamp_s: f64,
    source: ImageSource,
    raw_format: &RawFormat,
) -> Result<CamImage, FrameError> {
    let data = std::fs::read(path).map_err(FrameError::ReadError)?;

    match source {
        ImageSource::Raw => RawImage {
            timestamp_s,
            width: raw_format.width,
            height: raw_format.height,
            encoding: raw_format.encoding,
            data,
        }
        .into_cam_image(),
        ImageSource::CompressedJpeg => CamFrame {
            timestamp_s,
            format: ImageFormat::Jpeg(0),
            data,
        }
        .to_cam_image(),
    }
    .map_err(FrameError::CamError)
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stab_replay_{}_{}",
            name,
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_sorted() {
        let dir = temp_dir("load");

        fs::write(
            dir.join("imu.csv"),
            "timestamp_s,acc_x,acc_y,acc_z,gyr_x,gyr_y,gyr_z\n\
             0.2, 0, 0, 9.81, 0, 0, 0\n\
             0.1, 0, 0, 9.81, 0, 0, 0.5\n",
        )
        .unwrap();
        fs::write(dir.join("frames.csv"), "timestamp_s,file\n0.5,b.raw\n0.25,a.raw\n").unwrap();

        let imu = load_imu(dir.join("imu.csv")).unwrap();
        assert_eq!(imu.len(), 2);
        assert_eq!(imu[0].timestamp_s, 0.1);
        assert_eq!(imu[0].ang_vel_rads.z, 0.5);

        let frames = load_frames(dir.join("frames.csv")).unwrap();
        assert_eq!(frames[0].file, "a.raw");

        assert!(matches!(
            load_frames(dir.join("missing.csv")),
            Err(ReplayError::CsvError(_, _))
        ));
    }

    #[test]
    fn test_pacer() {
        let epoch = Instant::now();

        let pacer = Pacer::new(epoch, 10.0, 2.0);
        assert_eq!(pacer.due(11.0), Some(epoch + Duration::from_millis(500)));
        assert_eq!(pacer.due(9.0), Some(epoch));

        assert_eq!(Pacer::new(epoch, 10.0, 0.0).due(11.0), None);
    }

    #[test]
    fn test_pacer_out_of_range_timestamps() {
        let epoch = Instant::now();
        let pacer = Pacer::new(epoch, 0.0, 1.0);

        assert_eq!(pacer.due(1e20), None);
        assert_eq!(pacer.due(std::f64::NAN), None);
        assert_eq!(pacer.due(std::f64::INFINITY), None);

        // Released immediately rather than panicking
        assert!(pacer.wait_for(1e20, &AtomicBool::new(false)));
    }

    #[test]
    fn test_imu_producer_survives_far_timestamp() {
        let samples = vec![
            ImuSample::new(0.0, Vector3::zeros(), Vector3::zeros()),
            ImuSample::new(1e20, Vector3::zeros(), Vector3::zeros()),
        ];

        let queue = Arc::new(SensorQueue::new("imu"));
        let handle = spawn_imu_producer(
            samples,
            queue.clone(),
            Pacer::new(Instant::now(), 0.0, 1.0),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        assert_eq!(handle.join().unwrap().num_pushed, 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_panicked_producer_reports_finished() {
        let handle = ProducerHandle::spawn("broken", || panic!("producer failure")).unwrap();

        let start = Instant::now();
        while !handle.is_finished() && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(1));
        }

        assert!(handle.is_finished());
        assert!(matches!(handle.join(), Err(ReplayError::ProducerPanicked("broken"))));
    }

    #[test]
    fn test_pacer_shutdown() {
        let pacer = Pacer::new(Instant::now(), 0.0, 1.0);
        let shutdown = AtomicBool::new(true);

        assert!(!pacer.wait_for(1000.0, &shutdown));
    }

    #[test]
    fn test_image_producer_drops_bad_frames() {
        let dir = temp_dir("frames");

        fs::write(dir.join("good.raw"), vec![7u8; 4 * 3]).unwrap();
        fs::write(dir.join("short.raw"), vec![7u8; 5]).unwrap();

        let frames = vec![
            FrameRecord { timestamp_s: 0.1, file: "good.raw".into() },
            FrameRecord { timestamp_s: 0.2, file: "short.raw".into() },
            FrameRecord { timestamp_s: 0.3, file: "absent.raw".into() },
            FrameRecord { timestamp_s: 0.4, file: "good.raw".into() },
        ];

        let queue = Arc::new(SensorQueue::new("frame"));
        let handle = spawn_image_producer(
            frames,
            dir,
            ImageSource::Raw,
            RawFormat {
                width: 4,
                height: 3,
                encoding: PixelEncoding::Mono8,
            },
            queue.clone(),
            Pacer::new(Instant::now(), 0.0, 0.0),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        let stats = handle.join().unwrap();

        assert_eq!(stats, ProducerStats { num_pushed: 2, num_dropped: 2 });
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop_front().map(|f| f.timestamp_s), Some(0.1));
    }

    #[test]
    fn test_imu_producer() {
        let samples = (0..5)
            .map(|i| ImuSample::new(i as f64 * 0.01, Vector3::zeros(), Vector3::zeros()))
            .collect();

        let queue = Arc::new(SensorQueue::new("imu"));
        let handle = spawn_imu_producer(
            samples,
            queue.clone(),
            Pacer::new(Instant::now(), 0.0, 1.0),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        assert_eq!(handle.name(), "imu");
        assert_eq!(handle.join().unwrap().num_pushed, 5);
        assert_eq!(queue.len(), 5);
    }
}
