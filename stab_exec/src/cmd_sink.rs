//! # Command sinks
//!
//! Destinations for the velocity commands produced by the stabilisation loop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::mpsc::Sender;

use comms_if::eqpt::vel::{VelocityCmd, VelocityCmdRecord};
use log::info;
use util::{
    archive::{ArchiveError, Archiver},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The actuation interface which receives velocity commands.
pub trait CmdSink: Send {
    /// Deliver one command. Failures are reported to the caller, which decides whether to
    /// continue.
    fn send(&mut self, cmd: &VelocityCmd) -> Result<(), SinkError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Forwards commands over an `mpsc` channel, for consumers running on another thread.
pub struct ChannelSink {
    sender: Sender<VelocityCmd>,
}

/// Writes every command into a CSV archive in the session directory.
pub struct ArchiveSink {
    archiver: Archiver,

    num_written: u64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("The command receiver has been dropped")]
    Disconnected,

    #[error("Could not archive the command: {0}")]
    ArchiveError(ArchiveError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChannelSink {
    pub fn new(sender: Sender<VelocityCmd>) -> Self {
        Self { sender }
    }
}

impl CmdSink for ChannelSink {
    fn send(&mut self, cmd: &VelocityCmd) -> Result<(), SinkError> {
        self.sender
            .send(cmd.clone())
            .map_err(|_| SinkError::Disconnected)
    }
}

impl ArchiveSink {
    /// Create a sink writing to `path`, relative to the session's archive root.
    pub fn new(session: &Session, path: &str) -> Result<Self, SinkError> {
        Archiver::from_path(session, path)
            .map(Self::with_archiver)
            .map_err(SinkError::ArchiveError)
    }

    fn with_archiver(archiver: Archiver) -> Self {
        Self {
            archiver,
            num_written: 0,
        }
    }
}

impl CmdSink for ArchiveSink {
    fn send(&mut self, cmd: &VelocityCmd) -> Result<(), SinkError> {
        self.archiver
            .serialise(VelocityCmdRecord::from(cmd))
            .map_err(SinkError::ArchiveError)?;

        self.num_written += 1;

        Ok(())
    }
}

impl Drop for ArchiveSink {
    fn drop(&mut self) {
        info!("Velocity command archive closed after {} commands", self.num_written);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use nalgebra::Vector3;
    use std::{fs, sync::mpsc::channel};

    fn cmd() -> VelocityCmd {
        VelocityCmd {
            timestamp: Utc::now(),
            frame_id: "base_link".into(),
            linear: Vector3::new(1.0, 2.0, 3.0),
            angular: Vector3::zeros(),
        }
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = channel();
        let mut sink = ChannelSink::new(tx);

        sink.send(&cmd()).unwrap();
        assert_eq!(rx.try_recv().unwrap().linear, Vector3::new(1.0, 2.0, 3.0));

        drop(rx);
        assert!(matches!(sink.send(&cmd()), Err(SinkError::Disconnected)));
    }

    #[test]
    fn test_archive_sink() {
        let path = std::env::temp_dir()
            .join(format!("stab_cmd_sink_{}", std::process::id()))
            .join("vel_cmd.csv");

        {
            let archiver = Archiver::from_full_path(&path).unwrap();
            let mut sink: Box<dyn CmdSink> = Box::new(ArchiveSink::with_archiver(archiver));
            sink.send(&cmd()).unwrap();

            let mut second = cmd();
            second.angular = Vector3::new(0.0, 0.0, -0.5);
            sink.send(&second).unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp_ms,lin_x,lin_y,lin_z,ang_x,ang_y,ang_z");
        assert!(lines[1].ends_with(",1.0,2.0,3.0,0.0,0.0,0.0"));
        assert!(lines[2].ends_with(",1.0,2.0,3.0,0.0,0.0,-0.5"));
    }
}
