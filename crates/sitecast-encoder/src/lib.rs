//! ffmpeg screen capture and RTMP push.
//!
//! This crate probes for the encoder binary, builds its argument template,
//! supervises the subprocess and keeps the tail of its diagnostic output.

mod args;
mod error;
mod ffmpeg;
mod ingest;
mod logs;
mod process;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use args::{ffmpeg_args, EncoderSettings, GrabDevice};
pub use error::EncoderError;
pub use ffmpeg::{probe_encoder, FfmpegBackend};
pub use ingest::{IngestEndpoint, DEFAULT_INGEST_URL};
pub use logs::{LogBuffer, LOG_BUFFER_CAPACITY};
pub use process::FfmpegProcess;

use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use sitecast_ipc::CaptureMode;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Default wait for the encoder to quit before it is killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// What the encoder grabs pixels from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// The whole desktop.
    Desktop,

    /// A top-level window with exactly this title.
    Window { title: String },
}

impl CaptureTarget {
    /// Capture mode this target belongs to.
    pub fn mode(&self) -> CaptureMode {
        match self {
            Self::Desktop => CaptureMode::Desktop,
            Self::Window { .. } => CaptureMode::Window,
        }
    }
}

/// One encoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderJob {
    /// Capture source.
    pub target: CaptureTarget,

    /// Full ingest URL including the stream key.
    pub ingest_url: String,
}

/// How an encoder process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// How a stop request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The encoder quit on request.
    Graceful,

    /// The encoder ignored the request and was killed.
    Killed,

    /// The encoder had already exited.
    AlreadyExited,
}

/// Something that can probe for and start encoders.
#[async_trait]
pub trait EncoderBackend: Send + Sync {
    /// Whether the encoder binary is installed and runs.
    async fn probe(&self) -> bool;

    /// Whether `mode` can be captured on this host.
    fn supports(&self, mode: CaptureMode) -> bool;

    /// Start an encoder for `job`.
    async fn spawn(&self, job: &EncoderJob) -> EncoderResult<Box<dyn EncoderProcess>>;
}

/// A running encoder.
#[async_trait]
pub trait EncoderProcess: Send + Sync {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Handle to the buffered diagnostic output.
    fn logs(&self) -> LogBuffer;

    /// Non-blocking check whether the process has exited.
    fn try_exit(&mut self) -> EncoderResult<Option<ExitInfo>>;

    /// Ask the encoder to quit, killing it after `grace`.
    async fn stop(&mut self, grace: Duration) -> EncoderResult<StopOutcome>;
}
