//! In-memory encoder fakes for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sitecast_ipc::CaptureMode;

use crate::args::{ffmpeg_args, EncoderSettings, GrabDevice};
use crate::error::EncoderError;
use crate::logs::LogBuffer;
use crate::{EncoderBackend, EncoderJob, EncoderProcess, EncoderResult, ExitInfo, StopOutcome};

/// Everything the fake encoder was asked to do.
#[derive(Debug, Clone, Default)]
pub struct FakeEncoderLog {
    pub probes: usize,
    pub spawned: Vec<Vec<String>>,
    pub stops: usize,
}

/// Knobs controlling how the fake behaves.
#[derive(Debug, Clone)]
pub struct FakeEncoderBehavior {
    pub installed: bool,
    pub supports_window: bool,
    pub fail_spawn: bool,
    /// Makes `stop` fail without the process exiting.
    pub fail_stop: bool,
    /// When set, every fake process reports this exit.
    pub exit: Option<ExitInfo>,
    /// Written into each new process' log buffer.
    pub output: String,
}

impl Default for FakeEncoderBehavior {
    fn default() -> Self {
        Self {
            installed: true,
            supports_window: true,
            fail_spawn: false,
            fail_stop: false,
            exit: None,
            output: "frame=1 fps=30 bitrate=2500.0kbits/s speed=1.0x\n".to_string(),
        }
    }
}

/// Encoder backend that builds real arguments but spawns nothing.
#[derive(Clone)]
pub struct FakeEncoderBackend {
    settings: EncoderSettings,
    log: Arc<Mutex<FakeEncoderLog>>,
    behavior: Arc<Mutex<FakeEncoderBehavior>>,
}

impl FakeEncoderBackend {
    pub fn new() -> Self {
        Self {
            settings: EncoderSettings {
                grab: GrabDevice::Gdigrab,
                ..Default::default()
            },
            log: Arc::new(Mutex::new(FakeEncoderLog::default())),
            behavior: Arc::new(Mutex::new(FakeEncoderBehavior::default())),
        }
    }

    /// Adjust the behavior knobs.
    pub fn set_behavior(&self, update: impl FnOnce(&mut FakeEncoderBehavior)) {
        update(&mut *self.behavior.lock());
    }

    /// Snapshot of the recorded calls.
    pub fn log(&self) -> FakeEncoderLog {
        self.log.lock().clone()
    }
}

impl Default for FakeEncoderBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncoderBackend for FakeEncoderBackend {
    async fn probe(&self) -> bool {
        self.log.lock().probes += 1;
        self.behavior.lock().installed
    }

    fn supports(&self, mode: CaptureMode) -> bool {
        match mode {
            CaptureMode::Desktop => true,
            CaptureMode::Window => self.behavior.lock().supports_window,
        }
    }

    async fn spawn(&self, job: &EncoderJob) -> EncoderResult<Box<dyn EncoderProcess>> {
        let behavior = self.behavior.lock().clone();
        if !behavior.installed {
            return Err(EncoderError::NotInstalled("fake-ffmpeg".into()));
        }
        if behavior.fail_spawn {
            return Err(EncoderError::Spawn(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "fake spawn failure",
            )));
        }

        let args = ffmpeg_args(&self.settings, job)?;
        self.log.lock().spawned.push(args);

        let logs = LogBuffer::default();
        logs.push(behavior.output.as_bytes());
        Ok(Box::new(FakeProcess {
            log: Arc::clone(&self.log),
            behavior: Arc::clone(&self.behavior),
            logs,
            stopped: false,
        }))
    }
}

/// A process that never runs anything.
pub struct FakeProcess {
    log: Arc<Mutex<FakeEncoderLog>>,
    behavior: Arc<Mutex<FakeEncoderBehavior>>,
    logs: LogBuffer,
    stopped: bool,
}

#[async_trait]
impl EncoderProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn logs(&self) -> LogBuffer {
        self.logs.clone()
    }

    fn try_exit(&mut self) -> EncoderResult<Option<ExitInfo>> {
        if self.stopped {
            return Ok(Some(ExitInfo { code: Some(0) }));
        }
        Ok(self.behavior.lock().exit)
    }

    async fn stop(&mut self, _grace: Duration) -> EncoderResult<StopOutcome> {
        if self.try_exit()?.is_some() {
            return Ok(StopOutcome::AlreadyExited);
        }
        self.log.lock().stops += 1;
        if self.behavior.lock().fail_stop {
            return Err(EncoderError::Stop(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "fake stop failure",
            )));
        }
        self.stopped = true;
        Ok(StopOutcome::Graceful)
    }
}
