//! ffmpeg subprocess supervision.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tracing::{debug, info, trace, warn};

use crate::error::EncoderError;
use crate::logs::LogBuffer;
use crate::{EncoderProcess, EncoderResult, ExitInfo, StopOutcome};

/// A running ffmpeg child with its stderr drained into a [`LogBuffer`].
pub struct FfmpegProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    pid: Option<u32>,
    logs: LogBuffer,
    exited: Option<ExitInfo>,
}

impl FfmpegProcess {
    /// Spawn `program` with `args`. Must be called inside a tokio runtime.
    pub fn spawn(program: &Path, args: &[String]) -> EncoderResult<Self> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EncoderError::NotInstalled(program.display().to_string())
            } else {
                EncoderError::Spawn(e)
            }
        })?;

        let logs = LogBuffer::default();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain_stderr(stderr, logs.clone()));
        }

        let pid = child.id();
        info!(pid, "Encoder started");

        Ok(Self {
            stdin: child.stdin.take(),
            child,
            pid,
            logs,
            exited: None,
        })
    }
}

async fn drain_stderr(mut stderr: ChildStderr, logs: LogBuffer) {
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                trace!(bytes = n, "Encoder output");
                logs.push(&buf[..n]);
            }
            Err(e) => {
                debug!("Encoder stderr closed: {}", e);
                break;
            }
        }
    }
}

#[async_trait]
impl EncoderProcess for FfmpegProcess {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn logs(&self) -> LogBuffer {
        self.logs.clone()
    }

    fn try_exit(&mut self) -> EncoderResult<Option<ExitInfo>> {
        if let Some(exit) = self.exited {
            return Ok(Some(exit));
        }
        let exit = self.child.try_wait()?.map(ExitInfo::from);
        self.exited = exit;
        Ok(exit)
    }

    async fn stop(&mut self, grace: Duration) -> EncoderResult<StopOutcome> {
        if self.try_exit()?.is_some() {
            return Ok(StopOutcome::AlreadyExited);
        }

        // ffmpeg finishes the stream and exits on 'q'
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.write_all(b"q").await {
                debug!("Could not send quit to encoder: {}", e);
            }
            let _ = stdin.flush().await;
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                let exit = ExitInfo::from(status);
                info!(%exit, "Encoder stopped");
                self.exited = Some(exit);
                Ok(StopOutcome::Graceful)
            }
            Ok(Err(e)) => Err(EncoderError::Stop(e)),
            Err(_) => {
                warn!("Encoder ignored quit for {:?}, killing", grace);
                self.child.kill().await.map_err(EncoderError::Stop)?;
                self.exited = Some(ExitInfo { code: None });
                Ok(StopOutcome::Killed)
            }
        }
    }
}
