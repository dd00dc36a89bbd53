//! ffmpeg backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use sitecast_ipc::CaptureMode;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::args::{ffmpeg_args, EncoderSettings};
use crate::process::FfmpegProcess;
use crate::{EncoderBackend, EncoderJob, EncoderProcess, EncoderResult};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Whether `binary -version` runs and exits successfully.
pub async fn probe_encoder(binary: &Path) -> bool {
    let mut command = Command::new(binary);
    command
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(PROBE_TIMEOUT, command.status()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!("Encoder probe failed for {}: {}", binary.display(), e);
            false
        }
        Err(_) => {
            warn!("Encoder probe timed out for {}", binary.display());
            false
        }
    }
}

/// Starts real ffmpeg processes.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    binary: PathBuf,
    settings: EncoderSettings,
}

impl FfmpegBackend {
    pub fn new(binary: impl Into<PathBuf>, settings: EncoderSettings) -> Self {
        Self {
            binary: binary.into(),
            settings,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl EncoderBackend for FfmpegBackend {
    async fn probe(&self) -> bool {
        probe_encoder(&self.binary).await
    }

    fn supports(&self, mode: CaptureMode) -> bool {
        self.settings.grab.supports(mode)
    }

    #[instrument(
        name = "encoder_spawn",
        skip(self, job),
        fields(mode = job.target.mode().as_str())
    )]
    async fn spawn(&self, job: &EncoderJob) -> EncoderResult<Box<dyn EncoderProcess>> {
        let args = ffmpeg_args(&self.settings, job)?;
        // Everything but the ingest URL, which carries the key
        debug!("ffmpeg {}", args[..args.len() - 1].join(" "));

        let process = FfmpegProcess::spawn(&self.binary, &args)?;
        info!(grab = self.settings.grab.name(), "Capture started");
        Ok(Box::new(process))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::GrabDevice;

    #[tokio::test]
    async fn test_probe_missing_binary() {
        assert!(!probe_encoder(Path::new("/nonexistent/ffmpeg")).await);
    }

    #[test]
    fn test_supports_follows_grabber() {
        let x11 = FfmpegBackend::new(
            "ffmpeg",
            EncoderSettings {
                grab: GrabDevice::X11grab {
                    display: ":0.0".into(),
                },
                ..Default::default()
            },
        );
        assert!(x11.supports(CaptureMode::Desktop));
        assert!(!x11.supports(CaptureMode::Window));

        let gdi = FfmpegBackend::new(
            "ffmpeg",
            EncoderSettings {
                grab: GrabDevice::Gdigrab,
                ..Default::default()
            },
        );
        assert!(gdi.supports(CaptureMode::Window));
    }
}
