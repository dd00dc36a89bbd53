//! Engine facade used by the HTTP layer.

use std::sync::Arc;

use parking_lot::Mutex;
use sitecast_encoder::EncoderBackend;
use sitecast_ipc::{platform_name, CaptureMode, StatusReport};
use sitecast_render::{normalize_url, BrowserLauncher, LaunchProfile, PreviewRenderer, Screenshot};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::command::SessionCommand;
use crate::config::EngineConfig;
use crate::error::SessionError;
use crate::orchestrator::Supervisor;
use crate::snapshot::{SessionSnapshot, SharedSnapshot};
use crate::state::ResourceManager;

const COMMAND_CAPACITY: usize = 16;

/// A successful preview.
#[derive(Debug, Clone)]
pub struct Preview {
    /// Normalized URL that was rendered.
    pub url: String,

    /// Viewport capture.
    pub screenshot: Screenshot,
}

/// Handle to the streaming engine. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    commands: mpsc::Sender<SessionCommand>,
    snapshot: SharedSnapshot,
    preview: PreviewRenderer,
    launcher: Arc<dyn BrowserLauncher>,
    encoder: Arc<dyn EncoderBackend>,
    config: EngineConfig,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Create the engine and spawn its supervisor task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        encoder: Arc<dyn EncoderBackend>,
        config: EngineConfig,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let snapshot = SharedSnapshot::new();

        let resources = ResourceManager::new(
            Arc::clone(&launcher),
            Arc::clone(&encoder),
            config.load,
            config.encoder_grace,
        );
        let supervisor = Supervisor::new(
            command_rx,
            snapshot.clone(),
            resources,
            Arc::clone(&encoder),
            config.ingest.clone(),
            config.stop_grace,
            config.watch_interval,
        );
        let handle = tokio::spawn(supervisor.run());

        Self {
            inner: Arc::new(EngineInner {
                commands: command_tx,
                snapshot,
                preview: PreviewRenderer::new(Arc::clone(&launcher), config.load),
                launcher,
                encoder,
                config,
                supervisor: Mutex::new(Some(handle)),
            }),
        }
    }

    /// Render a preview of `raw_url` and make it the current URL.
    #[instrument(name = "preview", skip(self))]
    pub async fn preview(&self, raw_url: &str) -> Result<Preview, SessionError> {
        let url = normalize_url(raw_url)?;
        let screenshot = self.inner.preview.render(&url).await?;

        self.inner
            .snapshot
            .update(|s| s.current_url = Some(url.clone()));
        info!(url = %url, bytes = screenshot.len(), "Preview rendered");

        Ok(Preview { url, screenshot })
    }

    /// Start streaming the current URL.
    pub async fn start_stream(
        &self,
        stream_key: &str,
        capture_mode: CaptureMode,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Start {
            stream_key: stream_key.to_string(),
            capture_mode,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionError::SupervisorGone)?
    }

    /// Stop the live session.
    pub async fn stop_stream(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::Stop { reply }).await?;
        rx.await.map_err(|_| SessionError::SupervisorGone)?
    }

    /// Current status, including a fresh encoder probe.
    pub async fn status(&self) -> StatusReport {
        let ffmpeg_available = self.inner.encoder.probe().await;
        let snapshot = self.inner.snapshot.get();

        StatusReport {
            streaming: snapshot.state.is_active(),
            has_stream_key: snapshot.stream_key.is_some(),
            ffmpeg_available,
            platform: platform_name(),
            state: snapshot.state.name().to_string(),
            capture_mode: snapshot.capture_mode(),
            uptime_seconds: snapshot.uptime_seconds(),
            last_error: snapshot.last_error.clone(),
            current_url: snapshot.current_url.unwrap_or_default(),
        }
    }

    /// Tail of the encoder output, or a placeholder.
    pub fn logs(&self) -> String {
        self.inner.snapshot.get().log_tail()
    }

    /// Copy of the session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.get()
    }

    /// Whether the encoder binary answers.
    pub async fn encoder_available(&self) -> bool {
        self.inner.encoder.probe().await
    }

    /// Whether `mode` can be captured on this host.
    pub fn supports(&self, mode: CaptureMode) -> bool {
        self.inner.encoder.supports(mode)
    }

    /// Launch a throwaway browser, load the diagnostic page and report its title.
    #[instrument(name = "test_browser", skip(self))]
    pub async fn test_browser(&self) -> Result<String, SessionError> {
        let url = &self.inner.config.diagnostic_url;
        let mut browser = self.inner.launcher.launch(LaunchProfile::Diagnostic).await?;

        let result = async {
            browser.load(url, &self.inner.config.load).await?;
            browser.title().await
        }
        .await;

        if let Err(e) = browser.close().await {
            debug!("Ignoring browser close error: {}", e);
        }

        let title = result?;
        info!(title = %title, "Browser test passed");
        Ok(format!("Browser test successful. Title: {title}"))
    }

    /// Stop any session, end the supervisor and close the preview browser.
    #[instrument(name = "engine_shutdown", skip(self))]
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .inner
            .commands
            .send(SessionCommand::Shutdown { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }

        let handle = self.inner.supervisor.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Supervisor task failed: {}", e);
            }
        }

        self.inner.preview.close().await;
        info!("Engine shut down");
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.inner
            .commands
            .send(command)
            .await
            .map_err(|_| SessionError::SupervisorGone)
    }
}
