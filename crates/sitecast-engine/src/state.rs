//! Stream resource management and phase tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sitecast_encoder::{
    CaptureTarget, EncoderBackend, EncoderError, EncoderJob, EncoderProcess, ExitInfo, LogBuffer,
    StopOutcome,
};
use sitecast_ipc::{CaptureMode, StartupPhase};
use sitecast_render::{BrowserLauncher, LaunchProfile, LoadPolicy, RenderError, RenderInstance};
use tracing::{debug, info, instrument, warn};

use crate::error::SessionError;

/// Grace given to an encoder killed during rollback.
const ROLLBACK_GRACE: Duration = Duration::from_millis(500);

/// Bytes of encoder output quoted in an early-exit error.
const EXIT_LOG_TAIL: usize = 1024;

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique page title used to find the stream window.
pub(crate) fn title_marker() -> String {
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("sitecast-{}-{}", std::process::id(), seq)
}

/// What a session should stream.
#[derive(Debug, Clone)]
pub struct StreamPlan {
    /// Page to load.
    pub url: String,

    /// What the encoder captures.
    pub capture_mode: CaptureMode,

    /// Full ingest URL including the key.
    pub ingest_url: String,
}

/// Resources created during startup.
#[derive(Default)]
pub struct StreamResources {
    /// Dedicated stream browser.
    pub browser: Option<Box<dyn RenderInstance>>,

    /// Window title the encoder captures, in window mode.
    pub window_title: Option<String>,

    /// Encoder subprocess.
    pub encoder: Option<Box<dyn EncoderProcess>>,
}

/// Creates, tracks and tears down the resources of one session.
pub struct ResourceManager {
    launcher: Arc<dyn BrowserLauncher>,
    encoder: Arc<dyn EncoderBackend>,
    policy: LoadPolicy,
    encoder_grace: Duration,
    resources: StreamResources,
    current_phase: Option<StartupPhase>,
}

impl ResourceManager {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        encoder: Arc<dyn EncoderBackend>,
        policy: LoadPolicy,
        encoder_grace: Duration,
    ) -> Self {
        Self {
            launcher,
            encoder,
            policy,
            encoder_grace,
            resources: StreamResources::default(),
            current_phase: None,
        }
    }

    /// Run every startup phase in order. `on_phase` is called as each begins.
    ///
    /// On error the resources created so far stay in place until
    /// [`rollback`](Self::rollback) is called.
    #[instrument(
        name = "init_resources",
        skip_all,
        fields(url = %plan.url, mode = plan.capture_mode.as_str())
    )]
    pub async fn initialize(
        &mut self,
        plan: &StreamPlan,
        mut on_phase: impl FnMut(StartupPhase),
    ) -> Result<(), SessionError> {
        let mut phase = StartupPhase::LaunchBrowser;

        loop {
            self.current_phase = Some(phase);
            on_phase(phase);
            self.init_phase(plan, phase).await?;

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        Ok(())
    }

    async fn init_phase(
        &mut self,
        plan: &StreamPlan,
        phase: StartupPhase,
    ) -> Result<(), SessionError> {
        info!("Initializing phase: {}", phase.name());

        match phase {
            StartupPhase::LaunchBrowser => self.launch_browser().await,
            StartupPhase::LoadPage => self.load_page(plan).await,
            StartupPhase::SpawnEncoder => self.spawn_encoder(plan).await,
            StartupPhase::ConfirmEncoder => self.confirm_encoder().await,
        }
    }

    async fn launch_browser(&mut self) -> Result<(), SessionError> {
        let browser = self.launcher.launch(LaunchProfile::Stream).await?;
        debug!(family = %browser.family(), "Stream browser launched");
        self.resources.browser = Some(browser);
        Ok(())
    }

    async fn load_page(&mut self, plan: &StreamPlan) -> Result<(), SessionError> {
        let browser = self
            .resources
            .browser
            .as_mut()
            .ok_or(RenderError::Closed)?;

        browser.load(&plan.url, &self.policy).await?;

        if plan.capture_mode == CaptureMode::Window {
            let marker = title_marker();
            browser.set_title(&marker).await?;
            let window_title = browser.family().window_title(&marker);
            debug!(window_title = %window_title, "Stream window marked");
            self.resources.window_title = Some(window_title);
        }

        Ok(())
    }

    async fn spawn_encoder(&mut self, plan: &StreamPlan) -> Result<(), SessionError> {
        let target = match plan.capture_mode {
            CaptureMode::Desktop => CaptureTarget::Desktop,
            CaptureMode::Window => CaptureTarget::Window {
                title: self.resources.window_title.clone().unwrap_or_default(),
            },
        };
        let job = EncoderJob {
            target,
            ingest_url: plan.ingest_url.clone(),
        };

        let process = self.encoder.spawn(&job).await?;
        self.resources.encoder = Some(process);
        Ok(())
    }

    async fn confirm_encoder(&mut self) -> Result<(), SessionError> {
        tokio::time::sleep(self.encoder_grace).await;

        let Some(encoder) = self.resources.encoder.as_mut() else {
            return Err(EncoderError::ExitedEarly {
                exit: ExitInfo { code: None },
                log_tail: String::new(),
            }
            .into());
        };

        if let Some(exit) = encoder.try_exit()? {
            let log_tail = encoder.logs().tail(EXIT_LOG_TAIL).trim().to_string();
            return Err(EncoderError::ExitedEarly { exit, log_tail }.into());
        }

        debug!(pid = encoder.id(), "Encoder confirmed running");
        Ok(())
    }

    /// Tear down from the current phase backwards.
    #[instrument(name = "rollback_resources", skip(self))]
    pub async fn rollback(&mut self) {
        if let Some(mut phase) = self.current_phase {
            loop {
                info!("Rolling back phase: {}", phase.name());
                self.rollback_phase(phase).await;

                match phase.previous() {
                    Some(prev) => phase = prev,
                    None => break,
                }
            }
        }

        self.current_phase = None;
    }

    async fn rollback_phase(&mut self, phase: StartupPhase) {
        match phase {
            StartupPhase::ConfirmEncoder => {
                // Nothing to rollback
            }
            StartupPhase::SpawnEncoder => {
                if let Err(e) = self.stop_encoder(ROLLBACK_GRACE).await {
                    warn!("Encoder rollback failed: {}", e);
                }
            }
            StartupPhase::LoadPage => {
                self.resources.window_title = None;
            }
            StartupPhase::LaunchBrowser => self.close_browser().await,
        }
    }

    /// Stop the encoder, killing it after `grace`.
    #[instrument(name = "stop_encoder", skip(self))]
    pub async fn stop_encoder(&mut self, grace: Duration) -> Result<StopOutcome, EncoderError> {
        let Some(mut encoder) = self.resources.encoder.take() else {
            return Ok(StopOutcome::AlreadyExited);
        };

        let outcome = encoder.stop(grace).await?;
        info!(?outcome, "Encoder stopped");
        Ok(outcome)
    }

    /// Close the stream browser, ignoring errors.
    pub async fn close_browser(&mut self) {
        self.resources.window_title = None;
        if let Some(mut browser) = self.resources.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Ignoring browser close error: {}", e);
            }
        }
    }

    /// Drop the encoder handle after it has exited.
    pub fn release_encoder(&mut self) {
        self.resources.encoder = None;
    }

    /// Whether the encoder exited on its own.
    pub fn check_encoder(&mut self) -> Option<ExitInfo> {
        let encoder = self.resources.encoder.as_mut()?;
        match encoder.try_exit() {
            Ok(exit) => exit,
            Err(e) => {
                warn!("Could not poll encoder: {}", e);
                None
            }
        }
    }

    /// Output buffer of the running encoder.
    pub fn encoder_logs(&self) -> Option<LogBuffer> {
        self.resources.encoder.as_ref().map(|e| e.logs())
    }

    /// Mark the session as fully started. Nothing is rolled back after this.
    pub fn commit(&mut self) {
        self.current_phase = None;
    }

    /// Whether any process is held.
    pub fn is_empty(&self) -> bool {
        self.resources.browser.is_none() && self.resources.encoder.is_none()
    }

    /// Stop everything without waiting for a graceful exit.
    #[instrument(name = "shutdown_resources", skip(self))]
    pub async fn shutdown(&mut self) {
        info!("Shutting down all resources");
        if let Err(e) = self.stop_encoder(ROLLBACK_GRACE).await {
            warn!("Encoder shutdown failed: {}", e);
        }
        self.close_browser().await;
        self.current_phase = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitecast_encoder::testing::FakeEncoderBackend;
    use sitecast_render::testing::FakeLauncher;
    use sitecast_render::BrowserFamily;

    fn plan(mode: CaptureMode) -> StreamPlan {
        StreamPlan {
            url: "https://example.com".into(),
            capture_mode: mode,
            ingest_url: "rtmp://a.rtmp.youtube.com/live2/abcd".into(),
        }
    }

    fn manager(launcher: &FakeLauncher, encoder: &FakeEncoderBackend) -> ResourceManager {
        ResourceManager::new(
            Arc::new(launcher.clone()),
            Arc::new(encoder.clone()),
            LoadPolicy {
                timeout: Duration::from_secs(1),
                settle: Duration::ZERO,
            },
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_initialize_runs_phases_in_order() {
        let launcher = FakeLauncher::new(BrowserFamily::Chrome);
        let encoder = FakeEncoderBackend::new();
        let mut resources = manager(&launcher, &encoder);

        let mut phases = Vec::new();
        resources
            .initialize(&plan(CaptureMode::Desktop), |p| phases.push(p))
            .await
            .unwrap();

        assert_eq!(
            phases,
            vec![
                StartupPhase::LaunchBrowser,
                StartupPhase::LoadPage,
                StartupPhase::SpawnEncoder,
                StartupPhase::ConfirmEncoder,
            ]
        );
        assert_eq!(launcher.log().launches, vec![LaunchProfile::Stream]);
        assert!(encoder.log().spawned[0].contains(&"desktop".to_string()));
        assert!(!resources.is_empty());
        assert!(encoder.log().spawned[0].last().unwrap().ends_with("/abcd"));
    }

    #[tokio::test]
    async fn test_window_mode_marks_title() {
        let launcher = FakeLauncher::new(BrowserFamily::Chrome);
        let encoder = FakeEncoderBackend::new();
        let mut resources = manager(&launcher, &encoder);

        resources
            .initialize(&plan(CaptureMode::Window), |_| {})
            .await
            .unwrap();

        let marker = launcher.log().titles[0].clone();
        assert!(marker.starts_with("sitecast-"));
        let expected = format!("title={marker} - Google Chrome");
        assert!(encoder.log().spawned[0].contains(&expected));
    }

    #[tokio::test]
    async fn test_spawn_failure_rolls_back_browser() {
        let launcher = FakeLauncher::new(BrowserFamily::Chrome);
        let encoder = FakeEncoderBackend::new();
        encoder.set_behavior(|b| b.fail_spawn = true);
        let mut resources = manager(&launcher, &encoder);

        let err = resources
            .initialize(&plan(CaptureMode::Desktop), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Encoder(EncoderError::Spawn(_))));

        resources.rollback().await;
        assert!(resources.is_empty());
        assert_eq!(launcher.log().open_instances(), 0);
    }

    #[tokio::test]
    async fn test_early_exit_is_reported_with_logs() {
        let launcher = FakeLauncher::new(BrowserFamily::Firefox);
        let encoder = FakeEncoderBackend::new();
        encoder.set_behavior(|b| {
            b.exit = Some(ExitInfo { code: Some(1) });
            b.output = "rtmp://a.rtmp.youtube.com/live2: I/O error\n".into();
        });
        let mut resources = manager(&launcher, &encoder);

        let err = resources
            .initialize(&plan(CaptureMode::Desktop), |_| {})
            .await
            .unwrap_err();
        match err {
            SessionError::Encoder(EncoderError::ExitedEarly { exit, log_tail }) => {
                assert_eq!(exit.code, Some(1));
                assert!(log_tail.contains("I/O error"));
            }
            other => panic!("unexpected error: {other}"),
        }

        resources.rollback().await;
        assert!(resources.is_empty());
        assert_eq!(launcher.log().open_instances(), 0);
    }

    #[test]
    fn test_title_markers_are_unique() {
        assert_ne!(title_marker(), title_marker());
    }
}
