//! The stream supervisor task.

use std::sync::Arc;
use std::time::Duration;

use sitecast_encoder::{EncoderBackend, IngestEndpoint, StopOutcome};
use sitecast_ipc::{
    platform_name, CaptureMode, SessionState, ShutdownPhase, StartupPhase, StopReason,
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::command::SessionCommand;
use crate::error::{PreconditionError, SessionError};
use crate::snapshot::{unix_now, SharedSnapshot};
use crate::state::{ResourceManager, StreamPlan};

/// Owns the stream resources and serializes every start and stop.
pub(crate) struct Supervisor {
    commands: mpsc::Receiver<SessionCommand>,
    snapshot: SharedSnapshot,
    resources: ResourceManager,
    encoder: Arc<dyn EncoderBackend>,
    ingest: IngestEndpoint,
    stop_grace: Duration,
    watch_interval: Duration,
}

impl Supervisor {
    pub(crate) fn new(
        commands: mpsc::Receiver<SessionCommand>,
        snapshot: SharedSnapshot,
        resources: ResourceManager,
        encoder: Arc<dyn EncoderBackend>,
        ingest: IngestEndpoint,
        stop_grace: Duration,
        watch_interval: Duration,
    ) -> Self {
        Self {
            commands,
            snapshot,
            resources,
            encoder,
            ingest,
            stop_grace,
            watch_interval,
        }
    }

    /// Process commands until shutdown or until every sender is gone.
    #[instrument(name = "supervisor_run", skip(self))]
    pub(crate) async fn run(mut self) {
        info!("Supervisor starting");

        let mut watch = tokio::time::interval(self.watch_interval);
        watch.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        self.shutdown().await;
                        break;
                    }
                },
                _ = watch.tick() => self.watch_encoder().await,
            }
        }

        info!("Supervisor stopped");
    }

    /// Handle a command. Returns false if the supervisor should exit.
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        debug!(command = command.name(), "Handling command");

        match command {
            SessionCommand::Start {
                stream_key,
                capture_mode,
                reply,
            } => {
                let result = self.start_stream(&stream_key, capture_mode).await;
                let _ = reply.send(result);
            }
            SessionCommand::Stop { reply } => {
                let result = self.stop_stream(StopReason::UserRequested).await;
                let _ = reply.send(result);
            }
            SessionCommand::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }

        true
    }

    /// Check every precondition, in order, before anything is spawned.
    async fn check_start(
        &self,
        stream_key: &str,
        capture_mode: CaptureMode,
    ) -> Result<StreamPlan, SessionError> {
        let snapshot = self.snapshot.get();

        if snapshot.state.is_active() {
            return Err(PreconditionError::AlreadyActive.into());
        }
        if !self.encoder.probe().await {
            return Err(SessionError::EncoderUnavailable);
        }
        if !self.encoder.supports(capture_mode) {
            return Err(SessionError::UnsupportedCapture {
                mode: capture_mode.as_str(),
                platform: platform_name(),
            });
        }
        let url = snapshot
            .current_url
            .ok_or(PreconditionError::NoPreviewUrl)?;
        let stream_key = stream_key.trim();
        if stream_key.is_empty() {
            return Err(PreconditionError::MissingStreamKey.into());
        }
        let ingest_url = self.ingest.url_for(stream_key)?;

        Ok(StreamPlan {
            url,
            capture_mode,
            ingest_url,
        })
    }

    #[instrument(name = "start_stream", skip(self, stream_key))]
    async fn start_stream(
        &mut self,
        stream_key: &str,
        capture_mode: CaptureMode,
    ) -> Result<(), SessionError> {
        let plan = match self.check_start(stream_key, capture_mode).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!("Start rejected: {}", e);
                return Err(e);
            }
        };

        info!(url = %plan.url, "Starting stream");

        let snapshot = self.snapshot.clone();
        let result = self
            .resources
            .initialize(&plan, |phase: StartupPhase| {
                snapshot.transition_to(SessionState::Starting { phase });
            })
            .await;

        match result {
            Ok(()) => {
                self.resources.commit();
                let logs = self.resources.encoder_logs();
                let key = stream_key.trim().to_string();
                self.snapshot.update(|s| {
                    s.stream_key = Some(key);
                    s.logs = logs;
                    s.last_error = None;
                });
                self.snapshot.transition_to(SessionState::Live {
                    url: plan.url,
                    capture_mode,
                    started_at: unix_now(),
                });

                info!("Stream started successfully");
                Ok(())
            }
            Err(e) => {
                error!("Stream start failed: {}", e);

                // Rollback any initialized resources
                self.resources.rollback().await;

                let message = e.to_string();
                self.snapshot.update(|s| {
                    s.stream_key = None;
                    s.logs = None;
                    s.last_error = Some(message.clone());
                });
                self.snapshot.transition_to(SessionState::Error {
                    message,
                    recoverable: true,
                });
                Err(e)
            }
        }
    }

    #[instrument(name = "stop_stream", skip(self))]
    async fn stop_stream(&mut self, reason: StopReason) -> Result<(), SessionError> {
        if !self.snapshot.state().is_live() {
            debug!("Nothing live, ignoring stop");
            return Err(PreconditionError::NotActive.into());
        }

        info!(?reason, "Stopping stream");

        // Every phase runs even if stopping the encoder failed
        let mut stopped = Ok(StopOutcome::AlreadyExited);
        let mut phase = ShutdownPhase::StopEncoder;
        loop {
            self.snapshot.transition_to(SessionState::Stopping {
                reason: reason.clone(),
                phase,
            });
            info!("Shutdown phase: {}", phase.name());

            match phase {
                ShutdownPhase::StopEncoder => {
                    stopped = self.resources.stop_encoder(self.stop_grace).await;
                }
                ShutdownPhase::CloseBrowser => self.resources.close_browser().await,
            }

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        self.snapshot.update(|s| {
            s.stream_key = None;
            s.logs = None;
        });
        self.snapshot.transition_to(SessionState::Idle);

        match stopped {
            Ok(_) => {
                info!("Stream stopped");
                Ok(())
            }
            Err(e) => {
                error!("Encoder did not stop cleanly: {}", e);
                Err(e.into())
            }
        }
    }

    /// Detect an encoder that exited while live.
    async fn watch_encoder(&mut self) {
        if !self.snapshot.state().is_live() {
            return;
        }
        let Some(exit) = self.resources.check_encoder() else {
            return;
        };

        let message = StopReason::EncoderExited { code: exit.code }.message();
        warn!(%exit, "Encoder exited while live");

        self.resources.release_encoder();
        self.resources.close_browser().await;

        // Logs stay attached so the failure can be inspected
        self.snapshot.update(|s| {
            s.stream_key = None;
            s.last_error = Some(message.clone());
        });
        self.snapshot.transition_to(SessionState::Error {
            message,
            recoverable: true,
        });
    }

    async fn shutdown(&mut self) {
        if self.snapshot.state().is_live() {
            if let Err(e) = self.stop_stream(StopReason::Shutdown).await {
                warn!("Stop during shutdown failed: {}", e);
            }
        }
        self.resources.shutdown().await;
    }
}
