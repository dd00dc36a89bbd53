//! Session state machine types.

use serde::{Deserialize, Serialize};

use crate::types::CaptureMode;

/// The current state of the streaming session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    /// Nothing is streaming.
    #[default]
    Idle,

    /// A stream is being set up.
    Starting {
        /// Current startup phase.
        phase: StartupPhase,
    },

    /// The encoder is running and pushing to the ingest.
    Live {
        /// Page being streamed.
        url: String,

        /// What the encoder captures.
        capture_mode: CaptureMode,

        /// Start time in seconds since the Unix epoch.
        started_at: u64,
    },

    /// The session is being torn down.
    Stopping {
        /// Reason for stopping.
        reason: StopReason,

        /// Current shutdown phase.
        phase: ShutdownPhase,
    },

    /// The last session failed to start or died while live.
    Error {
        /// Error message.
        message: String,

        /// Whether a new start may be attempted.
        recoverable: bool,
    },
}

impl SessionState {
    /// Returns true if no session is running.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if the session is live.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    /// Returns true if the session is starting.
    pub fn is_starting(&self) -> bool {
        matches!(self, Self::Starting { .. })
    }

    /// Returns true if the session is stopping.
    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping { .. })
    }

    /// Returns true if the last session ended in an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns true while processes may exist (starting, live or stopping).
    pub fn is_active(&self) -> bool {
        self.is_starting() || self.is_live() || self.is_stopping()
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Starting { .. } => "Starting",
            Self::Live { .. } => "Live",
            Self::Stopping { .. } => "Stopping",
            Self::Error { .. } => "Error",
        }
    }
}

/// Startup phases for a session, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupPhase {
    /// Launching the dedicated stream browser.
    LaunchBrowser,

    /// Loading the page and waiting for it to settle.
    LoadPage,

    /// Spawning the encoder subprocess.
    SpawnEncoder,

    /// Checking the encoder survived its first moments.
    ConfirmEncoder,
}

impl StartupPhase {
    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::LaunchBrowser => Some(Self::LoadPage),
            Self::LoadPage => Some(Self::SpawnEncoder),
            Self::SpawnEncoder => Some(Self::ConfirmEncoder),
            Self::ConfirmEncoder => None,
        }
    }

    /// Returns the previous phase, if any (for rollback).
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::LaunchBrowser => None,
            Self::LoadPage => Some(Self::LaunchBrowser),
            Self::SpawnEncoder => Some(Self::LoadPage),
            Self::ConfirmEncoder => Some(Self::SpawnEncoder),
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::LaunchBrowser => "Launching browser",
            Self::LoadPage => "Loading page",
            Self::SpawnEncoder => "Starting encoder",
            Self::ConfirmEncoder => "Confirming encoder",
        }
    }
}

/// Shutdown phases for a session, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownPhase {
    /// Stopping the encoder subprocess.
    StopEncoder,

    /// Closing the stream browser.
    CloseBrowser,
}

impl ShutdownPhase {
    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::StopEncoder => Some(Self::CloseBrowser),
            Self::CloseBrowser => None,
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::StopEncoder => "Stopping encoder",
            Self::CloseBrowser => "Closing browser",
        }
    }
}

/// Reason for stopping the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    /// User requested stop.
    UserRequested,

    /// The encoder exited on its own.
    EncoderExited { code: Option<i32> },

    /// The server is shutting down.
    Shutdown,
}

impl StopReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::UserRequested => "Stream stopped by user".to_string(),
            Self::EncoderExited { code: Some(code) } => {
                format!("Encoder exited unexpectedly with code {code}")
            }
            Self::EncoderExited { code: None } => {
                "Encoder exited unexpectedly (terminated by signal)".to_string()
            }
            Self::Shutdown => "Server shutting down".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_phases_walk_forward_and_back() {
        let mut phase = StartupPhase::LaunchBrowser;
        let mut forward = vec![phase];
        while let Some(next) = phase.next() {
            forward.push(next);
            phase = next;
        }
        assert_eq!(forward.len(), 4);
        assert_eq!(phase, StartupPhase::ConfirmEncoder);

        let mut backward = vec![phase];
        while let Some(prev) = phase.previous() {
            backward.push(prev);
            phase = prev;
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_shutdown_phase_order() {
        assert_eq!(
            ShutdownPhase::StopEncoder.next(),
            Some(ShutdownPhase::CloseBrowser)
        );
        assert_eq!(ShutdownPhase::CloseBrowser.next(), None);
    }

    #[test]
    fn test_active_states() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Starting {
            phase: StartupPhase::LoadPage
        }
        .is_active());
        assert!(SessionState::Stopping {
            reason: StopReason::UserRequested,
            phase: ShutdownPhase::StopEncoder,
        }
        .is_active());
        assert!(!SessionState::Error {
            message: "boom".into(),
            recoverable: true,
        }
        .is_active());
    }

    #[test]
    fn test_stop_reason_messages() {
        assert_eq!(
            StopReason::EncoderExited { code: Some(1) }.message(),
            "Encoder exited unexpectedly with code 1"
        );
        assert!(StopReason::EncoderExited { code: None }
            .message()
            .contains("signal"));
    }
}
