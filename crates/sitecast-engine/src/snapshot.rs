//! Observable session state shared with readers.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use sitecast_encoder::LogBuffer;
use sitecast_ipc::{CaptureMode, SessionState, LOG_TAIL_BYTES};
use tracing::debug;

/// Placeholder returned when no encoder is attached.
pub const LOGS_NOT_RUNNING: &str = "Encoder not running";

/// Placeholder returned before the encoder has written anything.
pub const LOGS_WAITING: &str = "Waiting for encoder output...";

/// Process-wide view of the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Current state machine state.
    pub state: SessionState,

    /// Last successfully previewed URL.
    pub current_url: Option<String>,

    /// Key of the active session.
    pub stream_key: Option<String>,

    /// Message of the last session failure.
    pub last_error: Option<String>,

    /// Output of the current or last crashed encoder.
    pub logs: Option<LogBuffer>,
}

impl SessionSnapshot {
    /// Capture mode of the live session.
    pub fn capture_mode(&self) -> Option<CaptureMode> {
        match self.state {
            SessionState::Live { capture_mode, .. } => Some(capture_mode),
            _ => None,
        }
    }

    /// Seconds the live session has been running.
    pub fn uptime_seconds(&self) -> Option<u64> {
        match self.state {
            SessionState::Live { started_at, .. } => Some(unix_now().saturating_sub(started_at)),
            _ => None,
        }
    }

    /// Tail of the encoder output, or a placeholder.
    pub fn log_tail(&self) -> String {
        match &self.logs {
            None => LOGS_NOT_RUNNING.to_string(),
            Some(logs) if logs.is_empty() => LOGS_WAITING.to_string(),
            Some(logs) => logs.tail(LOG_TAIL_BYTES),
        }
    }
}

/// Snapshot shared between the supervisor and readers.
#[derive(Debug, Clone, Default)]
pub struct SharedSnapshot {
    inner: Arc<RwLock<SessionSnapshot>>,
}

impl SharedSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current snapshot.
    pub fn get(&self) -> SessionSnapshot {
        self.inner.read().clone()
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner.read().state.clone()
    }

    /// Apply `update` under the write lock.
    pub fn update<R>(&self, update: impl FnOnce(&mut SessionSnapshot) -> R) -> R {
        update(&mut *self.inner.write())
    }

    /// Replace the state and log the transition.
    pub fn transition_to(&self, new_state: SessionState) {
        let previous = {
            let mut snapshot = self.inner.write();
            std::mem::replace(&mut snapshot.state, new_state.clone())
        };

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );
    }
}

/// Seconds since the Unix epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_placeholders() {
        let mut snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.log_tail(), LOGS_NOT_RUNNING);

        let logs = LogBuffer::default();
        snapshot.logs = Some(logs.clone());
        assert_eq!(snapshot.log_tail(), LOGS_WAITING);

        logs.push(b"frame=10");
        assert_eq!(snapshot.log_tail(), "frame=10");
    }

    #[test]
    fn test_live_fields() {
        let snapshot = SessionSnapshot {
            state: SessionState::Live {
                url: "https://example.com".into(),
                capture_mode: CaptureMode::Window,
                started_at: unix_now() - 5,
            },
            ..Default::default()
        };
        assert_eq!(snapshot.capture_mode(), Some(CaptureMode::Window));
        assert!(snapshot.uptime_seconds().unwrap() >= 5);

        assert_eq!(SessionSnapshot::default().uptime_seconds(), None);
    }

    #[test]
    fn test_transition_replaces_state() {
        let shared = SharedSnapshot::new();
        shared.transition_to(SessionState::Error {
            message: "boom".into(),
            recoverable: true,
        });
        assert!(shared.state().is_error());
        assert!(shared.get().current_url.is_none());
    }
}
