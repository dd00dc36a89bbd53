//! Commands sent to the supervisor task.

use sitecast_ipc::CaptureMode;
use tokio::sync::oneshot;

use crate::error::SessionError;

/// Reply channel for a command.
pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Commands processed one at a time by the supervisor.
pub(crate) enum SessionCommand {
    /// Start streaming the current URL.
    Start {
        stream_key: String,
        capture_mode: CaptureMode,
        reply: Reply<()>,
    },

    /// Stop the live session.
    Stop { reply: Reply<()> },

    /// Stop anything active and exit.
    Shutdown { reply: oneshot::Sender<()> },
}

impl SessionCommand {
    /// Short name for logs. Never includes the stream key.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::Stop { .. } => "stop",
            Self::Shutdown { .. } => "shutdown",
        }
    }
}
