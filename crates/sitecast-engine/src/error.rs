//! Error types for the engine.

use sitecast_encoder::EncoderError;
use sitecast_ipc::ErrorKind;
use sitecast_render::RenderError;
use thiserror::Error;

/// A request was rejected before anything was spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// No preview has succeeded yet.
    #[error("No URL loaded. Preview a website first.")]
    NoPreviewUrl,

    /// The stream key is empty.
    #[error("Missing stream key")]
    MissingStreamKey,

    /// A session is already starting, live or stopping.
    #[error("Stream already active")]
    AlreadyActive,

    /// Nothing is live.
    #[error("No active stream")]
    NotActive,

    /// The request body could not be understood.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// The encoder probe failed.
    #[error("FFmpeg not found. Please install FFmpeg first.")]
    EncoderUnavailable,

    /// The capture mode cannot be used on this host.
    #[error("{mode} capture is not supported on {platform}")]
    UnsupportedCapture {
        mode: &'static str,
        platform: String,
    },

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    /// The supervisor task has exited.
    #[error("Stream supervisor is not running")]
    SupervisorGone,
}

impl SessionError {
    /// Classify this error for the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Precondition(_) => ErrorKind::Precondition,
            Self::EncoderUnavailable | Self::UnsupportedCapture { .. } => ErrorKind::Capability,
            Self::Render(e) => e.kind(),
            Self::Encoder(e) => e.kind(),
            Self::SupervisorGone => ErrorKind::Internal,
        }
    }

    /// Whether this error reports a conflict with the session state.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Precondition(PreconditionError::AlreadyActive | PreconditionError::NotActive)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_source() {
        assert_eq!(
            SessionError::from(PreconditionError::NoPreviewUrl).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(SessionError::EncoderUnavailable.kind(), ErrorKind::Capability);
        assert_eq!(
            SessionError::from(RenderError::MissingUrl).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(
            SessionError::from(EncoderError::InvalidIngest("x".into())).kind(),
            ErrorKind::Precondition
        );
        assert_eq!(SessionError::SupervisorGone.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_conflicts() {
        assert!(SessionError::from(PreconditionError::AlreadyActive).is_conflict());
        assert!(SessionError::from(PreconditionError::NotActive).is_conflict());
        assert!(!SessionError::from(PreconditionError::MissingStreamKey).is_conflict());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            SessionError::from(PreconditionError::AlreadyActive).to_string(),
            "Stream already active"
        );
        assert_eq!(
            SessionError::UnsupportedCapture {
                mode: "window",
                platform: "Linux".into()
            }
            .to_string(),
            "window capture is not supported on Linux"
        );
    }
}
