//! Error types for the encoder module.

use sitecast_ipc::ErrorKind;
use thiserror::Error;

use crate::ExitInfo;

/// Errors that can occur while running the encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Encoder binary not found.
    #[error("Encoder binary not found: {0}")]
    NotInstalled(String),

    /// The grab device cannot capture this way.
    #[error("{mode} capture is not supported by {device}")]
    UnsupportedCapture {
        mode: &'static str,
        device: &'static str,
    },

    /// Ingest URL or stream key rejected.
    #[error("Invalid ingest URL: {0}")]
    InvalidIngest(String),

    /// Process could not be started.
    #[error("Failed to spawn encoder: {0}")]
    Spawn(#[source] std::io::Error),

    /// Process exited while it should be running.
    #[error("Encoder exited early ({exit}): {log_tail}")]
    ExitedEarly { exit: ExitInfo, log_tail: String },

    /// Process could not be stopped.
    #[error("Failed to stop encoder: {0}")]
    Stop(#[source] std::io::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncoderError {
    /// Classify this error for the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInstalled(_) | Self::UnsupportedCapture { .. } => ErrorKind::Capability,
            Self::InvalidIngest(_) => ErrorKind::Precondition,
            Self::Spawn(_) | Self::ExitedEarly { .. } | Self::Stop(_) | Self::Io(_) => {
                ErrorKind::Subprocess
            }
        }
    }
}
