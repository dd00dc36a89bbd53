//! Error types for the render module.

use std::time::Duration;

use sitecast_ipc::ErrorKind;
use thiserror::Error;

use crate::browser::BrowserFamily;

/// Errors that can occur while launching or driving a browser.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No URL was supplied.
    #[error("Missing URL")]
    MissingUrl,

    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// WebDriver binary not found.
    #[error("WebDriver binary not found: {path}")]
    DriverNotFound { path: String },

    /// WebDriver binary could not be started.
    #[error("Failed to start WebDriver {path}: {source}")]
    DriverSpawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// WebDriver never started accepting connections.
    #[error("WebDriver {path} did not become ready within {timeout:?}")]
    DriverTimeout { path: String, timeout: Duration },

    /// WebDriver refused to create a browser session.
    #[error("{family} session could not be created: {message}")]
    SessionRefused {
        family: BrowserFamily,
        message: String,
    },

    /// Every configured browser engine failed to launch.
    #[error("No browser engine could be launched: {}", .0.join("; "))]
    AllEnginesFailed(Vec<String>),

    /// A WebDriver command failed.
    #[error("Browser command failed: {0}")]
    Command(String),

    /// The page did not become ready in time.
    #[error("Page did not finish loading within {0:?}")]
    Timeout(Duration),

    /// The instance was already closed.
    #[error("Browser session already closed")]
    Closed,
}

impl RenderError {
    /// Classify this error for the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingUrl | Self::InvalidUrl(_) => ErrorKind::Precondition,
            Self::DriverNotFound { .. }
            | Self::DriverSpawn { .. }
            | Self::DriverTimeout { .. }
            | Self::SessionRefused { .. }
            | Self::AllEnginesFailed(_) => ErrorKind::Launch,
            Self::Command(_) | Self::Closed => ErrorKind::Navigation,
            Self::Timeout(_) => ErrorKind::RenderTimeout,
        }
    }
}

impl From<fantoccini::error::CmdError> for RenderError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        Self::Command(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RenderError::MissingUrl.kind(), ErrorKind::Precondition);
        assert_eq!(
            RenderError::AllEnginesFailed(vec![]).kind(),
            ErrorKind::Launch
        );
        assert_eq!(
            RenderError::Timeout(Duration::from_secs(30)).kind(),
            ErrorKind::RenderTimeout
        );
        assert_eq!(RenderError::Closed.kind(), ErrorKind::Navigation);
    }

    #[test]
    fn test_all_engines_failed_lists_attempts() {
        let err = RenderError::AllEnginesFailed(vec![
            "chrome: not found".into(),
            "firefox: refused".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "No browser engine could be launched: chrome: not found; firefox: refused"
        );
    }
}
