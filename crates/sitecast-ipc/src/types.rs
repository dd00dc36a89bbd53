//! Common types used across HTTP payloads.

use serde::{Deserialize, Serialize};

/// What the encoder captures while streaming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// The whole desktop.
    #[default]
    Desktop,

    /// Only the stream browser's window, found by title.
    Window,
}

impl CaptureMode {
    /// Returns the wire name of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Window => "window",
        }
    }
}

/// Classification of a failure, reported alongside the error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required external binary or OS facility is missing.
    Capability,

    /// A browser could not be launched.
    Launch,

    /// A browser command failed while driving a page.
    Navigation,

    /// A page never became ready in time.
    RenderTimeout,

    /// The encoder failed to start, exited early or could not be stopped.
    Subprocess,

    /// The request was rejected before anything was spawned.
    Precondition,

    /// Something inside the server broke.
    Internal,
}

/// Snapshot returned by the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// True while a session is starting, live or stopping.
    pub streaming: bool,

    /// URL of the last successful preview (empty if none).
    pub current_url: String,

    /// Whether a stream key is held by the active session.
    pub has_stream_key: bool,

    /// Whether the encoder binary answered the capability probe.
    pub ffmpeg_available: bool,

    /// Host OS family (`Windows`, `Linux`, `Darwin`, ...).
    pub platform: String,

    /// Session state name.
    pub state: String,

    /// Capture mode of the live session.
    pub capture_mode: Option<CaptureMode>,

    /// Seconds since the live session started.
    pub uptime_seconds: Option<u64>,

    /// Message of the last session failure, if any.
    pub last_error: Option<String>,
}

/// Returns the host OS family name.
pub fn platform_name() -> String {
    match std::env::consts::OS {
        "windows" => "Windows".to_string(),
        "linux" => "Linux".to_string(),
        "macos" => "Darwin".to_string(),
        other => other.to_string(),
    }
}
