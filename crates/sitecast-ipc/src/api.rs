//! Request and response bodies of the control panel endpoints.

use serde::{Deserialize, Serialize};

use crate::types::{CaptureMode, ErrorKind};

/// Body of `POST /preview`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewRequest {
    /// Page to render; a missing scheme defaults to `https://`.
    #[serde(default)]
    pub url: String,
}

/// Body of `POST /start_stream`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartStreamRequest {
    /// Stream key appended to the ingest URL.
    #[serde(default)]
    pub stream_key: String,

    /// What to capture.
    #[serde(default)]
    pub capture_mode: CaptureMode,
}

/// Successful preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub success: bool,

    /// Screenshot as a `data:image/png;base64,...` URI.
    pub screenshot: String,

    /// Normalized URL that was rendered.
    pub url: String,
}

impl PreviewResponse {
    pub fn new(screenshot: String, url: String) -> Self {
        Self {
            success: true,
            screenshot,
            url,
        }
    }
}

/// Successful action with a human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Failed action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            success: false,
            error: error.into(),
            kind,
        }
    }
}

/// Body of `GET /logs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: String,
}
