//! Typed HTTP<->Engine messages for sitecast.
//!
//! This crate defines the payloads exchanged between the web control panel
//! and the streaming engine, plus the session state machine types shared by
//! both sides.

mod api;
mod state;
mod types;

pub use api::{
    ErrorResponse, LogsResponse, MessageResponse, PreviewRequest, PreviewResponse,
    StartStreamRequest,
};
pub use state::{SessionState, ShutdownPhase, StartupPhase, StopReason};
pub use types::{platform_name, CaptureMode, ErrorKind, StatusReport};

/// Maximum number of encoder log bytes returned by a single logs request.
pub const LOG_TAIL_BYTES: usize = 4096;
