//! Stream supervisor and engine facade for sitecast.
//!
//! This crate ties the preview renderer, the stream browser and the encoder
//! together. A single supervisor task owns the stream resources and
//! processes start/stop commands one at a time; readers observe a shared
//! snapshot.

mod command;
mod config;
mod engine;
mod error;
mod orchestrator;
mod snapshot;
mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{EngineConfig, DIAGNOSTIC_URL};
pub use engine::{Engine, Preview};
pub use error::{PreconditionError, SessionError};
pub use snapshot::{SessionSnapshot, SharedSnapshot, LOGS_NOT_RUNNING, LOGS_WAITING};
pub use state::{ResourceManager, StreamPlan};

use std::sync::Arc;

use sitecast_encoder::FfmpegBackend;
use sitecast_render::{create_browser_launcher, BrowserLauncher, DriverConfig};

/// Create an engine driving real browsers and ffmpeg.
pub fn create_engine(drivers: DriverConfig, ffmpeg: FfmpegBackend, config: EngineConfig) -> Engine {
    let launcher: Arc<dyn BrowserLauncher> = Arc::from(create_browser_launcher(drivers));
    Engine::new(launcher, Arc::new(ffmpeg), config)
}
