//! Engine tuning.

use std::time::Duration;

use sitecast_encoder::{IngestEndpoint, DEFAULT_STOP_GRACE};
use sitecast_render::LoadPolicy;

/// Page the browser self-test loads.
pub const DIAGNOSTIC_URL: &str = "https://www.google.com";

/// Timeouts and endpoints used by the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Page-load bound and settle delay for every browser.
    pub load: LoadPolicy,

    /// How long a fresh encoder must survive before the stream counts as live.
    pub encoder_grace: Duration,

    /// How long the encoder gets to quit before it is killed.
    pub stop_grace: Duration,

    /// How often a live encoder is checked for an unexpected exit.
    pub watch_interval: Duration,

    /// Where streams are pushed.
    pub ingest: IngestEndpoint,

    /// Page loaded by the browser self-test.
    pub diagnostic_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load: LoadPolicy::default(),
            encoder_grace: Duration::from_secs(2),
            stop_grace: DEFAULT_STOP_GRACE,
            watch_interval: Duration::from_secs(1),
            ingest: IngestEndpoint::default(),
            diagnostic_url: DIAGNOSTIC_URL.to_string(),
        }
    }
}
