//! Engine wired to in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

pub use sitecast_encoder::testing::{FakeEncoderBackend, FakeEncoderBehavior, FakeEncoderLog};
pub use sitecast_render::testing::{FakeBehavior, FakeBrowserLog, FakeLauncher, FAKE_PNG};
use sitecast_render::{BrowserFamily, LoadPolicy};

use crate::config::EngineConfig;
use crate::engine::Engine;

/// Config with every wait shortened for tests.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        load: LoadPolicy {
            timeout: Duration::from_secs(1),
            settle: Duration::ZERO,
        },
        encoder_grace: Duration::ZERO,
        stop_grace: Duration::from_millis(100),
        watch_interval: Duration::from_millis(20),
        ..Default::default()
    }
}

/// An engine plus handles to the fakes behind it.
pub struct TestRig {
    pub engine: Engine,
    pub browser: FakeLauncher,
    pub encoder: FakeEncoderBackend,
}

impl TestRig {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let browser = FakeLauncher::new(BrowserFamily::Chrome);
        let encoder = FakeEncoderBackend::new();
        let engine = Engine::new(
            Arc::new(browser.clone()),
            Arc::new(encoder.clone()),
            config,
        );

        Self {
            engine,
            browser,
            encoder,
        }
    }
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}
