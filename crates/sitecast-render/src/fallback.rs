//! Ordered fallback across browser engines.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::browser::{BrowserFamily, LaunchProfile};
use crate::driver::DriverConfig;
use crate::error::RenderError;
use crate::webdriver::WebDriverLauncher;
use crate::{BrowserLauncher, RenderInstance, RenderResult};

/// Tries each launcher in order and returns the first instance that starts.
pub struct FallbackLauncher {
    launchers: Vec<Box<dyn BrowserLauncher>>,
}

impl FallbackLauncher {
    /// Create a fallback chain, most preferred first.
    pub fn new(launchers: Vec<Box<dyn BrowserLauncher>>) -> Self {
        Self { launchers }
    }
}

#[async_trait]
impl BrowserLauncher for FallbackLauncher {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn launch(&self, profile: LaunchProfile) -> RenderResult<Box<dyn RenderInstance>> {
        let mut failures = Vec::new();

        for launcher in &self.launchers {
            match launcher.launch(profile).await {
                Ok(instance) => {
                    if !failures.is_empty() {
                        info!(engine = launcher.name(), "Using fallback browser engine");
                    }
                    return Ok(instance);
                }
                Err(e) => {
                    warn!(engine = launcher.name(), "Browser launch failed: {}", e);
                    failures.push(format!("{}: {}", launcher.name(), e));
                }
            }
        }

        Err(RenderError::AllEnginesFailed(failures))
    }
}

/// Create the browser launcher, preferring Chrome with Firefox fallback.
pub fn create_browser_launcher(config: DriverConfig) -> Box<dyn BrowserLauncher> {
    Box::new(FallbackLauncher::new(vec![
        Box::new(WebDriverLauncher::new(BrowserFamily::Chrome, config.clone())),
        Box::new(WebDriverLauncher::new(BrowserFamily::Firefox, config)),
    ]))
}
