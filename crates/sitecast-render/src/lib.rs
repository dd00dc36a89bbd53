//! WebDriver-driven headless rendering.
//!
//! This crate launches Chrome (with a Firefox fallback) through their
//! WebDriver binaries, loads pages with bounded readiness detection and
//! captures viewport screenshots for the preview endpoint.

mod browser;
mod driver;
mod error;
mod fallback;
mod preview;
mod screenshot;
mod webdriver;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use browser::{
    capabilities, is_headless, BrowserFamily, LaunchProfile, VIEWPORT_HEIGHT, VIEWPORT_WIDTH,
};
pub use driver::DriverConfig;
pub use error::RenderError;
pub use fallback::{create_browser_launcher, FallbackLauncher};
pub use preview::{normalize_url, PreviewRenderer};
pub use screenshot::Screenshot;
pub use webdriver::{WebDriverInstance, WebDriverLauncher};

use std::time::Duration;

use async_trait::async_trait;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Default bound on navigation plus readiness detection.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait after the page reports ready, for late painting.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(3);

/// How long to wait for a page and how long to let it settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Upper bound on navigation and readiness polling.
    pub timeout: Duration,

    /// Fixed delay after the page is ready.
    pub settle: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PAGE_TIMEOUT,
            settle: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// A live browser instance.
#[async_trait]
pub trait RenderInstance: Send + Sync {
    /// Browser family backing this instance.
    fn family(&self) -> BrowserFamily;

    /// Navigate to `url` and wait until the page is ready, then settle.
    async fn load(&mut self, url: &str, policy: &LoadPolicy) -> RenderResult<()>;

    /// Replace the current page's title.
    async fn set_title(&mut self, title: &str) -> RenderResult<()>;

    /// Capture the viewport as PNG.
    async fn screenshot(&mut self) -> RenderResult<Screenshot>;

    /// Current page title.
    async fn title(&mut self) -> RenderResult<String>;

    /// Tear the instance down. Calling it twice is a no-op.
    async fn close(&mut self) -> RenderResult<()>;
}

/// Something that can start browser instances.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// Launch a new instance configured for `profile`.
    async fn launch(&self, profile: LaunchProfile) -> RenderResult<Box<dyn RenderInstance>>;
}
