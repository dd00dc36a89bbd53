//! Preview screenshots from a shared, lazily launched browser.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::browser::LaunchProfile;
use crate::error::RenderError;
use crate::screenshot::Screenshot;
use crate::{BrowserLauncher, LoadPolicy, RenderInstance, RenderResult};

/// Normalize a user-supplied URL.
///
/// Whitespace is trimmed and `https://` is prepended when the input carries
/// neither `http://` nor `https://`. The result must parse as an absolute URL
/// with a host.
pub fn normalize_url(raw: &str) -> RenderResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RenderError::MissingUrl);
    }

    let lower = trimmed.to_ascii_lowercase();
    let normalized = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed =
        Url::parse(&normalized).map_err(|e| RenderError::InvalidUrl(format!("{normalized}: {e}")))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(RenderError::InvalidUrl(format!("{normalized}: missing host")));
    }

    Ok(normalized)
}

/// Renders preview screenshots using one shared browser instance.
///
/// The instance is launched on first use and kept for later previews. A
/// failed preview discards it so the next call starts fresh.
pub struct PreviewRenderer {
    launcher: Arc<dyn BrowserLauncher>,
    policy: LoadPolicy,
    instance: Mutex<Option<Box<dyn RenderInstance>>>,
}

impl PreviewRenderer {
    /// Create a renderer. No browser is launched until the first preview.
    pub fn new(launcher: Arc<dyn BrowserLauncher>, policy: LoadPolicy) -> Self {
        Self {
            launcher,
            policy,
            instance: Mutex::new(None),
        }
    }

    /// Load `url` (already normalized) and capture the viewport.
    #[instrument(name = "render_preview", skip(self))]
    pub async fn render(&self, url: &str) -> RenderResult<Screenshot> {
        let mut slot = self.instance.lock().await;

        if slot.is_none() {
            info!("Launching preview browser");
            let instance = self.launcher.launch(LaunchProfile::Preview).await?;
            *slot = Some(instance);
        }

        let Some(instance) = slot.as_mut() else {
            return Err(RenderError::Closed);
        };
        let result = capture(instance.as_mut(), url, &self.policy).await;

        if let Err(ref e) = result {
            warn!("Preview failed, discarding browser: {}", e);
            if let Some(mut instance) = slot.take() {
                if let Err(e) = instance.close().await {
                    debug!("Ignoring close error: {}", e);
                }
            }
        }

        result
    }

    /// Whether a preview browser is currently running.
    pub async fn is_open(&self) -> bool {
        self.instance.lock().await.is_some()
    }

    /// Close the preview browser, if any.
    pub async fn close(&self) {
        if let Some(mut instance) = self.instance.lock().await.take() {
            info!("Closing preview browser");
            if let Err(e) = instance.close().await {
                debug!("Ignoring close error: {}", e);
            }
        }
    }
}

async fn capture(
    instance: &mut dyn RenderInstance,
    url: &str,
    policy: &LoadPolicy,
) -> RenderResult<Screenshot> {
    instance.load(url, policy).await?;
    instance.screenshot().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserFamily;
    use crate::testing::FakeLauncher;

    #[test]
    fn test_normalize_prepends_https_once() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com");
        assert_eq!(
            normalize_url("https://example.com").unwrap(),
            "https://example.com"
        );
        assert_eq!(
            normalize_url("http://example.com/a?b=1").unwrap(),
            "http://example.com/a?b=1"
        );
        assert_eq!(
            normalize_url("  HTTPS://Example.com  ").unwrap(),
            "HTTPS://Example.com"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in ["example.com", "sub.example.com/path", "localhost:8080"] {
            let once = normalize_url(raw).unwrap();
            assert_eq!(normalize_url(&once).unwrap(), once);
            assert_eq!(once.matches("https://").count(), 1);
        }
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(normalize_url("   "), Err(RenderError::MissingUrl)));
        assert!(matches!(
            normalize_url("http://"),
            Err(RenderError::InvalidUrl(_))
        ));
        assert!(matches!(
            normalize_url("exa mple.com"),
            Err(RenderError::InvalidUrl(_))
        ));
    }

    fn renderer(launcher: &FakeLauncher) -> PreviewRenderer {
        let policy = LoadPolicy {
            timeout: std::time::Duration::from_secs(1),
            settle: std::time::Duration::ZERO,
        };
        PreviewRenderer::new(Arc::new(launcher.clone()), policy)
    }

    #[tokio::test]
    async fn test_preview_reuses_browser() {
        let launcher = FakeLauncher::new(BrowserFamily::Chrome);
        let renderer = renderer(&launcher);

        let first = renderer.render("https://example.com").await.unwrap();
        let second = renderer.render("https://example.org").await.unwrap();

        assert!(!first.is_empty());
        assert!(!second.is_empty());
        let log = launcher.log();
        assert_eq!(log.launches, vec![LaunchProfile::Preview]);
        assert_eq!(log.loaded, vec!["https://example.com", "https://example.org"]);
        assert!(renderer.is_open().await);
    }

    #[tokio::test]
    async fn test_failed_preview_discards_browser() {
        let launcher = FakeLauncher::new(BrowserFamily::Chrome);
        launcher.set_behavior(|b| b.time_out_load = true);
        let renderer = renderer(&launcher);

        let err = renderer.render("https://slow.example").await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout(_)));
        assert!(!renderer.is_open().await);
        assert_eq!(launcher.log().closed, 1);

        launcher.set_behavior(|b| b.time_out_load = false);
        renderer.render("https://example.com").await.unwrap();
        assert_eq!(launcher.log().launches.len(), 2);
    }

    #[tokio::test]
    async fn test_close_tears_down() {
        let launcher = FakeLauncher::new(BrowserFamily::Firefox);
        let renderer = renderer(&launcher);

        renderer.render("https://example.com").await.unwrap();
        renderer.close().await;
        renderer.close().await;

        assert!(!renderer.is_open().await);
        assert_eq!(launcher.log().open_instances(), 0);
    }
}
