//! Browser instances driven over WebDriver.

use std::time::Duration;

use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use webdriver::command::{VoidWebDriverExtensionCommand, WebDriverCommand, WindowRectParameters};

use crate::browser::{
    capabilities, needs_window_move, BrowserFamily, LaunchProfile, OFF_SCREEN_POSITION,
    VIEWPORT_HEIGHT, VIEWPORT_WIDTH,
};
use crate::driver::{DriverConfig, DriverProcess};
use crate::error::RenderError;
use crate::screenshot::Screenshot;
use crate::{BrowserLauncher, LoadPolicy, RenderInstance, RenderResult};

/// Interval between `document.readyState` checks.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches one browser family through its WebDriver binary.
pub struct WebDriverLauncher {
    family: BrowserFamily,
    config: DriverConfig,
}

impl WebDriverLauncher {
    /// Create a launcher for `family`.
    pub fn new(family: BrowserFamily, config: DriverConfig) -> Self {
        Self { family, config }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    fn name(&self) -> &str {
        self.family.name()
    }

    #[instrument(name = "webdriver_launch", skip(self), fields(family = %self.family))]
    async fn launch(&self, profile: LaunchProfile) -> RenderResult<Box<dyn RenderInstance>> {
        let mut driver = DriverProcess::spawn(
            self.config.driver_path(self.family),
            self.family,
            self.config.startup_timeout,
        )
        .await?;

        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(
            self.family,
            profile,
            self.config.chrome_binary.as_deref(),
        ));

        let client = match builder.connect(&driver.url()).await {
            Ok(client) => client,
            Err(e) => {
                driver.shutdown().await;
                return Err(RenderError::SessionRefused {
                    family: self.family,
                    message: e.to_string(),
                });
            }
        };

        if needs_window_move(self.family, profile) {
            // A window left on-screen still captures, so this is not fatal
            if let Err(e) = move_off_screen(&client).await {
                warn!("Could not move stream window off-screen: {}", e);
            }
        }

        info!(port = driver.port(), "Browser launched");
        Ok(Box::new(WebDriverInstance {
            family: self.family,
            client: Some(client),
            driver: Some(driver),
        }))
    }
}

/// A WebDriver session together with the driver process that hosts it.
pub struct WebDriverInstance {
    family: BrowserFamily,
    client: Option<Client>,
    driver: Option<DriverProcess>,
}

impl WebDriverInstance {
    fn client(&self) -> RenderResult<&Client> {
        self.client.as_ref().ok_or(RenderError::Closed)
    }
}

#[async_trait]
impl RenderInstance for WebDriverInstance {
    fn family(&self) -> BrowserFamily {
        self.family
    }

    #[instrument(name = "page_load", skip(self, policy), fields(family = %self.family))]
    async fn load(&mut self, url: &str, policy: &LoadPolicy) -> RenderResult<()> {
        let client = self.client()?;

        let ready = async {
            client.goto(url).await?;
            wait_document_ready(client).await
        };

        match tokio::time::timeout(policy.timeout, ready).await {
            Ok(result) => result?,
            Err(_) => return Err(RenderError::Timeout(policy.timeout)),
        }

        debug!("Page ready, settling for {:?}", policy.settle);
        if !policy.settle.is_zero() {
            tokio::time::sleep(policy.settle).await;
        }

        Ok(())
    }

    async fn set_title(&mut self, title: &str) -> RenderResult<()> {
        self.client()?
            .execute("document.title = arguments[0];", vec![json!(title)])
            .await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> RenderResult<Screenshot> {
        let png = self.client()?.screenshot().await?;
        Ok(Screenshot::from_png(png))
    }

    async fn title(&mut self) -> RenderResult<String> {
        Ok(self.client()?.title().await?)
    }

    #[instrument(name = "browser_close", skip(self), fields(family = %self.family))]
    async fn close(&mut self) -> RenderResult<()> {
        let result = match self.client.take() {
            Some(client) => client.close().await.map_err(RenderError::from),
            None => Ok(()),
        };

        if let Some(mut driver) = self.driver.take() {
            driver.shutdown().await;
        }

        result
    }
}

/// Place the current window outside the visible area.
///
/// The typed setter on `Client` only takes unsigned coordinates.
async fn move_off_screen(client: &Client) -> RenderResult<()> {
    let (x, y) = OFF_SCREEN_POSITION;
    let rect = WindowRectParameters {
        x: Some(x),
        y: Some(y),
        width: Some(VIEWPORT_WIDTH as i32),
        height: Some(VIEWPORT_HEIGHT as i32),
    };

    client
        .issue_cmd(WebDriverCommand::<VoidWebDriverExtensionCommand>::SetWindowRect(rect))
        .await?;
    debug!(x, y, "Stream window moved off-screen");
    Ok(())
}

async fn wait_document_ready(client: &Client) -> RenderResult<()> {
    loop {
        let state = client
            .execute("return document.readyState;", Vec::new())
            .await?;
        if state.as_str() == Some("complete") {
            return Ok(());
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}
