//! WebDriver binary process management.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::browser::BrowserFamily;
use crate::error::RenderError;
use crate::RenderResult;

/// Interval between readiness checks of a starting driver.
const DRIVER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where the WebDriver binaries live and how long they may take to start.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// chromedriver executable.
    pub chromedriver: PathBuf,

    /// geckodriver executable.
    pub geckodriver: PathBuf,

    /// Explicit Chrome executable, if not on the default path.
    pub chrome_binary: Option<PathBuf>,

    /// Bound on the driver accepting connections.
    pub startup_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            chromedriver: PathBuf::from("chromedriver"),
            geckodriver: PathBuf::from("geckodriver"),
            chrome_binary: None,
            startup_timeout: Duration::from_secs(10),
        }
    }
}

impl DriverConfig {
    /// Driver executable for a browser family.
    pub fn driver_path(&self, family: BrowserFamily) -> &Path {
        match family {
            BrowserFamily::Chrome => &self.chromedriver,
            BrowserFamily::Firefox => &self.geckodriver,
        }
    }
}

/// A running WebDriver binary listening on a local port.
pub struct DriverProcess {
    child: Child,
    port: u16,
    path: String,
}

impl DriverProcess {
    /// Start the driver for `family` and wait until it accepts connections.
    #[instrument(name = "driver_spawn", skip(path), fields(path = %path.display()))]
    pub async fn spawn(
        path: &Path,
        family: BrowserFamily,
        startup_timeout: Duration,
    ) -> RenderResult<Self> {
        let display_path = path.display().to_string();
        let port = free_port().map_err(|source| RenderError::DriverSpawn {
            path: display_path.clone(),
            source,
        })?;

        let mut command = Command::new(path);
        match family {
            BrowserFamily::Chrome => {
                command.arg(format!("--port={port}"));
            }
            BrowserFamily::Firefox => {
                command.arg("--port").arg(port.to_string());
            }
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                RenderError::DriverNotFound {
                    path: display_path.clone(),
                }
            } else {
                RenderError::DriverSpawn {
                    path: display_path.clone(),
                    source,
                }
            }
        })?;

        let mut driver = Self {
            child,
            port,
            path: display_path,
        };
        driver.wait_ready(startup_timeout).await?;

        debug!(port, pid = ?driver.child.id(), "WebDriver ready");
        Ok(driver)
    }

    async fn wait_ready(&mut self, timeout: Duration) -> RenderResult<()> {
        let deadline = Instant::now() + timeout;

        loop {
            if TcpStream::connect(("127.0.0.1", self.port)).await.is_ok() {
                return Ok(());
            }

            match self.child.try_wait() {
                Ok(Some(status)) => {
                    return Err(RenderError::DriverSpawn {
                        path: self.path.clone(),
                        source: io::Error::other(format!("exited during startup ({status})")),
                    });
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(RenderError::DriverSpawn {
                        path: self.path.clone(),
                        source,
                    });
                }
            }

            if Instant::now() >= deadline {
                return Err(RenderError::DriverTimeout {
                    path: self.path.clone(),
                    timeout,
                });
            }

            tokio::time::sleep(DRIVER_POLL_INTERVAL).await;
        }
    }

    /// WebDriver endpoint URL.
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Port the driver listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Kill the driver and reap it.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.child.kill().await {
            warn!(path = %self.path, "Failed to kill WebDriver: {}", e);
        }
    }
}

/// Ask the OS for a currently unused local port.
fn free_port() -> io::Result<u16> {
    let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_paths_per_family() {
        let config = DriverConfig {
            chromedriver: PathBuf::from("/usr/bin/chromedriver"),
            ..Default::default()
        };
        assert_eq!(
            config.driver_path(BrowserFamily::Chrome),
            Path::new("/usr/bin/chromedriver")
        );
        assert_eq!(
            config.driver_path(BrowserFamily::Firefox),
            Path::new("geckodriver")
        );
    }

    #[test]
    fn test_free_port_is_nonzero() {
        assert_ne!(free_port().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_driver_binary() {
        let result = DriverProcess::spawn(
            Path::new("/nonexistent/sitecast-chromedriver"),
            BrowserFamily::Chrome,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(RenderError::DriverNotFound { .. })));
    }
}
