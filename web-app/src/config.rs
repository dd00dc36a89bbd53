//! Environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use sitecast_encoder::{EncoderError, EncoderSettings, FfmpegBackend, GrabDevice, IngestEndpoint};
use sitecast_engine::EngineConfig;
use sitecast_render::{DriverConfig, LoadPolicy, DEFAULT_PAGE_TIMEOUT, DEFAULT_SETTLE_DELAY};
use thiserror::Error;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:5000";

/// Errors in the environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable holds a value that cannot be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    /// The ingest base URL was rejected.
    #[error(transparent)]
    Ingest(#[from] EncoderError),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP server binds to.
    pub addr: SocketAddr,

    /// ffmpeg executable.
    pub ffmpeg_path: PathBuf,

    /// X display grabbed on non-Windows hosts.
    pub display: String,

    /// WebDriver binaries.
    pub drivers: DriverConfig,

    /// Engine timeouts and ingest.
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let addr_raw = get("SITECAST_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "SITECAST_ADDR",
            value: addr_raw.clone(),
        })?;

        let mut drivers = DriverConfig::default();
        if let Some(path) = get("CHROMEDRIVER_PATH") {
            drivers.chromedriver = PathBuf::from(path);
        }
        if let Some(path) = get("GECKODRIVER_PATH") {
            drivers.geckodriver = PathBuf::from(path);
        }
        drivers.chrome_binary = get("CHROME_BINARY").map(PathBuf::from);

        let ingest = match get("SITECAST_INGEST_URL") {
            Some(base) => IngestEndpoint::new(base)?,
            None => IngestEndpoint::default(),
        };

        let load = LoadPolicy {
            timeout: secs(
                "SITECAST_PAGE_TIMEOUT_SECS",
                get("SITECAST_PAGE_TIMEOUT_SECS"),
                DEFAULT_PAGE_TIMEOUT,
                1,
            )?,
            settle: secs(
                "SITECAST_SETTLE_SECS",
                get("SITECAST_SETTLE_SECS"),
                DEFAULT_SETTLE_DELAY,
                0,
            )?,
        };

        Ok(Self {
            addr,
            ffmpeg_path: get("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            display: get("SITECAST_DISPLAY")
                .or_else(|| get("DISPLAY"))
                .unwrap_or_else(|| ":0.0".to_string()),
            drivers,
            engine: EngineConfig {
                load,
                ingest,
                ..Default::default()
            },
        })
    }

    /// ffmpeg backend for this host.
    pub fn encoder_backend(&self) -> FfmpegBackend {
        let settings = EncoderSettings {
            grab: GrabDevice::native(self.display.clone()),
            ..Default::default()
        };
        FfmpegBackend::new(self.ffmpeg_path.clone(), settings)
    }
}

/// Parse whole seconds no smaller than `min`.
fn secs(
    name: &'static str,
    value: Option<String>,
    default: Duration,
    min: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n >= min => Ok(Duration::from_secs(n)),
        _ => Err(ConfigError::Invalid { name, value: raw }),
    }
}
