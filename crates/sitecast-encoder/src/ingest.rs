//! RTMP ingest endpoint.

use url::Url;

use crate::error::EncoderError;
use crate::EncoderResult;

/// YouTube Live primary ingest.
pub const DEFAULT_INGEST_URL: &str = "rtmp://a.rtmp.youtube.com/live2";

/// Base ingest URL that the stream key is appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestEndpoint {
    base: String,
}

impl IngestEndpoint {
    /// Validate and wrap an `rtmp://` or `rtmps://` base URL.
    pub fn new(base: impl Into<String>) -> EncoderResult<Self> {
        let base = base.into();
        let parsed =
            Url::parse(&base).map_err(|e| EncoderError::InvalidIngest(format!("{base}: {e}")))?;

        if !matches!(parsed.scheme(), "rtmp" | "rtmps") {
            return Err(EncoderError::InvalidIngest(format!(
                "{base}: scheme must be rtmp or rtmps"
            )));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(EncoderError::InvalidIngest(format!("{base}: missing host")));
        }

        Ok(Self { base })
    }

    /// Base URL without the key.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Full publish URL for `stream_key`.
    pub fn url_for(&self, stream_key: &str) -> EncoderResult<String> {
        let key = stream_key.trim();
        if key.is_empty() {
            return Err(EncoderError::InvalidIngest("stream key is empty".into()));
        }
        if key
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#'))
        {
            return Err(EncoderError::InvalidIngest(
                "stream key contains reserved characters".into(),
            ));
        }

        let url = if self.base.ends_with('/') {
            format!("{}{}", self.base, key)
        } else {
            format!("{}/{}", self.base, key)
        };
        Ok(url)
    }
}

impl Default for IngestEndpoint {
    fn default() -> Self {
        Self {
            base: DEFAULT_INGEST_URL.to_string(),
        }
    }
}
