//! Captured viewport images.

use base64::Engine;
use bytes::Bytes;

/// A PNG screenshot of a browser viewport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    png: Bytes,
}

impl Screenshot {
    /// Wrap raw PNG bytes.
    pub fn from_png(png: impl Into<Bytes>) -> Self {
        Self { png: png.into() }
    }

    /// Raw PNG bytes.
    pub fn png(&self) -> &Bytes {
        &self.png
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.png.len()
    }

    /// Whether the image is empty.
    pub fn is_empty(&self) -> bool {
        self.png.is_empty()
    }

    /// Base64 encoding of the PNG.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }

    /// Inline `data:` URI suitable for an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", self.to_base64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri() {
        let shot = Screenshot::from_png(vec![0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(shot.data_uri(), "data:image/png;base64,iVBORw==");
        assert_eq!(shot.len(), 4);
        assert!(!shot.is_empty());
    }
}
