//! Local assets served in place of remote resources.

use std::path::Path;
use std::sync::Arc;

use image::ImageFormat;
use tracing::debug;

use crate::InterceptError;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw bytes plus the MIME type they are served with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockAsset {
    bytes: Arc<[u8]>,
    content_type: String,
}

impl MockAsset {
    /// Wrap bytes, sniffing the content type from their magic number.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        let content_type = sniff_content_type(&bytes)
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        Self {
            bytes: bytes.into(),
            content_type,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Read an asset from disk. The content type is sniffed from the bytes,
    /// falling back to the file extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, InterceptError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| InterceptError::Asset {
                path: path.display().to_string(),
                source: Arc::new(source),
            })?;
        let content_type = sniff_content_type(&bytes)
            .or_else(|| content_type_for_extension(path))
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();
        debug!(
            path = %path.display(),
            len = bytes.len(),
            %content_type,
            "mock asset loaded"
        );
        Ok(Self {
            bytes: bytes.into(),
            content_type,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().and_then(mime_for_format)
}

fn content_type_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    ImageFormat::from_extension(ext)
        .and_then(mime_for_format)
        .or(match ext.to_ascii_lowercase().as_str() {
            "svg" => Some("image/svg+xml"),
            _ => None,
        })
}

fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Ico => Some("image/x-icon"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Avif => Some("image/avif"),
        _ => None,
    }
}
