//! Message attachments and lazy binary payloads.
//!
//! Attachments travel alongside the text tree, never inside it. Payload
//! bytes are materialized only on an adapter's send path — renderers and
//! the splitter work purely with metadata.

use thiserror::Error;
use url::Url;

/// Errors materializing attachment bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote fetch failed.
    #[error("attachment fetch failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Lazy byte producer for a binary payload.
#[derive(Debug, Clone)]
pub enum DataHandle {
    /// Remote payload fetched on demand.
    Url(Url),
    /// In-memory payload.
    Bytes(Vec<u8>),
}

impl DataHandle {
    /// Materialize the payload bytes.
    pub async fn fetch(&self, client: &reqwest::Client) -> Result<Vec<u8>, FetchError> {
        match self {
            Self::Url(url) => {
                let resp = client.get(url.clone()).send().await?.error_for_status()?;
                Ok(resp.bytes().await?.to_vec())
            }
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// A remote-fetchable binary with declared metadata.
#[derive(Debug, Clone)]
pub struct FileData {
    /// File name as shown to recipients.
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Declared MIME type (may be empty when the platform omits it).
    pub mime: String,
    /// Lazy payload handle.
    pub data: DataHandle,
}

/// Canonical attachment variants.
#[derive(Debug, Clone)]
pub enum Attachment {
    /// Generic binary file.
    File(FileData),
    /// Image file.
    Image(FileData),
    /// Geographic location.
    Location {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },
    /// Opaque platform-specific payload passed through untouched.
    PlatformSpecific(serde_json::Value),
}

impl Attachment {
    /// The file payload, for the two binary variants.
    pub fn as_file(&self) -> Option<&FileData> {
        match self {
            Self::File(data) | Self::Image(data) => Some(data),
            Self::Location { .. } | Self::PlatformSpecific(_) => None,
        }
    }
}

/// Guess a MIME type from a file name extension. Returns an empty string
/// for unknown extensions, matching what platforms report in that case.
pub fn mime_from_name(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "",
    }
}
