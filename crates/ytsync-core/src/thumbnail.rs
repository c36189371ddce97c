//! Thumbnail download.
//!
//! Thumbnails are fetched from a URL template keyed by video identifier and
//! always stored as `<identifier>.jpg`, whatever the server sends.

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::error::{Error, FetchError, FileSystemError, Result};

/// Default thumbnail URL template; `{id}` is replaced by the identifier.
pub const DEFAULT_THUMBNAIL_URL_TEMPLATE: &str = "https://i.ytimg.com/vi/{id}/maxresdefault.jpg";

/// Default timeout for thumbnail fetch requests.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Expand a URL template for a video identifier.
#[must_use]
pub fn thumbnail_url(template: &str, identifier: &str) -> String {
    template.replace("{id}", identifier)
}

/// Scratch file name of a thumbnail.
#[must_use]
pub fn thumbnail_file_name(identifier: &str) -> String {
    format!("{identifier}.jpg")
}

/// Source of thumbnail images.
#[cfg_attr(test, mockall::automock)]
pub trait ThumbnailSource {
    /// Download `url` into `destination`.
    fn fetch_thumbnail(&self, url: &str, destination: &Path) -> Result<()>;
}

/// [`ThumbnailSource`] over blocking HTTP.
pub struct HttpThumbnailSource {
    client: Client,
}

impl HttpThumbnailSource {
    /// Create a source with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl ThumbnailSource for HttpThumbnailSource {
    fn fetch_thumbnail(&self, url: &str, destination: &Path) -> Result<()> {
        debug!("Fetching thumbnail from {}", url);

        let bad_response = |reason: String| {
            Error::from(FetchError::BadResponse {
                url: url.to_string(),
                reason,
            })
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| bad_response(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(bad_response(format!("server returned {status}")));
        }
        if !status.is_success() {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with("image/") {
            warn!("Unexpected content type for thumbnail: {}", content_type);
        }

        let data = response
            .bytes()
            .map_err(|e| bad_response(format!("failed to read body: {}", e.without_url())))?;

        if data.is_empty() {
            return Err(FetchError::EmptyThumbnail {
                url: url.to_string(),
            }
            .into());
        }

        fs::write(destination, &data).map_err(|e| FileSystemError::WriteFailed {
            path: destination.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(
            "Saved thumbnail to {} ({} bytes)",
            destination.display(),
            data.len()
        );
        Ok(())
    }
}
