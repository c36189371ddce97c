//! Error types for ytsync core operations.
//!
//! Errors are grouped by domain. Each domain has its own enum and the
//! top-level [`Error`] wraps them, so callers can either match on the
//! domain or just propagate with `?`.
//!
//! Only a narrow class of errors is considered transient (a remote server
//! returned a bad or truncated response). Those are retried by
//! [`crate::retry::RetryPolicy`]; everything else propagates immediately.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading the remote catalog (playlist API).
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The playlist lookup returned zero results.
    #[error("Playlist '{catalog_id}' not found. Check the id or whether it has public access")]
    NotFound {
        /// Playlist identifier that was requested.
        catalog_id: String,
    },

    /// The response body did not match the expected JSON shape.
    #[error("Failed to decode catalog response from {url}: {reason}")]
    Decode {
        /// Request URL (API key redacted).
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// The server returned a bad response (5xx, reset connection, truncated body).
    #[error("Bad response from {url}: {reason}")]
    BadResponse {
        /// Request URL (API key redacted).
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// The server rejected the request with a non-retryable status.
    #[error("Catalog request to {url} failed with status {status}")]
    Http {
        /// Request URL (API key redacted).
        url: String,
        /// HTTP status code.
        status: u16,
    },
}

/// Errors raised while fetching one item into the scratch workspace.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The identifier or URL could not be understood.
    #[error("Invalid video reference '{input}': {reason}")]
    InvalidReference {
        /// Raw input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The media backend could not resolve the video.
    #[error("Video {identifier} unavailable: {reason}")]
    VideoUnavailable {
        /// Video identifier.
        identifier: String,
        /// Backend message.
        reason: String,
    },

    /// The audio stream could not be downloaded.
    #[error("Audio download failed for {identifier}: {reason}")]
    AudioDownloadFailed {
        /// Video identifier.
        identifier: String,
        /// Backend message.
        reason: String,
    },

    /// A remote server returned a bad response.
    #[error("Bad response from {url}: {reason}")]
    BadResponse {
        /// Requested URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// A remote server rejected the request.
    #[error("Request to {url} failed with status {status}")]
    Http {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The thumbnail endpoint returned no data.
    #[error("Empty thumbnail returned from {url}")]
    EmptyThumbnail {
        /// Requested URL.
        url: String,
    },
}

/// Errors raised while converting, placing, or tagging an item.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The scratch payload disappeared before it could be placed.
    #[error("Fetched payload missing: {path}")]
    MissingPayload {
        /// Expected scratch path.
        path: PathBuf,
    },

    /// The destination directory cannot be created or written.
    #[error("Destination {path} is not writable: {reason}")]
    DestinationUnwritable {
        /// Destination directory.
        path: PathBuf,
        /// OS message.
        reason: String,
    },

    /// No usable transcoder was found.
    #[error("Transcoder unavailable: {0}")]
    TranscoderUnavailable(String),

    /// The transcoder ran but failed.
    #[error("Transcoding {source_path} failed: {reason}")]
    TranscodeFailed {
        /// Input file.
        source_path: PathBuf,
        /// Transcoder diagnostics.
        reason: String,
    },

    /// Tags could not be written to an already placed file.
    #[error("Failed to write tags to {path}: {reason}")]
    TagWriteFailed {
        /// Placed file.
        path: PathBuf,
        /// Tag library message.
        reason: String,
    },
}

/// Errors raised by the scratch workspace lifecycle.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The scratch tree could not be created.
    #[error("Failed to create scratch workspace at {path}: {reason}")]
    CreateFailed {
        /// Directory that could not be created.
        path: PathBuf,
        /// OS message.
        reason: String,
    },

    /// A stale or finished scratch tree could not be removed.
    #[error("Failed to clean scratch workspace at {path}: {reason}")]
    CleanupFailed {
        /// Scratch root.
        path: PathBuf,
        /// OS message.
        reason: String,
    },
}

/// File system errors outside the scratch workspace.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// A directory exists but cannot be listed.
    #[error("Directory {path} unavailable: {reason}")]
    DirectoryUnavailable {
        /// Directory path.
        path: PathBuf,
        /// OS message.
        reason: String,
    },

    /// A file could not be read.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// File path.
        path: PathBuf,
        /// OS message.
        reason: String,
    },

    /// A file could not be written.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// File path.
        path: PathBuf,
        /// OS message.
        reason: String,
    },

    /// A file could not be moved.
    #[error("Failed to move {source_path} to {destination}: {reason}")]
    MoveFailed {
        /// Source path.
        source_path: PathBuf,
        /// Destination path.
        destination: PathBuf,
        /// OS message.
        reason: String,
    },
}

/// Errors that can occur in ytsync core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote catalog error.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Per-item fetch error.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Per-item normalization error.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Scratch workspace error.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// File system error.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// The album's existing track numbers leave no room for the new items.
    #[error("Cannot number {count} new tracks after existing track {last}")]
    TrackNumbersExhausted {
        /// Highest track number already tagged in the album.
        last: u32,
        /// Items waiting for a number.
        count: usize,
    },

    /// Configuration error (missing credential, unreadable config file).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used for logging and exit handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal for the whole run.
    Precondition,
    /// Retryable network hiccup.
    Transient,
    /// Confined to one item.
    Item,
}

impl Error {
    /// Whether the error belongs to the retryable bad-response class.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Catalog(CatalogError::BadResponse { .. })
                | Self::Fetch(FetchError::BadResponse { .. })
        )
    }

    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        if self.is_transient() {
            return ErrorKind::Transient;
        }
        match self {
            Self::Fetch(_) | Self::Normalize(_) => ErrorKind::Item,
            _ => ErrorKind::Precondition,
        }
    }

    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_not_found_display() {
        let err = Error::from(CatalogError::NotFound {
            catalog_id: "PLmissing".to_string(),
        });
        assert!(err.to_string().contains("PLmissing"));
        assert!(err.to_string().contains("public access"));
    }

    #[test]
    fn test_bad_response_is_transient() {
        let catalog = Error::from(CatalogError::BadResponse {
            url: "https://example.com".to_string(),
            reason: "502".to_string(),
        });
        let fetch = Error::from(FetchError::BadResponse {
            url: "https://example.com".to_string(),
            reason: "connection reset".to_string(),
        });
        assert!(catalog.is_transient());
        assert!(fetch.is_transient());
        assert_eq!(fetch.kind(), ErrorKind::Transient);
    }

    #[test]
    fn test_http_error_is_not_transient() {
        let err = Error::from(FetchError::Http {
            url: "https://example.com".to_string(),
            status: 404,
        });
        assert!(!err.is_transient());
        assert_eq!(err.kind(), ErrorKind::Item);
    }

    #[test]
    fn test_precondition_kind() {
        assert_eq!(
            Error::configuration("missing key").kind(),
            ErrorKind::Precondition
        );
        let err = Error::from(WorkspaceError::CreateFailed {
            path: PathBuf::from("/tmp/x"),
            reason: "denied".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_track_numbers_exhausted_is_fatal() {
        let err = Error::TrackNumbersExhausted {
            last: u32::MAX,
            count: 2,
        };
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(err.to_string().contains("4294967295"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
