//! `ytsync` Core Library
//!
//! This crate provides the core functionality for the `ytsync` tool:
//! - Reading a `YouTube` playlist through the Data API
//! - Scanning a local folder for items already downloaded
//! - Fetching audio streams and thumbnails into a scratch workspace
//! - Converting, naming and tagging the results
//! - Running a whole batch with per-item failure isolation
//!
//! # Error Handling
//!
//! Errors are typed per domain and wrapped by [`Error`]. See the [`error`]
//! module for details.
//!
//! ```rust,ignore
//! use ytsync_core::{BatchRequest, BatchSource, Pipeline, Result};
//!
//! fn sync(pipeline: &Pipeline) -> Result<()> {
//!     let report = pipeline.run(&BatchRequest {
//!         source: BatchSource::Playlist { id: "PL123".into() },
//!         destination: "/music".into(),
//!         album: Some("Mix".into()),
//!     })?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod inventory;
pub mod metadata;
pub mod naming;
pub mod normalize;
pub mod pipeline;
pub mod retry;
pub mod sync;
pub mod thumbnail;
pub mod transcode;
pub mod workspace;
pub mod youtube;

pub use catalog::{
    CatalogDescription, CatalogPage, CatalogSource, MAX_RESULTS_PER_PAGE, PageInfo, RemoteItem,
    YOUTUBE_API_URL, YouTubeDataApi, fetch_all_items,
};
pub use config::{
    AppConfig, AudioFormat, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_SCRATCH_DIR_NAME, DownloadQuality,
};
pub use error::{
    CatalogError, Error, ErrorKind, FetchError, FileSystemError, NormalizeError, Result,
    WorkspaceError,
};
pub use fetch::{FetchResult, FetchedAudio, ItemFetcher, MediaBackend, PostProcess};
pub use inventory::{contains_identifier, last_track_number, scan};
pub use metadata::{Id3TagWriter, TagWriter, TrackMetadata, TrackTags, extract_metadata};
pub use naming::{canonical_name, parse_video_identifier, split_extension, watch_url};
pub use normalize::{NormalizeOutcome, Normalizer};
pub use pipeline::{BatchPhase, BatchReport, BatchRequest, BatchSource, ItemFailure, Pipeline};
pub use retry::{MAX_ATTEMPT, RetryPolicy};
pub use sync::{WorkQueueEntry, assign_track_numbers, synchronize};
pub use thumbnail::{
    DEFAULT_THUMBNAIL_URL_TEMPLATE, HttpThumbnailSource, ThumbnailSource, thumbnail_url,
};
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use workspace::ScratchWorkspace;
pub use youtube::RustyYtdlBackend;
