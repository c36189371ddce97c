//! `YouTube` audio backend.
//!
//! Uses `rusty_ytdl`, a pure Rust implementation, so no external downloader
//! is needed. The best audio-only stream is saved in its original container
//! (usually m4a or webm); conversion, if any, happens later.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusty_ytdl::{Video, VideoOptions, VideoQuality, VideoSearchOptions, choose_format};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

use crate::error::{Error, FetchError, Result};
use crate::fetch::{FetchedAudio, MediaBackend};
use crate::workspace::remove_item_files;

/// Map a stream container to the file extension it is saved under.
#[must_use]
pub fn container_extension(container: &str) -> &str {
    match container {
        "mp4" => "m4a",
        "webm" => "webm",
        other => other,
    }
}

/// [`MediaBackend`] backed by `rusty_ytdl`.
///
/// `rusty_ytdl` is async; the backend owns a current-thread runtime and
/// drives each call to completion on it.
pub struct RustyYtdlBackend {
    runtime: Runtime,
}

impl RustyYtdlBackend {
    /// Create a backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokio runtime cannot be built.
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create tokio runtime: {e}")))?;
        Ok(Self { runtime })
    }

    fn options() -> VideoOptions {
        VideoOptions {
            quality: VideoQuality::HighestAudio,
            filter: VideoSearchOptions::Audio,
            ..Default::default()
        }
    }

    async fn fetch_audio_async(
        identifier: &str,
        watch_url: &str,
        audio_dir: &Path,
    ) -> Result<FetchedAudio> {
        let unavailable = |reason: String| {
            Error::from(FetchError::VideoUnavailable {
                identifier: identifier.to_string(),
                reason,
            })
        };
        let download_failed = |reason: String| {
            Error::from(FetchError::AudioDownloadFailed {
                identifier: identifier.to_string(),
                reason,
            })
        };

        let options = Self::options();
        let video = Video::new_with_options(watch_url, options.clone())
            .map_err(|e| unavailable(format!("Failed to create video instance: {e}")))?;

        let video_info = video
            .get_info()
            .await
            .map_err(|e| unavailable(format!("Failed to get video info: {e}")))?;

        debug!(
            "Available formats for {}: {}",
            identifier,
            video_info.formats.len()
        );

        let format = choose_format(&video_info.formats, &options)
            .map_err(|e| unavailable(format!("No audio stream: {e}")))?;
        let extension = container_extension(&format.mime_type.container).to_string();
        let title = video_info.video_details.title.clone();

        let output_path: PathBuf = audio_dir.join(format!("{identifier}.{extension}"));

        let stream = video
            .stream()
            .await
            .map_err(|e| download_failed(format!("Failed to create stream: {e}")))?;

        debug!("Stream content length: {} bytes", stream.content_length());

        let mut file = File::create(&output_path)
            .map_err(|e| download_failed(format!("Failed to create file: {e}")))?;

        let mut total_bytes = 0u64;
        loop {
            let chunk = stream.chunk().await.map_err(|e| {
                Error::from(FetchError::BadResponse {
                    url: watch_url.to_string(),
                    reason: format!("Failed to download chunk: {e}"),
                })
            })?;
            let Some(chunk) = chunk else {
                break;
            };

            total_bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .map_err(|e| download_failed(format!("Failed to write chunk: {e}")))?;
        }

        if total_bytes == 0 {
            return Err(download_failed("Stream was empty".to_string()));
        }

        info!(
            "Downloaded {} bytes: {} -> {}",
            total_bytes,
            title,
            output_path.display()
        );

        Ok(FetchedAudio {
            path: output_path,
            extension,
            title,
            identifier: identifier.to_string(),
        })
    }
}

impl MediaBackend for RustyYtdlBackend {
    fn fetch_audio(
        &self,
        identifier: &str,
        watch_url: &str,
        audio_dir: &Path,
    ) -> Result<FetchedAudio> {
        let result = self
            .runtime
            .block_on(Self::fetch_audio_async(identifier, watch_url, audio_dir));

        if result.is_err() {
            remove_item_files(audio_dir, identifier);
        }
        result
    }
}
