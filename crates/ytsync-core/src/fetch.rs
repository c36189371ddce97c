//! Item fetcher.
//!
//! Brings one video into the scratch workspace: its best audio stream and
//! its thumbnail. Both network steps run under the shared retry policy.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AudioFormat, DownloadQuality};
use crate::error::Result;
use crate::naming::watch_url;
use crate::retry::RetryPolicy;
use crate::thumbnail::{ThumbnailSource, thumbnail_file_name, thumbnail_url};
use crate::transcode::Transcoder;
use crate::workspace::ScratchWorkspace;

/// Audio stream written by a [`MediaBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedAudio {
    /// Scratch file.
    pub path: PathBuf,
    /// Extension of `path`, without the dot.
    pub extension: String,
    /// Title reported by the backend.
    pub title: String,
    /// Video identifier.
    pub identifier: String,
}

/// Downloads the audio of one video.
#[cfg_attr(test, mockall::automock)]
pub trait MediaBackend {
    /// Write the best audio stream of `identifier` into `audio_dir`.
    fn fetch_audio(
        &self,
        identifier: &str,
        watch_url: &str,
        audio_dir: &Path,
    ) -> Result<FetchedAudio>;
}

/// Scratch artifacts of one fetched item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Scratch audio file.
    pub audio_path: PathBuf,
    /// Extension of `audio_path`, without the dot.
    pub audio_extension: String,
    /// Scratch thumbnail, always JPEG.
    pub thumbnail_path: PathBuf,
    /// Video title.
    pub title: String,
    /// Video identifier.
    pub identifier: String,
}

/// Conversion applied right after download, inside the scratch area.
pub struct PostProcess {
    /// Transcoder to use.
    pub transcoder: Box<dyn Transcoder>,
    /// Target format.
    pub format: AudioFormat,
    /// Target bitrate.
    pub quality: DownloadQuality,
}

/// Fetches items into a scratch workspace.
pub struct ItemFetcher {
    backend: Box<dyn MediaBackend>,
    thumbnails: Box<dyn ThumbnailSource>,
    retry: RetryPolicy,
    thumbnail_url_template: String,
    post_process: Option<PostProcess>,
}

impl ItemFetcher {
    /// Create a fetcher.
    pub fn new(
        backend: Box<dyn MediaBackend>,
        thumbnails: Box<dyn ThumbnailSource>,
        retry: RetryPolicy,
        thumbnail_url_template: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            thumbnails,
            retry,
            thumbnail_url_template: thumbnail_url_template.into(),
            post_process: None,
        }
    }

    /// Convert each fetched stream before handing it on.
    #[must_use]
    pub fn with_post_process(mut self, post_process: PostProcess) -> Self {
        self.post_process = Some(post_process);
        self
    }

    /// Fetch audio and thumbnail for `identifier` into `workspace`.
    ///
    /// # Errors
    ///
    /// Returns the backend or thumbnail error once retries are exhausted, or
    /// a transcode error when post-processing fails.
    pub fn fetch(&self, workspace: &ScratchWorkspace, identifier: &str) -> Result<FetchResult> {
        let url = watch_url(identifier);
        info!("Downloading {}", url);

        let audio = self.retry.run("audio download", || {
            self.backend
                .fetch_audio(identifier, &url, workspace.audio_dir())
        })?;
        debug!("Audio stream for {} saved to {}", identifier, audio.path.display());

        let thumbnail_path = workspace.image_dir().join(thumbnail_file_name(identifier));
        let image_url = thumbnail_url(&self.thumbnail_url_template, identifier);
        self.retry.run("thumbnail download", || {
            self.thumbnails.fetch_thumbnail(&image_url, &thumbnail_path)
        })?;

        let (audio_path, audio_extension) = match &self.post_process {
            Some(post) if !post.format.matches_extension(&audio.extension) => {
                convert_in_place(post, &audio.path)?
            }
            _ => (audio.path, audio.extension),
        };

        Ok(FetchResult {
            audio_path,
            audio_extension,
            thumbnail_path,
            title: audio.title,
            identifier: audio.identifier,
        })
    }
}

fn convert_in_place(post: &PostProcess, source: &Path) -> Result<(PathBuf, String)> {
    let extension = post.format.extension();
    let destination = source.with_extension(extension);

    info!("Converting {} to {}", source.display(), extension);
    post.transcoder
        .transcode(source, &destination, post.format, post.quality)?;

    if let Err(e) = fs::remove_file(source) {
        warn!("Failed to remove {}: {}", source.display(), e);
    }

    Ok((destination, extension.to_string()))
}
