//! Normalizer: turns a fetched item into a placed, tagged file.
//!
//! The placed file is named `<cleaned title> [<identifier>].<ext>` inside the
//! destination directory. Transcoded output is written to a `.part` sibling
//! and renamed once complete, so a canonical name never points at a
//! half-written file. Scratch copies are removed only after placement.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{AudioFormat, DownloadQuality};
use crate::error::{FileSystemError, NormalizeError, Result};
use crate::fetch::FetchResult;
use crate::metadata::{TagWriter, TrackTags};
use crate::naming::canonical_name;
use crate::transcode::Transcoder;

/// Suffix of in-progress transcoder output.
pub const PARTIAL_SUFFIX: &str = "part";

/// Result of normalizing one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeOutcome {
    /// Placed file.
    pub path: PathBuf,
    /// False when the file was placed but tagging failed.
    pub tagged: bool,
}

/// Places fetched items in the destination directory.
pub struct Normalizer {
    transcoder: Option<Box<dyn Transcoder>>,
    tags: Box<dyn TagWriter>,
    format: AudioFormat,
    quality: DownloadQuality,
}

impl Normalizer {
    /// Create a normalizer.
    ///
    /// Without a transcoder, only items already in `format` can be placed.
    pub fn new(
        transcoder: Option<Box<dyn Transcoder>>,
        tags: Box<dyn TagWriter>,
        format: AudioFormat,
        quality: DownloadQuality,
    ) -> Self {
        Self {
            transcoder,
            tags,
            format,
            quality,
        }
    }

    /// Format of placed files.
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Place `fetch` in `destination` and tag it.
    ///
    /// The cover is always written; album and track number only when
    /// `album` is given.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError`] variants if the destination cannot be
    /// created, the payload is missing, or transcoding fails. Tagging
    /// failures are not errors; see [`NormalizeOutcome::tagged`].
    pub fn normalize(
        &self,
        fetch: &FetchResult,
        destination: &Path,
        album: Option<&str>,
        track_number: u32,
    ) -> Result<NormalizeOutcome> {
        let name = canonical_name(
            &fetch.title,
            &fetch.identifier,
            Some(self.format.extension()),
            true,
        );
        let target = destination.join(&name);

        fs::create_dir_all(destination).map_err(|e| NormalizeError::DestinationUnwritable {
            path: destination.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !fetch.audio_path.is_file() {
            return Err(NormalizeError::MissingPayload {
                path: fetch.audio_path.clone(),
            }
            .into());
        }

        if self.format.matches_extension(&fetch.audio_extension) {
            debug!("{} is already {}, moving", fetch.identifier, self.format);
            move_file(&fetch.audio_path, &target)?;
        } else {
            self.transcode_into(&fetch.audio_path, &target, &name)?;
        }
        info!("Placed {}", target.display());

        let cover = if fetch.thumbnail_path.is_file() {
            Some(fetch.thumbnail_path.clone())
        } else {
            warn!("No thumbnail for {}, skipping cover", fetch.identifier);
            None
        };
        let tags = TrackTags::new(
            cover,
            album.map(String::from),
            album.map(|_| track_number),
        );

        let tagged = match self.tags.write_tags(&target, &tags) {
            Ok(()) => true,
            Err(e) => {
                warn!("{} placed without tags: {}", target.display(), e);
                false
            }
        };

        remove_scratch(&fetch.audio_path);
        remove_scratch(&fetch.thumbnail_path);

        Ok(NormalizeOutcome {
            path: target,
            tagged,
        })
    }

    fn transcode_into(&self, source: &Path, target: &Path, name: &str) -> Result<()> {
        let transcoder = self.transcoder.as_ref().ok_or_else(|| {
            NormalizeError::TranscoderUnavailable(format!(
                "cannot convert {} to {} without ffmpeg",
                source.display(),
                self.format
            ))
        })?;

        let partial = target.with_file_name(format!("{name}.{PARTIAL_SUFFIX}"));
        debug!("Transcoding {} -> {}", source.display(), partial.display());

        if let Err(e) = transcoder.transcode(source, &partial, self.format, self.quality) {
            remove_scratch(&partial);
            return Err(e);
        }

        fs::rename(&partial, target).map_err(|e| {
            remove_scratch(&partial);
            FileSystemError::MoveFailed {
                source_path: partial.clone(),
                destination: target.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        Ok(())
    }
}

/// Move a file, copying across filesystems when a rename is not possible.
fn move_file(source: &Path, destination: &Path) -> Result<()> {
    if fs::rename(source, destination).is_ok() {
        return Ok(());
    }

    debug!(
        "Rename {} -> {} failed, copying instead",
        source.display(),
        destination.display()
    );
    fs::copy(source, destination).map_err(|e| FileSystemError::MoveFailed {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        reason: e.to_string(),
    })?;
    remove_scratch(source);
    Ok(())
}

fn remove_scratch(path: &Path) {
    if path.exists()
        && let Err(e) = fs::remove_file(path)
    {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}
