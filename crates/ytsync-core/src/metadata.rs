//! ID3 tag reading and writing.
//!
//! Placed files carry a front cover image and, when the batch targets an
//! album, the album name and track number. Reading is used by the inventory
//! to find the highest track number already present in an album.
//!
//! # Example
//!
//! ```rust,ignore
//! use ytsync_core::metadata::{Id3TagWriter, TagWriter, TrackTags, extract_metadata};
//! use std::path::Path;
//!
//! let tags = TrackTags::new(Some("cover.jpg".into()), Some("Mix".into()), Some(4));
//! Id3TagWriter.write_tags(Path::new("Song B [id2].mp3"), &tags)?;
//!
//! let metadata = extract_metadata(Path::new("Song B [id2].mp3"))?;
//! assert_eq!(metadata.track_number, Some(4));
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use id3::frame::{Picture, PictureType};
use id3::{Tag, TagLike, Version};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, FileSystemError, NormalizeError, Result};

/// MIME type of embedded cover images.
pub const COVER_MIME_TYPE: &str = "image/jpeg";

/// Metadata read from an audio file's ID3 tag.
///
/// All fields are optional since tags may not be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackMetadata {
    /// Track title.
    pub title: Option<String>,
    /// Artist name.
    pub artist: Option<String>,
    /// Album name.
    pub album: Option<String>,
    /// Track number within the album.
    pub track_number: Option<u32>,
    /// Whether a front cover picture is embedded.
    pub has_cover: bool,
}

impl TrackMetadata {
    /// Check if the metadata has any meaningful content.
    #[must_use]
    pub const fn has_content(&self) -> bool {
        self.title.is_some()
            || self.artist.is_some()
            || self.album.is_some()
            || self.track_number.is_some()
            || self.has_cover
    }
}

/// Read the ID3 tag of a file.
///
/// A file without a tag, or with a tag that cannot be parsed, yields empty
/// metadata.
///
/// # Errors
///
/// Returns [`FileSystemError::ReadFailed`] if the file does not exist.
pub fn extract_metadata(path: &Path) -> Result<TrackMetadata> {
    if !path.exists() {
        return Err(Error::FileSystem(FileSystemError::ReadFailed {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        }));
    }

    debug!("Extracting metadata from: {}", path.display());

    let tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => {
            debug!("No ID3 tag found in: {}", path.display());
            return Ok(TrackMetadata::default());
        }
        Err(e) => {
            debug!("Failed to read ID3 tag from {}: {}", path.display(), e);
            return Ok(TrackMetadata::default());
        }
    };

    let has_cover = tag
        .pictures()
        .any(|p| p.picture_type == PictureType::CoverFront);

    Ok(TrackMetadata {
        title: tag.title().map(String::from),
        artist: tag.artist().map(String::from),
        album: tag.album().map(String::from),
        track_number: tag.track(),
        has_cover,
    })
}

/// Tags applied to a placed file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    /// JPEG to embed as the front cover.
    pub cover: Option<PathBuf>,
    /// Album name.
    pub album: Option<String>,
    /// Track number within the album.
    pub track_number: Option<u32>,
}

impl TrackTags {
    /// Create a tag set.
    #[must_use]
    pub const fn new(
        cover: Option<PathBuf>,
        album: Option<String>,
        track_number: Option<u32>,
    ) -> Self {
        Self {
            cover,
            album,
            track_number,
        }
    }
}

/// Writes tags into audio files.
#[cfg_attr(test, mockall::automock)]
pub trait TagWriter {
    /// Merge `tags` into the file's existing tag, creating one if needed.
    fn write_tags(&self, path: &Path, tags: &TrackTags) -> Result<()>;
}

/// [`TagWriter`] backed by the `id3` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct Id3TagWriter;

impl TagWriter for Id3TagWriter {
    fn write_tags(&self, path: &Path, tags: &TrackTags) -> Result<()> {
        let failed = |reason: String| {
            Error::from(NormalizeError::TagWriteFailed {
                path: path.to_path_buf(),
                reason,
            })
        };

        let mut tag = match Tag::read_from_path(path) {
            Ok(tag) => tag,
            Err(id3::Error {
                kind: id3::ErrorKind::NoTag,
                ..
            }) => Tag::new(),
            Err(e) => {
                warn!(
                    "Existing ID3 tag in {} is unreadable, replacing it: {}",
                    path.display(),
                    e
                );
                Tag::new()
            }
        };

        if let Some(cover) = &tags.cover {
            let data = fs::read(cover)
                .map_err(|e| failed(format!("cannot read cover {}: {e}", cover.display())))?;
            tag.remove_picture_by_type(PictureType::CoverFront);
            tag.add_frame(Picture {
                mime_type: COVER_MIME_TYPE.to_string(),
                picture_type: PictureType::CoverFront,
                description: "Cover".to_string(),
                data,
            });
        }

        if let Some(album) = &tags.album {
            tag.set_album(album.as_str());
        }

        if let Some(track) = tags.track_number {
            tag.set_track(track);
        }

        tag.write_to_path(path, Version::Id3v24)
            .map_err(|e| failed(e.to_string()))?;

        debug!(
            "Wrote tags to {} (album: {:?}, track: {:?})",
            path.display(),
            tags.album,
            tags.track_number
        );
        Ok(())
    }
}
