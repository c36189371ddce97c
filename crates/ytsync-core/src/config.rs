//! Application configuration management.
//!
//! Settings are read from `<config_dir>/ytsync/config.json` (or an explicit
//! path). Every field has a default, so a missing file or a partial file is
//! fine. Command line flags are applied on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, FileSystemError, Result};
use crate::retry::{MAX_ATTEMPT, RetryPolicy};
use crate::thumbnail::DEFAULT_THUMBNAIL_URL_TEMPLATE;

/// Default name of the scratch directory created inside the destination.
pub const DEFAULT_SCRATCH_DIR_NAME: &str = ".ytsync-tmp";

/// Default HTTP timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default pause between retries in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Target bitrate for lossy transcodes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadQuality {
    /// Low quality (128 kbps).
    Low,
    /// Medium quality (192 kbps).
    #[default]
    Medium,
    /// High quality (320 kbps).
    High,
}

impl DownloadQuality {
    /// Bitrate in kbps.
    #[must_use]
    pub const fn bitrate_kbps(self) -> u32 {
        match self {
            Self::Low => 128,
            Self::Medium => 192,
            Self::High => 320,
        }
    }
}

impl std::fmt::Display for DownloadQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low (128 kbps)"),
            Self::Medium => write!(f, "Medium (192 kbps)"),
            Self::High => write!(f, "High (320 kbps)"),
        }
    }
}

/// Audio container/codec of placed files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MPEG layer III.
    #[default]
    Mp3,
    /// AAC in an MP4 container.
    M4a,
    /// Opus in an Ogg container.
    Opus,
    /// Free Lossless Audio Codec.
    Flac,
}

impl AudioFormat {
    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Flac => "flac",
        }
    }

    /// ffmpeg encoder name.
    #[must_use]
    pub const fn codec(self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::M4a => "aac",
            Self::Opus => "libopus",
            Self::Flac => "flac",
        }
    }

    /// Whether the encoder ignores the bitrate.
    #[must_use]
    pub const fn is_lossless(self) -> bool {
        matches!(self, Self::Flac)
    }

    /// Whether placed files of this format can carry the ID3 tags written by
    /// [`crate::Id3TagWriter`].
    #[must_use]
    pub const fn carries_id3(self) -> bool {
        matches!(self, Self::Mp3)
    }

    /// Whether `extension` names this format (ASCII case-insensitive).
    #[must_use]
    pub fn matches_extension(self, extension: &str) -> bool {
        self.extension().eq_ignore_ascii_case(extension)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "m4a" => Ok(Self::M4a),
            "opus" => Ok(Self::Opus),
            "flac" => Ok(Self::Flac),
            other => Err(Error::configuration(format!(
                "Unsupported audio format '{other}'"
            ))),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// YouTube Data API key.
    pub api_key: Option<String>,
    /// Folder that receives the placed files.
    pub destination: Option<PathBuf>,
    /// Format of placed files; must carry ID3 tags.
    pub audio_format: AudioFormat,
    /// Bitrate used when transcoding.
    pub download_quality: DownloadQuality,
    /// Convert right after download, inside the scratch area.
    pub post_format: Option<AudioFormat>,
    /// Retries allowed after a transient failure.
    pub max_attempts: u32,
    /// Pause between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// HTTP timeout in seconds.
    pub request_timeout_secs: u64,
    /// Scratch directory name, created inside the destination.
    pub scratch_dir_name: String,
    /// Thumbnail URL with an `{id}` placeholder.
    pub thumbnail_url_template: String,
    /// Explicit ffmpeg binary; looked up on `PATH` when unset.
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            destination: None,
            audio_format: AudioFormat::default(),
            download_quality: DownloadQuality::default(),
            post_format: None,
            max_attempts: MAX_ATTEMPT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            scratch_dir_name: DEFAULT_SCRATCH_DIR_NAME.to_string(),
            thumbnail_url_template: DEFAULT_THUMBNAIL_URL_TEMPLATE.to_string(),
            ffmpeg_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::FileSystem(FileSystemError::ReadFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to read config file: {e}"),
            })
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to parse config file {}: {e}",
                path.display()
            ))
        })?;

        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Check settings that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `audio_format` cannot carry ID3
    /// tags. Such formats are only accepted as `post_format`.
    pub fn validate(&self) -> Result<()> {
        if !self.audio_format.carries_id3() {
            return Err(Error::configuration(format!(
                "audio_format '{}' cannot carry ID3 tags; use mp3 (other formats are only \
                 allowed as post_format)",
                self.audio_format
            )));
        }
        Ok(())
    }

    /// Save configuration to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::WriteFailed {
                    path: parent.to_path_buf(),
                    reason: format!("Failed to create config directory: {e}"),
                })
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: format!("Failed to write config file: {e}"),
            })
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Retry policy built from `max_attempts` and `retry_delay_ms`.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.retry_delay_ms))
    }

    /// HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Scratch root for a destination directory.
    #[must_use]
    pub fn scratch_root(&self, destination: &Path) -> PathBuf {
        destination.join(&self.scratch_dir_name)
    }

    /// Get the path to the config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("ytsync")
        .join("config.json")
}
