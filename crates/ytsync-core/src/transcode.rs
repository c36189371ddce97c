//! Audio transcoding through an external `ffmpeg` binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error, info};

use crate::config::{AudioFormat, DownloadQuality};
use crate::error::{NormalizeError, Result};

/// Number of stderr lines kept in a failure report.
const STDERR_TAIL_LINES: usize = 20;

/// Converts audio files between formats.
#[cfg_attr(test, mockall::automock)]
pub trait Transcoder {
    /// Write `source` re-encoded as `format` to `destination`.
    ///
    /// `destination` may carry any extension; the output format is given
    /// explicitly.
    fn transcode(
        &self,
        source: &Path,
        destination: &Path,
        format: AudioFormat,
        quality: DownloadQuality,
    ) -> Result<()>;
}

/// [`Transcoder`] that shells out to ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    /// Use `configured` if given, otherwise find `ffmpeg` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::TranscoderUnavailable`] if no executable is
    /// found.
    pub fn locate(configured: Option<&Path>) -> Result<Self> {
        let binary = match configured {
            Some(path) => which::which(path).map_err(|e| {
                NormalizeError::TranscoderUnavailable(format!("{}: {e}", path.display()))
            })?,
            None => which::which("ffmpeg").map_err(|e| {
                NormalizeError::TranscoderUnavailable(format!("ffmpeg not found on PATH: {e}"))
            })?,
        };

        info!("Using ffmpeg at {}", binary.display());
        Ok(Self { binary })
    }

    /// Path of the ffmpeg executable.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(
        &self,
        source: &Path,
        destination: &Path,
        format: AudioFormat,
        quality: DownloadQuality,
    ) -> Result<()> {
        let args = ffmpeg_args(source, destination, format, quality);
        debug!("Running {} {:?}", self.binary.display(), args);

        let failed = |reason: String| NormalizeError::TranscodeFailed {
            source_path: source.to_path_buf(),
            reason,
        };

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .map_err(|e| failed(format!("failed to run {}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "ffmpeg exited with {} for {}",
                output.status,
                source.display()
            );
            return Err(failed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            ))
            .into());
        }

        debug!("Transcoded {} -> {}", source.display(), destination.display());
        Ok(())
    }
}

fn ffmpeg_args(
    source: &Path,
    destination: &Path,
    format: AudioFormat,
    quality: DownloadQuality,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        source.into(),
        "-vn".into(),
        "-codec:a".into(),
        format.codec().into(),
    ];

    if !format.is_lossless() {
        args.push("-b:a".into());
        args.push(format!("{}k", quality.bitrate_kbps()).into());
    }

    args.push("-f".into());
    args.push(muxer(format).into());
    args.push(destination.into());
    args
}

const fn muxer(format: AudioFormat) -> &'static str {
    match format {
        AudioFormat::Mp3 => "mp3",
        AudioFormat::M4a => "ipod",
        AudioFormat::Opus => "opus",
        AudioFormat::Flac => "flac",
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
