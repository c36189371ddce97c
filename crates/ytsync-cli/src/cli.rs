//! Command line arguments and their merge with the config file.

use std::path::{Path, PathBuf};

use clap::{ArgGroup, Parser};
use regex::Regex;
use tracing::Level;
use ytsync_core::{AppConfig, BatchRequest, BatchSource, Error, Result};

/// Mirror a YouTube playlist into a folder of tagged audio files.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("source").required(true).args(["playlist", "single"])))]
#[command(group(ArgGroup::new("verbosity").args(["quiet", "verbose", "debug"])))]
pub struct Args {
    /// Playlist id to synchronize
    #[arg(short, long)]
    pub playlist: Option<String>,

    /// Single video id or URL to download
    #[arg(short, long)]
    pub single: Option<String>,

    /// YouTube Data API key (required for playlists)
    #[arg(short = 'k', long = "key", env = "YTSYNC_API_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Destination folder (default: the folder containing this executable)
    #[arg(short, long)]
    pub folder: Option<String>,

    /// Album name; enables album and track number tags
    #[arg(short, long)]
    pub album: Option<String>,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Log progress (default)
    #[arg(short, long)]
    pub verbose: bool,

    /// Log debug details
    #[arg(short, long)]
    pub debug: bool,

    /// The config file to use
    #[arg(short, long, env = "YTSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write JSON logs, rotated daily, into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    /// Console level selected by the verbosity flags.
    pub const fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::INFO
        }
    }

    /// Load the config file named by `--config`, or the default one.
    pub fn load_config(&self) -> Result<AppConfig> {
        match &self.config {
            Some(path) => AppConfig::load_from(path),
            None => AppConfig::load(),
        }
    }

    /// Apply the flags on top of `config` and build the batch request.
    ///
    /// `fallback_folder` is used when neither the flags nor the config name a
    /// destination. Relative folders are resolved against `cwd`.
    pub fn resolve(
        &self,
        mut config: AppConfig,
        fallback_folder: &Path,
        cwd: &Path,
    ) -> Result<(BatchRequest, AppConfig)> {
        if let Some(key) = &self.key {
            config.api_key = Some(key.clone());
        }

        let source = match (&self.playlist, &self.single) {
            (Some(id), _) => {
                if config.api_key.as_deref().is_none_or(str::is_empty) {
                    return Err(Error::configuration(
                        "an API key is required for playlists: pass -k or set YTSYNC_API_KEY",
                    ));
                }
                BatchSource::Playlist { id: id.clone() }
            }
            (None, Some(identifier)) => BatchSource::Single {
                identifier: identifier.clone(),
            },
            (None, None) => {
                return Err(Error::configuration("either --playlist or --single is required"));
            }
        };

        let folder = match &self.folder {
            Some(folder) => Some(PathBuf::from(strip_quotes(folder)?)),
            None => config.destination.clone(),
        };
        let folder = folder.unwrap_or_else(|| fallback_folder.to_path_buf());
        let destination = if folder.is_absolute() {
            folder
        } else {
            cwd.join(folder)
        };
        config.destination = Some(destination.clone());

        let request = BatchRequest {
            source,
            destination,
            album: self.album.clone().filter(|a| !a.is_empty()),
        };
        Ok((request, config))
    }
}

/// Remove quote characters left by shells or copy-paste.
pub fn strip_quotes(folder: &str) -> Result<String> {
    let quotes = Regex::new(r#"["|']+"#)
        .map_err(|e| Error::configuration(format!("invalid quote pattern: {e}")))?;
    Ok(quotes.replace_all(folder, "").into_owned())
}

/// Directory containing the running executable.
pub fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::configuration("cannot determine the executable's directory"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut args = Args::try_parse_from(std::iter::once("ytsync").chain(args.iter().copied()))
            .expect("arguments should parse");
        args.config = None;
        args
    }

    #[test]
    fn test_source_is_required() {
        assert!(Args::try_parse_from(["ytsync", "-f", "/music"]).is_err());
    }

    #[test]
    fn test_playlist_and_single_conflict() {
        assert!(Args::try_parse_from(["ytsync", "-p", "PL1", "-s", "abc"]).is_err());
    }

    #[test]
    fn test_verbosity_flags_conflict() {
        assert!(Args::try_parse_from(["ytsync", "-s", "abc", "-q", "-d"]).is_err());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(parse(&["-s", "abc"]).log_level(), Level::INFO);
        assert_eq!(parse(&["-s", "abc", "-v"]).log_level(), Level::INFO);
        assert_eq!(parse(&["-s", "abc", "-q"]).log_level(), Level::ERROR);
        assert_eq!(parse(&["-s", "abc", "-d"]).log_level(), Level::DEBUG);
    }

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes(r#""/music/my mix""#).unwrap(), "/music/my mix");
        assert_eq!(strip_quotes("'/music'").unwrap(), "/music");
        assert_eq!(strip_quotes("/music").unwrap(), "/music");
    }

    #[test]
    fn test_playlist_requires_key() {
        let mut args = parse(&["-p", "PL1", "-f", "/music"]);
        args.key = None;

        let err = args
            .resolve(AppConfig::default(), Path::new("/bin"), Path::new("/"))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_key_from_config_file() {
        let mut args = parse(&["-p", "PL1"]);
        args.key = None;
        let config = AppConfig {
            api_key: Some("from-file".to_string()),
            ..Default::default()
        };

        let (request, config) = args
            .resolve(config, Path::new("/opt/ytsync"), Path::new("/"))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(request.destination, PathBuf::from("/opt/ytsync"));
    }

    #[test]
    fn test_flags_override_config() {
        let args = parse(&["-p", "PL1", "-k", "flag", "-f", "\"music\"", "-a", "Mix"]);
        let config = AppConfig {
            api_key: Some("file".to_string()),
            destination: Some(PathBuf::from("/from/config")),
            ..Default::default()
        };

        let (request, config) = args
            .resolve(config, Path::new("/bin"), Path::new("/home/me"))
            .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("flag"));
        assert_eq!(request.destination, PathBuf::from("/home/me/music"));
        assert_eq!(request.album.as_deref(), Some("Mix"));
        assert_eq!(
            request.source,
            BatchSource::Playlist {
                id: "PL1".to_string()
            }
        );
    }

    #[test]
    fn test_single_needs_no_key() {
        let mut args = parse(&["-s", "https://youtu.be/abc"]);
        args.key = None;

        let (request, _) = args
            .resolve(AppConfig::default(), Path::new("/bin"), Path::new("/"))
            .unwrap();
        assert!(matches!(request.source, BatchSource::Single { .. }));
        assert!(request.album.is_none());
    }
}
