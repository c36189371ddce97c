//! `ytsync` command line tool.
//!
//! Downloads every video of a YouTube playlist that is not yet in the
//! destination folder, converts it, and tags it with a cover image and,
//! optionally, album and track number.

mod cli;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use ytsync_core::{
    AppConfig, BatchReport, BatchRequest, BatchSource, CatalogSource, Error, FfmpegTranscoder,
    HttpThumbnailSource, Id3TagWriter, ItemFetcher, Normalizer, Pipeline, PostProcess, Result,
    RustyYtdlBackend, Transcoder, YouTubeDataApi,
};

use crate::cli::{Args, executable_dir};
use crate::logging::LoggingConfig;

fn main() -> ExitCode {
    let args = Args::parse();

    let logging = LoggingConfig::default()
        .with_console_level(args.log_level())
        .with_log_directory(args.log_dir.clone());
    let _guard = match logging::init(&logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ytsync: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(report) => {
            for failure in &report.failed {
                warn!("Not downloaded: {} ({})", failure.identifier, failure.reason);
            }
            info!("Done: {}", report.summary());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<BatchReport> {
    let config = args.load_config()?;
    let cwd = std::env::current_dir()?;
    let (request, config) = args.resolve(config, &executable_dir()?, &cwd)?;
    config.validate()?;

    info!("Destination: {}", request.destination.display());
    build_pipeline(&config, &request)?.run(&request)
}

fn build_pipeline(config: &AppConfig, request: &BatchRequest) -> Result<Pipeline> {
    let retry = config.retry_policy();
    let timeout = config.request_timeout();

    let catalog: Option<Box<dyn CatalogSource>> = match (&request.source, &config.api_key) {
        (BatchSource::Playlist { .. }, Some(key)) => {
            Some(Box::new(YouTubeDataApi::new(key.clone(), timeout, retry)?))
        }
        _ => None,
    };

    let transcoder = match FfmpegTranscoder::locate(config.ffmpeg_path.as_deref()) {
        Ok(transcoder) => Some(transcoder),
        Err(e) => {
            warn!(
                "{}; only streams already in {} format can be placed",
                e, config.audio_format
            );
            None
        }
    };

    let mut fetcher = ItemFetcher::new(
        Box::new(RustyYtdlBackend::new()?),
        Box::new(HttpThumbnailSource::new(timeout)?),
        retry,
        config.thumbnail_url_template.clone(),
    );

    if let Some(format) = config.post_format {
        let transcoder = transcoder.clone().ok_or_else(|| {
            Error::configuration(format!("post_format {format} needs ffmpeg"))
        })?;
        fetcher = fetcher.with_post_process(PostProcess {
            transcoder: Box::new(transcoder),
            format,
            quality: config.download_quality,
        });
    }

    let normalizer = Normalizer::new(
        transcoder.map(|t| Box::new(t) as Box<dyn Transcoder>),
        Box::new(Id3TagWriter),
        config.audio_format,
        config.download_quality,
    );

    Ok(Pipeline::new(
        catalog,
        fetcher,
        normalizer,
        config.scratch_dir_name.clone(),
    ))
}
