//! Integration tests for full synchronization batches.
//!
//! The network-facing boundaries (catalog, audio backend, thumbnails) are
//! replaced by in-memory fakes. Naming, inventory, placement and ID3 tagging
//! run for real against temporary directories.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use ytsync_core::{
    AudioFormat, BatchRequest, BatchSource, CatalogDescription, CatalogError, CatalogPage,
    CatalogSource, DEFAULT_SCRATCH_DIR_NAME, DownloadQuality, Error, FetchError, FetchedAudio,
    Id3TagWriter, ItemFetcher, MediaBackend, NormalizeError, Normalizer, PageInfo, Pipeline,
    RemoteItem, Result, RetryPolicy, TagWriter, ThumbnailSource, TrackTags, extract_metadata,
    fetch_all_items, workspace::IMAGE_SUBDIR,
};

// =============================================================================
// Fakes
// =============================================================================

/// Serves a fixed playlist in pages of `page_size`.
struct FakeCatalog {
    items: Vec<RemoteItem>,
    page_size: usize,
    exists: bool,
}

impl FakeCatalog {
    fn new(items: &[(&str, &str)]) -> Self {
        Self {
            items: items
                .iter()
                .map(|(id, title)| RemoteItem::new(*id, *title))
                .collect(),
            page_size: 2,
            exists: true,
        }
    }

    fn missing() -> Self {
        Self {
            items: Vec::new(),
            page_size: 2,
            exists: false,
        }
    }
}

impl CatalogSource for FakeCatalog {
    fn describe(&self, _catalog_id: &str) -> Result<CatalogDescription> {
        Ok(CatalogDescription {
            title: "Mix".to_string(),
            channel_title: "Uploader".to_string(),
            total_results: u32::from(self.exists),
        })
    }

    fn fetch_page(&self, _catalog_id: &str, page_token: Option<String>) -> Result<CatalogPage> {
        let start: usize = page_token.map_or(0, |t| t.parse().unwrap());
        let end = (start + self.page_size).min(self.items.len());
        Ok(CatalogPage {
            page_info: PageInfo {
                total_results: u32::try_from(self.items.len()).unwrap(),
                results_per_page: u32::try_from(self.page_size).unwrap(),
            },
            items: self.items[start..end].to_vec(),
            next_page_token: (end < self.items.len()).then(|| end.to_string()),
        })
    }
}

/// Writes a small `.mp3` payload, failing for selected identifiers.
#[derive(Clone, Default)]
struct FakeBackend {
    unavailable: HashSet<String>,
    flaky: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
    staged: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeBackend {
    fn unavailable(ids: &[&str]) -> Self {
        Self {
            unavailable: ids.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    fn flaky(ids: &[&str]) -> Self {
        Self {
            flaky: ids.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Scratch audio and image files present at the start of each call.
    fn staged(&self) -> Vec<Vec<String>> {
        self.staged.lock().unwrap().clone()
    }
}

impl MediaBackend for FakeBackend {
    fn fetch_audio(
        &self,
        identifier: &str,
        watch_url: &str,
        audio_dir: &Path,
    ) -> Result<FetchedAudio> {
        self.calls.lock().unwrap().push(identifier.to_string());

        let scratch_dirs = [audio_dir.to_path_buf(), audio_dir.with_file_name(IMAGE_SUBDIR)];
        let mut staged: Vec<String> = scratch_dirs
            .iter()
            .flat_map(|dir| fs::read_dir(dir).unwrap())
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        staged.sort();
        self.staged.lock().unwrap().push(staged);

        if self.unavailable.contains(identifier) {
            return Err(FetchError::VideoUnavailable {
                identifier: identifier.to_string(),
                reason: "This video is private".to_string(),
            }
            .into());
        }
        if self.flaky.contains(identifier) {
            return Err(FetchError::BadResponse {
                url: watch_url.to_string(),
                reason: "connection reset by peer".to_string(),
            }
            .into());
        }

        let path = audio_dir.join(format!("{identifier}.mp3"));
        fs::write(&path, vec![0u8; 512]).unwrap();
        Ok(FetchedAudio {
            path,
            extension: "mp3".to_string(),
            title: format!("Video {identifier}"),
            identifier: identifier.to_string(),
        })
    }
}

struct FakeThumbnails;

impl ThumbnailSource for FakeThumbnails {
    fn fetch_thumbnail(&self, _url: &str, destination: &Path) -> Result<()> {
        fs::write(destination, [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        Ok(())
    }
}

/// Answers 404 for the thumbnails of selected identifiers.
struct MissingThumbnails {
    missing: HashSet<String>,
}

impl MissingThumbnails {
    fn for_ids(ids: &[&str]) -> Self {
        Self {
            missing: ids.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ThumbnailSource for MissingThumbnails {
    fn fetch_thumbnail(&self, url: &str, destination: &Path) -> Result<()> {
        if self.missing.iter().any(|id| url.contains(&format!("/{id}."))) {
            return Err(FetchError::Http {
                url: url.to_string(),
                status: 404,
            }
            .into());
        }
        FakeThumbnails.fetch_thumbnail(url, destination)
    }
}

struct ReadOnlyTags;

impl TagWriter for ReadOnlyTags {
    fn write_tags(&self, path: &Path, _tags: &TrackTags) -> Result<()> {
        Err(NormalizeError::TagWriteFailed {
            path: path.to_path_buf(),
            reason: "read-only file system".to_string(),
        }
        .into())
    }
}

// =============================================================================
// Fixture
// =============================================================================

struct TestFixture {
    dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    fn destination(&self) -> PathBuf {
        self.dir.path().join("music")
    }

    fn scratch(&self) -> PathBuf {
        self.destination().join(DEFAULT_SCRATCH_DIR_NAME)
    }

    /// Place an already-synchronized file tagged with `album`/`track`.
    fn existing(&self, name: &str, album: &str, track: u32) {
        fs::create_dir_all(self.destination()).unwrap();
        let path = self.destination().join(name);
        fs::write(&path, vec![0u8; 256]).unwrap();
        Id3TagWriter
            .write_tags(
                &path,
                &TrackTags::new(None, Some(album.to_string()), Some(track)),
            )
            .unwrap();
    }

    fn playlist(&self, album: Option<&str>) -> BatchRequest {
        BatchRequest {
            source: BatchSource::Playlist {
                id: "PLmix".to_string(),
            },
            destination: self.destination(),
            album: album.map(String::from),
        }
    }

    fn placed(&self, name: &str) -> PathBuf {
        self.destination().join(name)
    }
}

fn pipeline_with(
    catalog: FakeCatalog,
    backend: FakeBackend,
    tags: Box<dyn TagWriter>,
    retry: RetryPolicy,
) -> Pipeline {
    let fetcher = ItemFetcher::new(
        Box::new(backend),
        Box::new(FakeThumbnails),
        retry,
        "https://thumbs.example/{id}.jpg",
    );
    let normalizer = Normalizer::new(None, tags, AudioFormat::Mp3, DownloadQuality::Medium);
    Pipeline::new(
        Some(Box::new(catalog)),
        fetcher,
        normalizer,
        DEFAULT_SCRATCH_DIR_NAME,
    )
}

fn pipeline(catalog: FakeCatalog, backend: FakeBackend) -> Pipeline {
    pipeline_with(catalog, backend, Box::new(Id3TagWriter), RetryPolicy::none())
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_end_to_end_appends_after_last_track() {
    let fixture = TestFixture::new();
    fixture.existing("Song A [id1].mp3", "Mix", 3);

    let backend = FakeBackend::default();
    let pipeline = pipeline(
        FakeCatalog::new(&[("id1", "Song A"), ("id2", "Song B")]),
        backend.clone(),
    );

    let report = pipeline.run(&fixture.playlist(Some("Mix"))).unwrap();

    assert_eq!(report.found, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.downloaded, 1);
    assert!(report.failed.is_empty());
    assert_eq!(backend.calls(), ["id2"]);

    let placed = fixture.placed("Song B [id2].mp3");
    assert_eq!(report.placed, vec![placed.clone()]);

    let metadata = extract_metadata(&placed).unwrap();
    assert_eq!(metadata.album.as_deref(), Some("Mix"));
    assert_eq!(metadata.track_number, Some(4));
    assert!(metadata.has_cover);

    assert!(!fixture.scratch().exists());
}

#[test]
fn test_failed_item_does_not_stop_batch() {
    let fixture = TestFixture::new();
    let backend = FakeBackend::unavailable(&["id2"]);
    let pipeline = pipeline(
        FakeCatalog::new(&[("id1", "One"), ("id2", "Two"), ("id3", "Three")]),
        backend.clone(),
    );

    let report = pipeline.run(&fixture.playlist(Some("Album"))).unwrap();

    assert_eq!(backend.calls(), ["id1", "id2", "id3"]);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].identifier, "id2");
    assert!(report.failed[0].reason.contains("private"));

    assert!(fixture.placed("One [id1].mp3").exists());
    assert!(!fixture.placed("Two [id2].mp3").exists());
    assert!(fixture.placed("Three [id3].mp3").exists());

    // Numbers are assigned up front, so the failed item leaves a gap.
    let third = extract_metadata(&fixture.placed("Three [id3].mp3")).unwrap();
    assert_eq!(third.track_number, Some(3));

    assert!(!fixture.scratch().exists());
}

#[test]
fn test_failed_item_leaves_no_staged_files() {
    let fixture = TestFixture::new();
    let backend = FakeBackend::default();
    let fetcher = ItemFetcher::new(
        Box::new(backend.clone()),
        Box::new(MissingThumbnails::for_ids(&["id1"])),
        RetryPolicy::none(),
        "https://thumbs.example/{id}.jpg",
    );
    let normalizer = Normalizer::new(
        None,
        Box::new(Id3TagWriter),
        AudioFormat::Mp3,
        DownloadQuality::Medium,
    );
    let pipeline = Pipeline::new(
        Some(Box::new(FakeCatalog::new(&[("id1", "No Cover"), ("id2", "Fine")]))),
        fetcher,
        normalizer,
        DEFAULT_SCRATCH_DIR_NAME,
    );

    let report = pipeline.run(&fixture.playlist(None)).unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].identifier, "id1");
    assert!(report.failed[0].reason.contains("404"));
    assert_eq!(report.downloaded, 1);

    // id1's audio was staged before its thumbnail failed.
    assert_eq!(backend.staged(), [Vec::<String>::new(), Vec::new()]);
    assert!(fixture.placed("Fine [id2].mp3").exists());
    assert!(!fixture.scratch().exists());
}

#[test]
fn test_exhausted_track_numbers_fail_before_downloading() {
    let fixture = TestFixture::new();
    fixture.existing("Last [last].mp3", "Mix", u32::MAX);

    let backend = FakeBackend::default();
    let pipeline = pipeline(FakeCatalog::new(&[("id1", "Song")]), backend.clone());

    let err = pipeline.run(&fixture.playlist(Some("Mix"))).unwrap_err();

    assert!(matches!(
        err,
        Error::TrackNumbersExhausted { last, count: 1 } if last == u32::MAX
    ));
    assert!(backend.calls().is_empty());
    assert!(!fixture.scratch().exists());

    // Without an album nothing is numbered.
    let report = pipeline.run(&fixture.playlist(None)).unwrap();
    assert_eq!(report.downloaded, 1);
}

#[test]
fn test_track_numbers_follow_queue_order() {
    let fixture = TestFixture::new();
    fixture.existing("Old [old].mp3", "Album", 5);
    fixture.existing("Elsewhere [x].mp3", "Other", 40);

    let pipeline = pipeline(
        FakeCatalog::new(&[("a", "First"), ("b", "Second"), ("c", "Third")]),
        FakeBackend::default(),
    );

    pipeline.run(&fixture.playlist(Some("Album"))).unwrap();

    let tracks: Vec<Option<u32>> = ["First [a].mp3", "Second [b].mp3", "Third [c].mp3"]
        .iter()
        .map(|name| extract_metadata(&fixture.placed(name)).unwrap().track_number)
        .collect();
    assert_eq!(tracks, [Some(6), Some(7), Some(8)]);
}

#[test]
fn test_without_album_only_cover_is_written() {
    let fixture = TestFixture::new();
    let pipeline = pipeline(FakeCatalog::new(&[("a", "First")]), FakeBackend::default());

    pipeline.run(&fixture.playlist(None)).unwrap();

    let metadata = extract_metadata(&fixture.placed("First [a].mp3")).unwrap();
    assert!(metadata.has_cover);
    assert!(metadata.album.is_none());
    assert!(metadata.track_number.is_none());
}

#[test]
fn test_empty_queue_downloads_nothing() {
    let fixture = TestFixture::new();
    fixture.existing("Song A [id1].mp3", "Mix", 1);

    let backend = FakeBackend::default();
    let pipeline = pipeline(FakeCatalog::new(&[("id1", "Song A")]), backend.clone());

    let report = pipeline.run(&fixture.playlist(None)).unwrap();

    assert_eq!(report.downloaded, 0);
    assert_eq!(report.skipped, 1);
    assert!(backend.calls().is_empty());
    assert!(!fixture.scratch().exists());
}

#[test]
fn test_second_run_is_a_no_op() {
    let fixture = TestFixture::new();
    let backend = FakeBackend::default();
    let pipeline = pipeline(
        FakeCatalog::new(&[("a", "A: the first"), ("b", "B/side")]),
        backend.clone(),
    );

    let first = pipeline.run(&fixture.playlist(None)).unwrap();
    let second = pipeline.run(&fixture.playlist(None)).unwrap();

    assert_eq!(first.downloaded, 2);
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(backend.calls(), ["a", "b"]);
}

#[test]
fn test_missing_playlist_is_fatal_and_cleans_up() {
    let fixture = TestFixture::new();
    let pipeline = pipeline(FakeCatalog::missing(), FakeBackend::default());

    let err = pipeline.run(&fixture.playlist(None)).unwrap_err();

    assert!(matches!(
        err,
        Error::Catalog(CatalogError::NotFound { ref catalog_id }) if catalog_id == "PLmix"
    ));
    assert!(!fixture.scratch().exists());
}

#[test]
fn test_stale_scratch_is_removed() {
    let fixture = TestFixture::new();
    let stale = fixture.scratch().join("audio");
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("interrupted.webm"), b"partial").unwrap();

    let pipeline = pipeline(FakeCatalog::new(&[]), FakeBackend::default());
    pipeline.run(&fixture.playlist(None)).unwrap();

    assert!(!fixture.scratch().exists());
}

#[test]
fn test_transient_failures_are_retried_then_reported() {
    let fixture = TestFixture::new();
    let backend = FakeBackend::flaky(&["id1"]);
    let pipeline = pipeline_with(
        FakeCatalog::new(&[("id1", "Flaky"), ("id2", "Fine")]),
        backend.clone(),
        Box::new(Id3TagWriter),
        RetryPolicy::new(2, Duration::ZERO),
    );

    let report = pipeline.run(&fixture.playlist(None)).unwrap();

    assert_eq!(backend.calls(), ["id1", "id1", "id1", "id2"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.downloaded, 1);
}

#[test]
fn test_tag_failure_is_reported_as_partial() {
    let fixture = TestFixture::new();
    let pipeline = pipeline_with(
        FakeCatalog::new(&[("id1", "Song")]),
        FakeBackend::default(),
        Box::new(ReadOnlyTags),
        RetryPolicy::none(),
    );

    let report = pipeline.run(&fixture.playlist(Some("Mix"))).unwrap();

    assert_eq!(report.downloaded, 1);
    assert_eq!(report.partial, 1);
    assert!(report.failed.is_empty());
    assert!(fixture.placed("Song [id1].mp3").exists());
    assert_eq!(
        report.summary(),
        "found 1, skipped 0, downloaded 1 (1 untagged), failed 0"
    );
}

#[test]
fn test_single_item_mode() {
    let fixture = TestFixture::new();
    let backend = FakeBackend::default();
    let pipeline = pipeline(FakeCatalog::missing(), backend.clone());
    let request = BatchRequest {
        source: BatchSource::Single {
            identifier: "https://www.youtube.com/watch?v=solo42".to_string(),
        },
        destination: fixture.destination(),
        album: None,
    };

    let report = pipeline.run(&request).unwrap();

    assert_eq!(report.downloaded, 1);
    assert!(fixture.placed("Video solo42 [solo42].mp3").exists());
    assert_eq!(backend.calls(), ["solo42"]);
}

// =============================================================================
// Catalog paging
// =============================================================================

#[test]
fn test_catalog_pages_are_flattened_in_order() {
    let catalog = FakeCatalog::new(&[
        ("1", "a"),
        ("2", "b"),
        ("3", "c"),
        ("4", "d"),
        ("5", "e"),
    ]);

    let items = fetch_all_items(&catalog, "PLmix").unwrap();

    let ids: Vec<&str> = items.iter().map(|i| i.identifier.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3", "4", "5"]);
}

#[test]
#[ignore = "requires network access, YTSYNC_API_KEY and YTSYNC_TEST_PLAYLIST"]
fn test_real_playlist() {
    let key = std::env::var("YTSYNC_API_KEY").expect("YTSYNC_API_KEY must be set");
    let playlist = std::env::var("YTSYNC_TEST_PLAYLIST").expect("YTSYNC_TEST_PLAYLIST must be set");
    let api = ytsync_core::YouTubeDataApi::new(key, Duration::from_secs(30), RetryPolicy::default())
        .unwrap();

    let items = fetch_all_items(&api, &playlist).unwrap();
    assert!(!items.is_empty());
}
