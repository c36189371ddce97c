//! Batch orchestrator.
//!
//! A batch moves through fixed phases:
//!
//! ```text
//! Init -> WorkspaceReady -> Syncing -> Queued -> Processing(1..=N) -> Done
//! ```
//!
//! Errors before `Processing` end the batch. Errors while processing an item
//! are recorded in the [`BatchReport`], the item's staged files are
//! discarded, and the batch moves on to the next item. The scratch workspace
//! is removed on every exit path.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::catalog::{CatalogSource, RemoteItem, fetch_all_items};
use crate::error::{Error, ErrorKind, Result};
use crate::fetch::ItemFetcher;
use crate::inventory;
use crate::naming::parse_video_identifier;
use crate::normalize::{NormalizeOutcome, Normalizer};
use crate::sync::{WorkQueueEntry, assign_track_numbers, synchronize};
use crate::workspace::ScratchWorkspace;

/// What to synchronize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchSource {
    /// Every item of a playlist.
    Playlist {
        /// Playlist identifier.
        id: String,
    },
    /// One video, by identifier or URL.
    Single {
        /// Raw identifier or watch URL.
        identifier: String,
    },
}

/// One synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Items to bring in.
    pub source: BatchSource,
    /// Folder that receives the placed files.
    pub destination: PathBuf,
    /// Album to tag placed files with.
    pub album: Option<String>,
}

/// Batch lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    /// Nothing done yet.
    Init,
    /// Scratch workspace created.
    WorkspaceReady,
    /// Reading remote and local state.
    Syncing,
    /// Work queue numbered.
    Queued,
    /// Processing the n-th item (1-based).
    Processing(usize),
    /// Finished, workspace removed.
    Done,
}

impl fmt::Display for BatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::WorkspaceReady => write!(f, "workspace ready"),
            Self::Syncing => write!(f, "syncing"),
            Self::Queued => write!(f, "queued"),
            Self::Processing(n) => write!(f, "processing item {n}"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// An item that could not be brought in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Video identifier.
    pub identifier: String,
    /// Title from the playlist, empty in single mode.
    pub title: String,
    /// Error message.
    pub reason: String,
}

/// Counters and failures of a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Items found remotely.
    pub found: usize,
    /// Items already present locally.
    pub skipped: usize,
    /// Items placed, including untagged ones.
    pub downloaded: usize,
    /// Items placed without tags.
    pub partial: usize,
    /// Items that failed.
    pub failed: Vec<ItemFailure>,
    /// Placed files, in queue order.
    pub placed: Vec<PathBuf>,
}

impl BatchReport {
    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "found {}, skipped {}, downloaded {} ({} untagged), failed {}",
            self.found,
            self.skipped,
            self.downloaded,
            self.partial,
            self.failed.len()
        )
    }

    /// Whether any item failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    fn record(&mut self, outcome: NormalizeOutcome) {
        self.downloaded += 1;
        if !outcome.tagged {
            self.partial += 1;
        }
        self.placed.push(outcome.path);
    }
}

/// Runs batches.
pub struct Pipeline {
    catalog: Option<Box<dyn CatalogSource>>,
    fetcher: ItemFetcher,
    normalizer: Normalizer,
    scratch_dir_name: String,
}

impl Pipeline {
    /// Create a pipeline. Playlist batches need a catalog source.
    pub fn new(
        catalog: Option<Box<dyn CatalogSource>>,
        fetcher: ItemFetcher,
        normalizer: Normalizer,
        scratch_dir_name: impl Into<String>,
    ) -> Self {
        Self {
            catalog,
            fetcher,
            normalizer,
            scratch_dir_name: scratch_dir_name.into(),
        }
    }

    /// Run one batch.
    ///
    /// # Errors
    ///
    /// Returns an error for fatal conditions: missing configuration,
    /// workspace setup or teardown, catalog retrieval, inventory scan,
    /// track numbering.
    /// Per-item failures are reported in [`BatchReport::failed`].
    pub fn run(&self, request: &BatchRequest) -> Result<BatchReport> {
        let mut phase = BatchPhase::Init;
        info!("Batch phase: {}", phase);

        let workspace =
            ScratchWorkspace::prepare(request.destination.join(&self.scratch_dir_name))?;
        advance(&mut phase, BatchPhase::WorkspaceReady);

        let result = self.process(&workspace, request, &mut phase);
        let closed = workspace.close();
        advance(&mut phase, BatchPhase::Done);

        match (result, closed) {
            (Ok(report), Ok(())) => {
                info!("Batch finished: {}", report.summary());
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), closed) => {
                if let Err(cleanup) = closed {
                    warn!("{}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn process(
        &self,
        workspace: &ScratchWorkspace,
        request: &BatchRequest,
        phase: &mut BatchPhase,
    ) -> Result<BatchReport> {
        advance(phase, BatchPhase::Syncing);

        let extension = self.normalizer.format().extension();
        let destination = request.destination.as_path();
        let local = inventory::scan(destination, extension)?;

        let mut report = BatchReport::default();
        let queue = match &request.source {
            BatchSource::Playlist { id } => {
                let catalog = self.catalog.as_deref().ok_or_else(|| {
                    Error::configuration("an API key is required to read a playlist")
                })?;
                let remote = fetch_all_items(catalog, id)?;
                let queue = synchronize(&remote, &local);
                report.found = remote.len();
                report.skipped = remote.len() - queue.len();
                queue
            }
            BatchSource::Single { identifier } => {
                let identifier = parse_video_identifier(identifier)?;
                report.found = 1;
                if inventory::contains_identifier(&local, &identifier) {
                    info!("{} is already present in {}", identifier, destination.display());
                    report.skipped = 1;
                    Vec::new()
                } else {
                    vec![RemoteItem::new(identifier, "")]
                }
            }
        };

        advance(phase, BatchPhase::Queued);
        if queue.is_empty() {
            info!("Nothing to download");
            return Ok(report);
        }

        let start =
            inventory::last_track_number(destination, request.album.as_deref(), extension)?;
        let entries = assign_track_numbers(queue, start)?;
        info!(
            "{} items to download, numbering after track {}",
            entries.len(),
            start
        );

        for (index, entry) in entries.iter().enumerate() {
            advance(phase, BatchPhase::Processing(index + 1));

            match self.process_item(workspace, entry, destination, request.album.as_deref()) {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    log_item_error(&entry.item.identifier, &e);
                    workspace.discard(&entry.item.identifier);
                    report.failed.push(ItemFailure {
                        identifier: entry.item.identifier.clone(),
                        title: entry.item.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    fn process_item(
        &self,
        workspace: &ScratchWorkspace,
        entry: &WorkQueueEntry,
        destination: &Path,
        album: Option<&str>,
    ) -> Result<NormalizeOutcome> {
        let mut fetched = self.fetcher.fetch(workspace, &entry.item.identifier)?;

        // Name after the playlist title so the next scan recognizes the file.
        if !entry.item.title.is_empty() {
            fetched.title.clone_from(&entry.item.title);
        }

        self.normalizer
            .normalize(&fetched, destination, album, entry.track_number)
    }
}

fn advance(phase: &mut BatchPhase, next: BatchPhase) {
    info!("Batch phase: {} -> {}", phase, next);
    *phase = next;
}

fn log_item_error(identifier: &str, e: &Error) {
    match e.kind() {
        ErrorKind::Transient => error!("Giving up on {} after retries: {}", identifier, e),
        ErrorKind::Item | ErrorKind::Precondition => {
            error!("Failed to process {}: {}", identifier, e);
        }
    }
}
