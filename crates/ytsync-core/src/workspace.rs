//! Scratch workspace lifecycle.
//!
//! Fetched payloads are staged in a scratch tree before being promoted to
//! the destination directory:
//!
//! ```text
//! <root>/
//!   audio/   raw audio streams, named <identifier>.<ext>
//!   images/  thumbnails, named <identifier>.jpg
//! ```
//!
//! [`ScratchWorkspace::prepare`] removes whatever a previous (possibly
//! interrupted) run left behind before creating a fresh tree, and
//! [`ScratchWorkspace::close`] removes it again. Dropping an unclosed
//! workspace removes the tree on a best-effort basis.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, WorkspaceError};

/// Name of the audio staging subdirectory.
pub const AUDIO_SUBDIR: &str = "audio";

/// Name of the image staging subdirectory.
pub const IMAGE_SUBDIR: &str = "images";

/// Process-scoped scratch area with known subdirectories.
#[derive(Debug)]
pub struct ScratchWorkspace {
    root: PathBuf,
    audio_dir: PathBuf,
    image_dir: PathBuf,
    closed: bool,
}

impl ScratchWorkspace {
    /// Clean any stale tree at `root`, then create a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::CleanupFailed`] if a stale tree cannot be
    /// removed, or [`WorkspaceError::CreateFailed`] if the new tree cannot be
    /// created.
    pub fn prepare(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        clean(&root)?;

        info!("Creating scratch workspace at {}", root.display());

        let audio_dir = root.join(AUDIO_SUBDIR);
        let image_dir = root.join(IMAGE_SUBDIR);

        for dir in [&root, &audio_dir, &image_dir] {
            fs::create_dir_all(dir).map_err(|e| WorkspaceError::CreateFailed {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(Self {
            root,
            audio_dir,
            image_dir,
            closed: false,
        })
    }

    /// Scratch root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory where raw audio streams are staged.
    #[must_use]
    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Directory where thumbnails are staged.
    #[must_use]
    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    /// Remove every staged file of `identifier`, audio and thumbnail alike.
    pub fn discard(&self, identifier: &str) {
        remove_item_files(&self.audio_dir, identifier);
        remove_item_files(&self.image_dir, identifier);
    }

    /// Remove the scratch tree.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::CleanupFailed`] if the tree cannot be removed.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        clean(&self.root)
    }
}

impl Drop for ScratchWorkspace {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = clean(&self.root) {
            warn!("Scratch workspace left behind: {}", e);
        }
    }
}

/// Remove the `<identifier>.*` files directly under `dir`.
///
/// Failures are logged and otherwise ignored.
pub fn remove_item_files(dir: &Path, identifier: &str) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot list {}: {}", dir.display(), e);
            return;
        }
    };

    let prefix = format!("{identifier}.");
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(&prefix) {
            continue;
        }
        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed scratch file {}", path.display()),
            Err(e) => debug!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

/// Remove a scratch tree if it exists.
///
/// Absence is not an error.
pub fn clean(root: &Path) -> Result<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => {
            info!("Cleaned scratch workspace {}", root.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No scratch workspace at {}, skipping", root.display());
            Ok(())
        }
        Err(e) => Err(WorkspaceError::CleanupFailed {
            path: root.to_path_buf(),
            reason: e.to_string(),
        }
        .into()),
    }
}
