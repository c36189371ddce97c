//! Local inventory scanner.
//!
//! The destination directory is the only persisted state. An item is
//! considered present when a file named `<canonical name>.<ext>` sits
//! directly in it; the scan is not recursive.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{FileSystemError, Result};
use crate::metadata::extract_metadata;
use crate::naming::split_extension;

/// Logical names (file name minus extension) of the target-format files in
/// `destination`.
///
/// A missing directory yields an empty set.
///
/// # Errors
///
/// Returns [`FileSystemError::DirectoryUnavailable`] if the directory exists
/// but cannot be listed.
pub fn scan(destination: &Path, extension: &str) -> Result<HashSet<String>> {
    let names: HashSet<String> = matching_files(destination, extension)?
        .into_iter()
        .map(|(_, stem)| stem)
        .collect();

    debug!(
        "Found {} local .{} files in {}",
        names.len(),
        extension,
        destination.display()
    );
    Ok(names)
}

/// Highest track number tagged with `album` among the target-format files.
///
/// Returns 0 without an album, for a missing directory, or when no file
/// carries a matching album tag.
///
/// # Errors
///
/// Returns [`FileSystemError::DirectoryUnavailable`] if the directory exists
/// but cannot be listed.
pub fn last_track_number(destination: &Path, album: Option<&str>, extension: &str) -> Result<u32> {
    let Some(album) = album else {
        return Ok(0);
    };

    let mut last = 0;
    for (path, _) in matching_files(destination, extension)? {
        let metadata = match extract_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        if metadata.album.as_deref() == Some(album) {
            last = last.max(metadata.track_number.unwrap_or(0));
        }
    }

    debug!("Last track number for album '{}': {}", album, last);
    Ok(last)
}

/// Whether any logical name belongs to `identifier`.
#[must_use]
pub fn contains_identifier(local: &HashSet<String>, identifier: &str) -> bool {
    let suffix = format!("[{identifier}]");
    local.iter().any(|name| name.ends_with(&suffix))
}

fn matching_files(dir: &Path, extension: &str) -> Result<Vec<(PathBuf, String)>> {
    let unavailable = |e: io::Error| FileSystemError::DirectoryUnavailable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("Destination {} does not exist yet", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(unavailable(e).into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(unavailable)?;
        if !entry.file_type().map_err(unavailable)?.is_file() {
            continue;
        }

        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            debug!("Skipping non UTF-8 file name {:?}", file_name);
            continue;
        };

        if let (stem, Some(ext)) = split_extension(file_name)
            && ext.eq_ignore_ascii_case(extension)
        {
            files.push((entry.path(), stem.to_string()));
        }
    }

    Ok(files)
}
