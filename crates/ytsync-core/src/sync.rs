//! Remote/local differ and track numbering.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::RemoteItem;
use crate::error::{Error, Result};
use crate::naming::canonical_name;

/// A queued item with its assigned track number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkQueueEntry {
    /// Item to fetch.
    pub item: RemoteItem,
    /// Track number to tag the placed file with.
    pub track_number: u32,
}

/// Remote items with no local counterpart, in remote order.
///
/// An item is present locally when its cleaned canonical name (without
/// extension) is in `local`. Repeated identifiers are queued once.
#[must_use]
pub fn synchronize(remote: &[RemoteItem], local: &HashSet<String>) -> Vec<RemoteItem> {
    let mut queued = HashSet::new();
    let mut queue = Vec::new();

    for item in remote {
        let name = canonical_name(&item.title, &item.identifier, None, true);
        if local.contains(&name) {
            debug!("Already present: {}", name);
            continue;
        }
        if !queued.insert(item.identifier.as_str()) {
            debug!("Duplicate playlist entry for {}", item.identifier);
            continue;
        }
        queue.push(item.clone());
    }

    queue
}

/// Number `queue` as `start + 1 ..= start + N` in order.
///
/// # Errors
///
/// Returns [`Error::TrackNumbersExhausted`] if `start + N` does not fit in a
/// track number.
pub fn assign_track_numbers(queue: Vec<RemoteItem>, start: u32) -> Result<Vec<WorkQueueEntry>> {
    let count = queue.len();
    let exhausted = || Error::TrackNumbersExhausted { last: start, count };

    queue
        .into_iter()
        .zip(1_u32..)
        .map(|(item, offset)| {
            let track_number = start.checked_add(offset).ok_or_else(exhausted)?;
            Ok(WorkQueueEntry { item, track_number })
        })
        .collect()
}
