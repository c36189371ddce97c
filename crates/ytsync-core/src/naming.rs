//! Deterministic file naming and identifier parsing.
//!
//! Every downloaded item is stored as `<title> [<identifier>].<ext>`. The
//! identifier suffix keeps names unique when two videos share a title, and
//! lets the local inventory be compared against the remote playlist without
//! reading any tags.
//!
//! # Example
//!
//! ```rust
//! use ytsync_core::naming::canonical_name;
//!
//! let name = canonical_name("AC/DC: Thunderstruck", "v2AC41dglnM", Some("mp3"), true);
//! assert_eq!(name, "ACDC Thunderstruck [v2AC41dglnM].mp3");
//! ```

use url::Url;

use crate::error::{FetchError, Result};

/// Characters removed from cleaned names.
pub const SPECIAL_CHARS: [char; 11] = ['<', '>', ':', '"', '\'', '/', '\\', '|', '?', '*', '.'];

/// Base URL for a single video page.
pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Build the canonical name for an item.
///
/// When `clean` is set, every character in [`SPECIAL_CHARS`] is removed from
/// the title and identifier part. The extension, if any, is appended after
/// cleaning so its dot survives.
#[must_use]
pub fn canonical_name(
    title: &str,
    identifier: &str,
    extension: Option<&str>,
    clean: bool,
) -> String {
    let mut name = format!("{title} [{identifier}]");

    if clean {
        name.retain(|c| !SPECIAL_CHARS.contains(&c));
    }

    if let Some(ext) = extension {
        name.push('.');
        name.push_str(ext);
    }

    name
}

/// Split a file name into stem and extension at the last `.`.
///
/// Returns `(name, None)` when there is no dot.
#[must_use]
pub fn split_extension(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (file_name, None),
    }
}

/// Watch page URL for a video identifier.
#[must_use]
pub fn watch_url(identifier: &str) -> String {
    format!("{WATCH_URL_PREFIX}{identifier}")
}

/// Extract a video identifier from a raw id or a URL.
///
/// Accepts `watch?v=<id>` URLs (any parameter order), `youtu.be/<id>` short
/// links, and bare identifiers.
pub fn parse_video_identifier(input: &str) -> Result<String> {
    let input = input.trim();

    if input.is_empty() {
        return Err(invalid(input, "identifier cannot be empty"));
    }

    let lower = input.to_lowercase();
    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return validate_identifier(input);
    }

    let url = Url::parse(input).map_err(|e| invalid(input, &e.to_string()))?;

    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
        return validate_identifier(&id);
    }

    if url.host_str().is_some_and(|host| host.ends_with("youtu.be"))
        && let Some(id) = url.path_segments().and_then(|mut s| s.next())
    {
        return validate_identifier(id);
    }

    Err(invalid(input, "could not find a video id in the URL"))
}

fn validate_identifier(id: &str) -> Result<String> {
    if id.is_empty() || id.len() > 64 {
        return Err(invalid(id, "identifier has an invalid length"));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(id, "identifier contains invalid characters"));
    }

    Ok(id.to_string())
}

fn invalid(input: &str, reason: &str) -> crate::error::Error {
    FetchError::InvalidReference {
        input: input.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
