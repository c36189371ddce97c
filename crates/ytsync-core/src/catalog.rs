//! Remote catalog reader.
//!
//! Reads a YouTube playlist through the YouTube Data API v3. The API is
//! paginated with an opaque continuation token: the first request carries no
//! token and each response may return a `nextPageToken` for the next one.
//! The last page simply omits it.
//!
//! Responses are decoded into explicit structures at this boundary so that
//! a shape mismatch fails here rather than deep inside the pipeline.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::{CatalogError, Error, Result};
use crate::retry::RetryPolicy;

/// Default API root.
pub const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Maximum page size accepted by the playlistItems endpoint.
pub const MAX_RESULTS_PER_PAGE: u32 = 50;

/// One item of the remote playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Video identifier.
    pub identifier: String,
    /// Video title as listed in the playlist.
    pub title: String,
    /// The item exactly as the API returned it.
    pub raw_metadata: serde_json::Value,
}

impl RemoteItem {
    /// Create an item with empty raw metadata.
    pub fn new(identifier: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: title.into(),
            raw_metadata: serde_json::Value::Null,
        }
    }
}

/// Summary of a playlist, from the playlists endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogDescription {
    /// Playlist title.
    pub title: String,
    /// Owning channel.
    pub channel_title: String,
    /// Number of playlists matched by the lookup (0 or 1).
    pub total_results: u32,
}

impl std::fmt::Display for CatalogDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Playlist name - {}, channel title - {}",
            self.title, self.channel_title
        )
    }
}

/// `pageInfo` block shared by list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Total number of results across all pages.
    pub total_results: u32,
    /// Number of results per page.
    pub results_per_page: u32,
}

impl PageInfo {
    /// Number of pages, rounded up.
    #[must_use]
    pub const fn total_pages(&self) -> u32 {
        if self.results_per_page == 0 {
            return 0;
        }
        self.total_results.div_ceil(self.results_per_page)
    }
}

/// One decoded page of playlist items.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    /// Paging counters.
    pub page_info: PageInfo,
    /// Items on this page, in server order.
    pub items: Vec<RemoteItem>,
    /// Token for the following page, absent on the last page.
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItemsPage {
    page_info: PageInfo,
    items: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemResource {
    snippet: ItemSnippet,
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemSnippet {
    title: String,
    #[serde(default)]
    channel_title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    video_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistsResponse {
    page_info: PageInfo,
    #[serde(default)]
    items: Vec<PlaylistResource>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    snippet: ItemSnippet,
}

impl CatalogPage {
    /// Decode a playlistItems response body.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Decode`] if the body does not have the
    /// expected shape.
    pub fn from_json(url: &str, body: &str) -> Result<Self> {
        let raw: RawItemsPage = serde_json::from_str(body).map_err(|e| decode_error(url, &e))?;

        let items = raw
            .items
            .into_iter()
            .map(|value| {
                let resource: PlaylistItemResource =
                    serde_json::from_value(value.clone()).map_err(|e| decode_error(url, &e))?;
                Ok(RemoteItem {
                    identifier: resource.content_details.video_id,
                    title: resource.snippet.title,
                    raw_metadata: value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            page_info: raw.page_info,
            items,
            next_page_token: raw.next_page_token.filter(|token| !token.is_empty()),
        })
    }
}

impl CatalogDescription {
    /// Decode a playlists response body.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Decode`] if the body does not have the
    /// expected shape.
    pub fn from_json(url: &str, body: &str) -> Result<Self> {
        let response: PlaylistsResponse =
            serde_json::from_str(body).map_err(|e| decode_error(url, &e))?;

        let total_results = response.page_info.total_results;
        match response.items.into_iter().next() {
            Some(playlist) => Ok(Self {
                title: playlist.snippet.title,
                channel_title: playlist.snippet.channel_title.unwrap_or_default(),
                total_results,
            }),
            None if total_results == 0 => Ok(Self {
                title: String::new(),
                channel_title: String::new(),
                total_results: 0,
            }),
            None => Err(CatalogError::Decode {
                url: url.to_string(),
                reason: format!("totalResults is {total_results} but items is empty"),
            }
            .into()),
        }
    }
}

fn decode_error(url: &str, e: &serde_json::Error) -> Error {
    CatalogError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    }
    .into()
}

/// Source of playlist pages.
#[cfg_attr(test, mockall::automock)]
pub trait CatalogSource {
    /// Look up the playlist itself.
    fn describe(&self, catalog_id: &str) -> Result<CatalogDescription>;

    /// Fetch one page of items. `None` requests the first page.
    fn fetch_page(&self, catalog_id: &str, page_token: Option<String>) -> Result<CatalogPage>;
}

/// Read every item of a playlist, in page order.
///
/// # Errors
///
/// Returns [`CatalogError::NotFound`] if the playlist lookup reports zero
/// results, and propagates any page fetch or decode error.
pub fn fetch_all_items<S>(source: &S, catalog_id: &str) -> Result<Vec<RemoteItem>>
where
    S: CatalogSource + ?Sized,
{
    info!("Retrieving information about playlist with id = {}", catalog_id);

    let description = source.describe(catalog_id)?;
    if description.total_results == 0 {
        info!("No playlist was found with id = {}", catalog_id);
        return Err(CatalogError::NotFound {
            catalog_id: catalog_id.to_string(),
        }
        .into());
    }
    info!("{}", description);

    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut page = 0;

    loop {
        let response = source.fetch_page(catalog_id, page_token.take())?;
        page += 1;

        if response.page_info.total_results == 0 {
            info!("No videos in playlist {}", catalog_id);
        }
        info!(
            "Processing page {} of {}",
            page,
            response.page_info.total_pages()
        );

        items.extend(response.items);

        page_token = response.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    info!("Retrieved {} videos from playlist {}", items.len(), catalog_id);
    Ok(items)
}

/// YouTube Data API v3 client.
pub struct YouTubeDataApi {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl YouTubeDataApi {
    /// Create a client for the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        Self::with_base_url(api_key, YOUTUBE_API_URL, timeout, retry)
    }

    /// Create a client against a different API root.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            retry,
        })
    }

    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> Result<(Url, String)> {
        let base = format!("{}/{resource}", self.base_url.trim_end_matches('/'));
        let redacted = Url::parse_with_params(&base, params)
            .map_err(|e| Error::configuration(format!("Invalid API URL {base}: {e}")))?;

        let mut url = redacted.clone();
        url.query_pairs_mut().append_pair("key", &self.api_key);

        Ok((url, redacted.to_string()))
    }

    fn get_text(&self, url: &Url, shown: &str) -> Result<String> {
        self.retry.run("catalog request", || {
            debug!("Request to: {}", shown);

            let response = self.client.get(url.clone()).send().map_err(|e| {
                Error::from(CatalogError::BadResponse {
                    url: shown.to_string(),
                    reason: e.without_url().to_string(),
                })
            })?;

            let status = response.status();
            if status.is_server_error() {
                return Err(CatalogError::BadResponse {
                    url: shown.to_string(),
                    reason: format!("server returned {status}"),
                }
                .into());
            }
            if !status.is_success() {
                return Err(CatalogError::Http {
                    url: shown.to_string(),
                    status: status.as_u16(),
                }
                .into());
            }

            response.text().map_err(|e| {
                CatalogError::BadResponse {
                    url: shown.to_string(),
                    reason: format!("failed to read body: {}", e.without_url()),
                }
                .into()
            })
        })
    }
}

impl CatalogSource for YouTubeDataApi {
    fn describe(&self, catalog_id: &str) -> Result<CatalogDescription> {
        let (url, shown) =
            self.endpoint("playlists", &[("part", "snippet"), ("id", catalog_id)])?;
        let body = self.get_text(&url, &shown)?;
        CatalogDescription::from_json(&shown, &body)
    }

    fn fetch_page(&self, catalog_id: &str, page_token: Option<String>) -> Result<CatalogPage> {
        let max_results = MAX_RESULTS_PER_PAGE.to_string();
        let mut params = vec![
            ("part", "id,contentDetails,snippet"),
            ("maxResults", max_results.as_str()),
            ("playlistId", catalog_id),
        ];
        if let Some(token) = page_token.as_deref() {
            params.push(("pageToken", token));
        }

        let (url, shown) = self.endpoint("playlistItems", &params)?;
        let body = self.get_text(&url, &shown)?;
        CatalogPage::from_json(&shown, &body)
    }
}
