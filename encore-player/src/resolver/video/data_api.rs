//! Data API v3 catalog
//!
//! Requires an API key. Quota exhaustion is reported as HTTP 403 with a
//! `quotaExceeded` reason and is mapped to RateLimited like a plain 429.

use super::{watch_url, VideoCatalog, VideoPlaylist};
use crate::error::ResolutionError;
use crate::resolver::http::{check_status, with_cookie};
use async_trait::async_trait;
use encore_common::{SourceKind, Track};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;

const BACKEND: &str = "Data API";

/// Maximum ids per `videos` request and items per `playlistItems` page
const PAGE_SIZE: usize = 50;

/// Upper bound on playlist pages fetched for one playlist
const MAX_PLAYLIST_PAGES: usize = 200;

const QUOTA_REASONS: &[&str] = &["quotaExceeded", "rateLimitExceeded", "dailyLimitExceeded"];

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct PlaylistInfo {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    id: SearchId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    video_id: Option<String>,
}

/// Video catalog backed by the official Data API
pub struct DataApiCatalog {
    client: Client,
    base: String,
    api_key: String,
    cookie: Option<String>,
}

impl DataApiCatalog {
    pub fn new(client: Client, base: &str, api_key: impl Into<String>, cookie: Option<String>) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            cookie,
        }
    }

    fn get(&self, resource: &str) -> RequestBuilder {
        let request = self
            .client
            .get(format!("{}/{}", self.base, resource))
            .query(&[("key", self.api_key.as_str())]);
        with_cookie(request, self.cookie.as_deref())
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ResolutionError> {
        let response = request
            .send()
            .await
            .map_err(|e| ResolutionError::Upstream(format!("{} request failed: {}", BACKEND, e)))?;

        if response.status() == 403 {
            let body = response.text().await.unwrap_or_default();
            if QUOTA_REASONS.iter().any(|reason| body.contains(reason)) {
                tracing::warn!("Data API quota exhausted");
                return Err(ResolutionError::RateLimited(BACKEND.to_string()));
            }
            return Err(ResolutionError::Upstream(format!(
                "{} refused the request (HTTP 403)",
                BACKEND
            )));
        }

        let response = check_status(response, BACKEND).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ResolutionError::Upstream(format!("{} returned invalid JSON: {}", BACKEND, e)))
    }

    /// Full details for a batch of ids, preserving the requested order
    ///
    /// Ids the API does not return (private or deleted videos) are dropped.
    async fn videos(&self, ids: &[String]) -> Result<Vec<Track>, ResolutionError> {
        let mut tracks = Vec::with_capacity(ids.len());

        for batch in ids.chunks(PAGE_SIZE) {
            let joined = batch.join(",");
            let request = self
                .get("videos")
                .query(&[("part", "snippet,contentDetails"), ("id", joined.as_str())]);
            let body: ListResponse<VideoItem> = self.fetch(request).await?;

            let mut by_id: HashMap<String, VideoItem> =
                body.items.into_iter().map(|item| (item.id.clone(), item)).collect();
            tracks.extend(batch.iter().filter_map(|id| by_id.remove(id)).map(to_track));
        }

        Ok(tracks)
    }

    async fn playlist_title(&self, list_id: &str) -> Result<String, ResolutionError> {
        let request = self
            .get("playlists")
            .query(&[("part", "snippet"), ("id", list_id)]);
        let body: ListResponse<PlaylistInfo> = self.fetch(request).await?;
        Ok(body
            .items
            .into_iter()
            .next()
            .map(|item| item.snippet.title)
            .unwrap_or_default())
    }
}

#[async_trait]
impl VideoCatalog for DataApiCatalog {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn video(&self, video_id: &str) -> Result<Track, ResolutionError> {
        self.videos(&[video_id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ResolutionError::NotFound(format!("video {}", video_id)))
    }

    async fn playlist(&self, list_id: &str) -> Result<VideoPlaylist, ResolutionError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PLAYLIST_PAGES {
            let page_size = PAGE_SIZE.to_string();
            let mut request = self.get("playlistItems").query(&[
                ("part", "snippet"),
                ("playlistId", list_id),
                ("maxResults", page_size.as_str()),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let body: ListResponse<PlaylistItem> = self.fetch(request).await?;
            ids.extend(
                body.items
                    .into_iter()
                    .filter_map(|item| item.snippet.resource_id.and_then(|r| r.video_id)),
            );

            match body.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        let tracks = self.videos(&ids).await?;
        if tracks.is_empty() {
            return Err(ResolutionError::NotFound(format!(
                "playlist {} is empty or private",
                list_id
            )));
        }

        let title = self.playlist_title(list_id).await?;
        tracing::info!(list_id = %list_id, tracks = tracks.len(), "Fetched playlist");

        Ok(VideoPlaylist { title, tracks })
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<Track>, ResolutionError> {
        let max_results = limit.clamp(1, PAGE_SIZE).to_string();
        let request = self.get("search").query(&[
            ("part", "snippet"),
            ("type", "video"),
            ("q", text),
            ("maxResults", max_results.as_str()),
        ]);
        let body: ListResponse<SearchItem> = self.fetch(request).await?;

        let ids: Vec<String> = body
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .take(limit)
            .collect();

        let tracks = self.videos(&ids).await?;
        if tracks.is_empty() {
            return Err(ResolutionError::NotFound(format!("no results for '{}'", text)));
        }
        Ok(tracks)
    }
}

fn to_track(item: VideoItem) -> Track {
    let duration = item
        .content_details
        .as_ref()
        .and_then(|d| parse_iso8601_duration(&d.duration))
        .unwrap_or(0);

    let thumbnail = ["high", "medium", "default"]
        .iter()
        .find_map(|q| item.snippet.thumbnails.get(*q))
        .map(|t| t.url.clone())
        .unwrap_or_default();

    Track::new(SourceKind::StreamingVideo, item.snippet.title, watch_url(&item.id))
        .with_duration(duration)
        .with_author(item.snippet.channel_title)
        .with_thumbnail(thumbnail)
}

/// Parse an ISO-8601 duration (`PT3M33S`, `PT1H2M5S`, `P1DT2H`) into seconds
///
/// Live streams report `P0D`, which parses as zero.
pub fn parse_iso8601_duration(input: &str) -> Option<u64> {
    let rest = input.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut total = 0u64;
    total += sum_components(date_part, &[('W', 604_800), ('D', 86_400)])?;
    if let Some(time) = time_part {
        if time.is_empty() {
            return None;
        }
        total += sum_components(time, &[('H', 3_600), ('M', 60), ('S', 1)])?;
    }
    Some(total)
}

fn sum_components(part: &str, units: &[(char, u64)]) -> Option<u64> {
    let mut total = 0u64;
    let mut digits = String::new();

    for c in part.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let (_, scale) = units.iter().find(|(unit, _)| *unit == c)?;
        let value: u64 = digits.parse().ok()?;
        total += value * scale;
        digits.clear();
    }

    // Trailing digits without a unit designator
    digits.is_empty().then_some(total)
}
