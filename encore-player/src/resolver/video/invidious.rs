//! Invidious-compatible mirror API client
//!
//! Serves as the default video catalog and as the only stream extractor.

use super::{watch_url, VideoCatalog, VideoPlaylist};
use crate::error::{ResolutionError, StreamError};
use crate::resolver::http::{fetch_json, open_stream, with_cookie};
use crate::resolver::ByteStream;
use async_trait::async_trait;
use encore_common::{SourceKind, Track};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashSet;

const BACKEND: &str = "Invidious";

/// Upper bound on playlist pages fetched for one playlist
const MAX_PLAYLIST_PAGES: usize = 200;

/// Thumbnail qualities in order of preference
const THUMBNAIL_PREFERENCE: &[&str] = &["high", "medium", "default"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvVideo {
    video_id: String,
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    length_seconds: u64,
    #[serde(default)]
    video_thumbnails: Vec<InvThumbnail>,
    #[serde(default)]
    adaptive_formats: Vec<InvFormat>,
}

#[derive(Debug, Deserialize)]
struct InvThumbnail {
    #[serde(default)]
    quality: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct InvFormat {
    #[serde(rename = "type", default)]
    mime_type: String,
    url: String,
    /// Reported as a decimal string by most instances, a number by some
    #[serde(default)]
    bitrate: serde_json::Value,
}

impl InvFormat {
    fn bitrate(&self) -> u64 {
        match &self.bitrate {
            serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
            serde_json::Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InvPlaylist {
    #[serde(default)]
    title: String,
    #[serde(default)]
    videos: Vec<InvVideo>,
}

/// Connection details for one instance
#[derive(Clone)]
struct Instance {
    client: Client,
    base: String,
    cookie: Option<String>,
}

impl Instance {
    fn new(client: Client, base: &str, cookie: Option<String>) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            cookie,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base, path));
        with_cookie(request, self.cookie.as_deref())
    }

    /// Proxied (`local=true`) URLs and thumbnails may be instance-relative
    fn absolute(&self, url: &str) -> String {
        if url.starts_with('/') && !url.starts_with("//") {
            format!("{}{}", self.base, url)
        } else if let Some(rest) = url.strip_prefix("//") {
            format!("https://{}", rest)
        } else {
            url.to_string()
        }
    }

    async fn video(&self, video_id: &str, local: bool) -> Result<InvVideo, ResolutionError> {
        let mut request = self.get(&format!("/api/v1/videos/{}", video_id));
        if local {
            request = request.query(&[("local", "true")]);
        }
        fetch_json(request, BACKEND).await
    }

    fn to_track(&self, video: InvVideo) -> Track {
        let thumbnail = THUMBNAIL_PREFERENCE
            .iter()
            .find_map(|q| video.video_thumbnails.iter().find(|t| t.quality == *q))
            .or_else(|| video.video_thumbnails.first())
            .map(|t| self.absolute(&t.url))
            .unwrap_or_default();

        Track::new(SourceKind::StreamingVideo, video.title, watch_url(&video.video_id))
            .with_duration(video.length_seconds)
            .with_author(video.author)
            .with_thumbnail(thumbnail)
    }
}

/// Video catalog backed by an Invidious instance
pub struct InvidiousCatalog {
    instance: Instance,
}

impl InvidiousCatalog {
    pub fn new(client: Client, base: &str, cookie: Option<String>) -> Self {
        Self {
            instance: Instance::new(client, base, cookie),
        }
    }
}

#[async_trait]
impl VideoCatalog for InvidiousCatalog {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn video(&self, video_id: &str) -> Result<Track, ResolutionError> {
        let video = self.instance.video(video_id, false).await?;
        tracing::debug!(video_id = %video_id, title = %video.title, "Fetched video metadata");
        Ok(self.instance.to_track(video))
    }

    async fn playlist(&self, list_id: &str) -> Result<VideoPlaylist, ResolutionError> {
        let mut seen = HashSet::new();
        let mut tracks = Vec::new();
        let mut title = None;

        for page in 1..=MAX_PLAYLIST_PAGES {
            let request = self
                .instance
                .get(&format!("/api/v1/playlists/{}", list_id))
                .query(&[("page", page)]);
            let body: InvPlaylist = fetch_json(request, BACKEND).await?;

            if title.is_none() {
                title = Some(body.title);
            }

            // Instances either return an empty page or repeat the last page
            // once the playlist is exhausted
            let before = tracks.len();
            for video in body.videos {
                if seen.insert(video.video_id.clone()) {
                    tracks.push(self.instance.to_track(video));
                }
            }
            if tracks.len() == before {
                break;
            }
        }

        if tracks.is_empty() {
            return Err(ResolutionError::NotFound(format!(
                "playlist {} is empty or private",
                list_id
            )));
        }

        tracing::info!(list_id = %list_id, tracks = tracks.len(), "Fetched playlist");

        Ok(VideoPlaylist {
            title: title.unwrap_or_default(),
            tracks,
        })
    }

    async fn search(&self, text: &str, limit: usize) -> Result<Vec<Track>, ResolutionError> {
        let request = self
            .instance
            .get("/api/v1/search")
            .query(&[("q", text), ("type", "video")]);
        let items: Vec<serde_json::Value> = fetch_json(request, BACKEND).await?;

        let tracks: Vec<Track> = items
            .into_iter()
            .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("video"))
            .filter_map(|item| serde_json::from_value::<InvVideo>(item).ok())
            .take(limit)
            .map(|video| self.instance.to_track(video))
            .collect();

        if tracks.is_empty() {
            return Err(ResolutionError::NotFound(format!("no results for '{}'", text)));
        }
        Ok(tracks)
    }
}

/// Audio stream extraction through an Invidious instance
pub struct InvidiousStreams {
    instance: Instance,
}

impl InvidiousStreams {
    pub fn new(client: Client, base: &str, cookie: Option<String>) -> Self {
        Self {
            instance: Instance::new(client, base, cookie),
        }
    }

    /// Open the highest-bitrate audio-only format of a video
    pub async fn open(&self, video_id: &str) -> Result<ByteStream, StreamError> {
        let video = self
            .instance
            .video(video_id, true)
            .await
            .map_err(|e| StreamError::Network(e.to_string()))?;

        let format = video
            .adaptive_formats
            .iter()
            .filter(|f| f.mime_type.starts_with("audio/"))
            .max_by_key(|f| f.bitrate())
            .ok_or_else(|| {
                StreamError::FormatUnsupported(format!("video {} has no audio-only format", video_id))
            })?;

        tracing::debug!(
            video_id = %video_id,
            mime = %format.mime_type,
            bitrate = format.bitrate(),
            "Selected audio format"
        );

        let url = self.instance.absolute(&format.url);
        let request = with_cookie(self.instance.client.get(url), self.instance.cookie.as_deref());
        open_stream(request).await
    }
}
