//! Source resolution
//!
//! Turns user input into tracks and tracks into byte streams. One backend per
//! source kind sits behind the single [`SourceResolver`] interface:
//!
//! | Source kind      | Metadata                      | Stream                |
//! |------------------|-------------------------------|-----------------------|
//! | streaming-video  | [`video::VideoCatalog`]       | Invidious instance    |
//! | audio-share      | SoundCloud api-v2             | progressive transcode |
//! | direct-link      | none (path segment is title)  | plain GET             |
//! | uploaded-file    | none (attachment name)        | plain GET             |
//!
//! Every backend call is a single awaited request bounded by the client
//! timeout. Nothing is retried here.

pub mod classify;
pub mod http;
pub mod soundcloud;
pub mod video;

use crate::error::{ResolutionError, StreamError};
use async_trait::async_trait;
use bytes::Bytes;
use classify::{classify, display_name, Query};
use encore_common::config::{TomlConfig, VideoBackendKind};
use encore_common::{SourceKind, Track};
use futures::Stream;
use soundcloud::SoundCloudClient;
use std::pin::Pin;
use std::sync::Arc;
use video::{DataApiCatalog, InvidiousCatalog, InvidiousStreams, VideoCatalog};

/// Audio bytes for one track, consumed by the voice sink
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// Opens byte streams for queued tracks
///
/// Called by the playback engine only when a track reaches queue position 0.
#[async_trait]
pub trait StreamSource: Send + Sync {
    async fn materialize(&self, track: &Track) -> Result<ByteStream, StreamError>;
}

/// Result of resolving one query
#[derive(Debug, Clone)]
pub enum ResolvedSet {
    Single(Track),
    Playlist { title: String, tracks: Vec<Track> },
}

impl ResolvedSet {
    pub fn len(&self) -> usize {
        match self {
            ResolvedSet::Single(_) => 1,
            ResolvedSet::Playlist { tracks, .. } => tracks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracks in queue order
    pub fn into_tracks(self) -> Vec<Track> {
        match self {
            ResolvedSet::Single(track) => vec![track],
            ResolvedSet::Playlist { tracks, .. } => tracks,
        }
    }
}

/// Unified resolver over all source backends
pub struct SourceResolver {
    client: reqwest::Client,
    catalog: Arc<dyn VideoCatalog>,
    video_streams: InvidiousStreams,
    audio_share: SoundCloudClient,
    mirror_hosts: Vec<String>,
}

impl SourceResolver {
    /// Build every backend from configuration, sharing one HTTP client
    pub fn from_config(config: &TomlConfig) -> crate::Result<Self> {
        let client = http::build_client(&config.http)?;
        let cookie = config.video.read_cookie()?;
        if cookie.is_some() {
            tracing::info!("Video backend credentials loaded");
        }

        let catalog: Arc<dyn VideoCatalog> = match config.video.backend {
            VideoBackendKind::Invidious => Arc::new(InvidiousCatalog::new(
                client.clone(),
                &config.video.invidious_instance,
                cookie.clone(),
            )),
            VideoBackendKind::DataApi => Arc::new(DataApiCatalog::new(
                client.clone(),
                &config.video.data_api_base,
                config.video.api_key.clone().unwrap_or_default(),
                cookie.clone(),
            )),
        };

        tracing::info!(
            catalog = catalog.name(),
            instance = %config.video.invidious_instance,
            "Source resolver ready"
        );

        Ok(Self {
            video_streams: InvidiousStreams::new(
                client.clone(),
                &config.video.invidious_instance,
                cookie,
            ),
            audio_share: SoundCloudClient::new(
                client.clone(),
                &config.audio_share.api_base,
                config.audio_share.client_id.clone(),
            ),
            catalog,
            mirror_hosts: config.video.mirror_hosts.clone(),
            client,
        })
    }

    /// Resolve user input into one track or an ordered playlist
    pub async fn resolve(&self, input: &str) -> Result<ResolvedSet, ResolutionError> {
        let query = classify(input, &self.mirror_hosts);
        tracing::debug!(input = %input, query = ?query, "Classified input");

        match query {
            Query::VideoPlaylist { list_id } => {
                let playlist = self.catalog.playlist(&list_id).await?;
                Ok(ResolvedSet::Playlist {
                    title: playlist.title,
                    tracks: playlist.tracks,
                })
            }
            Query::DirectLink { url } => Ok(ResolvedSet::Single(Track::new(
                SourceKind::DirectLink,
                display_name(&url),
                url.as_str(),
            ))),
            Query::AudioShareShortLink { url } => {
                let expanded = self.audio_share.expand_short_link(url.as_str()).await?;
                match classify(&expanded, &self.mirror_hosts) {
                    Query::AudioShare { url } => {
                        Ok(ResolvedSet::Single(self.audio_share.track(url.as_str()).await?))
                    }
                    _ => Err(ResolutionError::Unsupported(format!(
                        "short link {} does not lead to an audio-share track",
                        url
                    ))),
                }
            }
            Query::AudioShare { url } => {
                Ok(ResolvedSet::Single(self.audio_share.track(url.as_str()).await?))
            }
            Query::Video { video_id } => Ok(ResolvedSet::Single(self.catalog.video(&video_id).await?)),
            Query::UnrecognizedVideoLink { url } => Err(ResolutionError::Unsupported(format!(
                "no video id in {}",
                url
            ))),
            Query::Search { text } => {
                if text.is_empty() {
                    return Err(ResolutionError::NotFound("empty query".to_string()));
                }
                let top = self
                    .catalog
                    .search(&text, 1)
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ResolutionError::NotFound(format!("no results for '{}'", text)))?;
                Ok(ResolvedSet::Single(top))
            }
        }
    }

    /// Ranked search results for interactive selection
    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<Track>, ResolutionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ResolutionError::NotFound("empty query".to_string()));
        }
        self.catalog.search(text, limit).await
    }

    /// Track for a chat attachment; no resolution is performed
    pub fn attachment(name: &str, url: &str) -> Track {
        let title = if name.trim().is_empty() {
            url::Url::parse(url)
                .map(|u| display_name(&u))
                .unwrap_or_else(|_| url.to_string())
        } else {
            name.trim().to_string()
        };
        Track::new(SourceKind::UploadedFile, title, url)
    }
}

#[async_trait]
impl StreamSource for SourceResolver {
    async fn materialize(&self, track: &Track) -> Result<ByteStream, StreamError> {
        tracing::debug!(title = %track.title(), source = %track.source(), "Materializing stream");

        match track.source() {
            SourceKind::StreamingVideo => match classify(track.url(), &self.mirror_hosts) {
                Query::Video { video_id } => self.video_streams.open(&video_id).await,
                _ => Err(StreamError::FormatUnsupported(format!(
                    "{} is not a video link",
                    track.url()
                ))),
            },
            SourceKind::AudioShare => self.audio_share.open(track.url()).await,
            SourceKind::DirectLink | SourceKind::UploadedFile => {
                http::open_stream(self.client.get(track.url())).await
            }
        }
    }
}
