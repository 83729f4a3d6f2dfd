//! Audio-share backend (SoundCloud api-v2)

use crate::error::{ResolutionError, StreamError};
use crate::resolver::http::{fetch_json, open_stream};
use crate::resolver::ByteStream;
use encore_common::{SourceKind, Track};
use reqwest::Client;
use serde::Deserialize;

const BACKEND: &str = "SoundCloud";

#[derive(Debug, Deserialize)]
struct ScResource {
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    permalink_url: String,
    /// Milliseconds
    #[serde(default)]
    duration: u64,
    artwork_url: Option<String>,
    user: Option<ScUser>,
    media: Option<ScMedia>,
}

#[derive(Debug, Deserialize)]
struct ScUser {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Deserialize)]
struct ScMedia {
    #[serde(default)]
    transcodings: Vec<ScTranscoding>,
}

#[derive(Debug, Deserialize)]
struct ScTranscoding {
    url: String,
    format: ScFormat,
}

#[derive(Debug, Deserialize)]
struct ScFormat {
    protocol: String,
    #[serde(default)]
    mime_type: String,
}

/// Indirection target returned by a transcoding URL
#[derive(Debug, Deserialize)]
struct ScStreamLocation {
    url: String,
}

/// Audio-share API client
pub struct SoundCloudClient {
    client: Client,
    api_base: String,
    client_id: Option<String>,
}

impl SoundCloudClient {
    pub fn new(client: Client, api_base: &str, client_id: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            client_id: client_id.filter(|id| !id.is_empty()),
        }
    }

    fn client_id(&self) -> Result<&str, ResolutionError> {
        self.client_id.as_deref().ok_or_else(|| {
            ResolutionError::Unsupported("audio-share links need audio_share.client_id".to_string())
        })
    }

    async fn resolve_resource(&self, page_url: &str) -> Result<ScResource, ResolutionError> {
        let client_id = self.client_id()?;
        let request = self
            .client
            .get(format!("{}/resolve", self.api_base))
            .query(&[("url", page_url), ("client_id", client_id)]);
        fetch_json(request, BACKEND).await
    }

    /// Follow a short link's redirects to the canonical page URL
    pub async fn expand_short_link(&self, short_url: &str) -> Result<String, ResolutionError> {
        let response = self
            .client
            .get(short_url)
            .send()
            .await
            .map_err(|e| ResolutionError::Upstream(format!("{} short link failed: {}", BACKEND, e)))?;
        let final_url = response.url().to_string();
        tracing::debug!(short = %short_url, resolved = %final_url, "Expanded audio-share short link");
        Ok(final_url)
    }

    /// Single-track metadata for a track page
    pub async fn track(&self, page_url: &str) -> Result<Track, ResolutionError> {
        let resource = self.resolve_resource(page_url).await?;
        if resource.kind != "track" {
            return Err(ResolutionError::Unsupported(format!(
                "audio-share {} links are not playable",
                resource.kind
            )));
        }

        let author = resource.user.map(|u| u.username).unwrap_or_default();
        let url = if resource.permalink_url.is_empty() {
            page_url.to_string()
        } else {
            resource.permalink_url
        };

        Ok(Track::new(SourceKind::AudioShare, resource.title, url)
            .with_duration(resource.duration / 1000)
            .with_author(author)
            .with_thumbnail(resource.artwork_url.unwrap_or_default()))
    }

    /// Open the progressive (plain HTTP) transcoding of a track
    pub async fn open(&self, page_url: &str) -> Result<ByteStream, StreamError> {
        let resource = self.resolve_resource(page_url).await.map_err(|e| match e {
            ResolutionError::Unsupported(msg) => StreamError::FormatUnsupported(msg),
            other => StreamError::Network(other.to_string()),
        })?;

        let transcoding = resource
            .media
            .into_iter()
            .flat_map(|m| m.transcodings)
            .find(|t| t.format.protocol == "progressive")
            .ok_or_else(|| {
                StreamError::FormatUnsupported(format!("{} has no progressive transcoding", page_url))
            })?;

        tracing::debug!(mime = %transcoding.format.mime_type, "Selected audio-share transcoding");

        let client_id = self.client_id.as_deref().unwrap_or_default();
        let request = self
            .client
            .get(&transcoding.url)
            .query(&[("client_id", client_id)]);
        let location: ScStreamLocation = fetch_json(request, BACKEND)
            .await
            .map_err(|e| StreamError::Network(e.to_string()))?;

        open_stream(self.client.get(location.url)).await
    }
}
