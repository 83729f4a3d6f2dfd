//! Streaming-video backends
//!
//! Metadata, playlist and search queries go through a [`VideoCatalog`]
//! selected by `[video] backend`. Audio streams always come from the
//! configured Invidious instance, whichever catalog answered the metadata.

mod data_api;
mod invidious;

pub use data_api::DataApiCatalog;
pub use invidious::{InvidiousCatalog, InvidiousStreams};

use crate::error::ResolutionError;
use async_trait::async_trait;
use encore_common::Track;

/// Canonical watch URL stored on every video track
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Ordered members of a playlist
#[derive(Debug, Clone)]
pub struct VideoPlaylist {
    pub title: String,
    pub tracks: Vec<Track>,
}

/// Metadata source for streaming-video tracks
#[async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Backend name for logs and error messages
    fn name(&self) -> &'static str;

    /// Single video by id
    async fn video(&self, video_id: &str) -> Result<Track, ResolutionError>;

    /// Every member of a playlist, pages concatenated in order
    async fn playlist(&self, list_id: &str) -> Result<VideoPlaylist, ResolutionError>;

    /// Ranked search results, best first, at most `limit`
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<Track>, ResolutionError>;
}
