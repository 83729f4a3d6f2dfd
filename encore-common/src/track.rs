//! Track data model
//!
//! A `Track` is the resolved, playable unit that sits in a guild queue. It is
//! built once by a source backend and never mutated afterwards: fields are
//! private and only exposed through accessors. The `with_*` builders consume
//! the value, so they can only be used before the track is shared.

use crate::human_time::format_track_duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a track came from, which also selects how its stream is materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Streaming-video platform (or one of its mirror instances)
    StreamingVideo,
    /// Audio-sharing platform
    AudioShare,
    /// Plain HTTP link to an audio file
    DirectLink,
    /// File attached to a chat message
    UploadedFile,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::StreamingVideo => write!(f, "streaming-video"),
            SourceKind::AudioShare => write!(f, "audio-share"),
            SourceKind::DirectLink => write!(f, "direct-link"),
            SourceKind::UploadedFile => write!(f, "uploaded-file"),
        }
    }
}

/// Immutable descriptor of one playable audio item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    title: String,
    url: String,
    duration_seconds: u64,
    thumbnail_url: String,
    author: String,
    source: SourceKind,
}

impl Track {
    /// Create a track with no duration, thumbnail or author
    pub fn new(source: SourceKind, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            duration_seconds: 0,
            thumbnail_url: String::new(),
            author: String::new(),
            source,
        }
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail_url: impl Into<String>) -> Self {
        self.thumbnail_url = thumbnail_url.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Canonical page URL (or file URL for direct links and uploads)
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Length in seconds; zero when the backend did not report one
    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn thumbnail_url(&self) -> &str {
        &self.thumbnail_url
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Clock-style length for display (`3:33`, `1:02:05`, `--:--`)
    pub fn formatted_duration(&self) -> String {
        format_track_duration(self.duration_seconds)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.formatted_duration())
    }
}
