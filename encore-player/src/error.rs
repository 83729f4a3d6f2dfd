//! Error types for encore-player
//!
//! One `thiserror` enum per concern. Resolution and command errors surface
//! synchronously to the caller; stream errors raised during automatic
//! advancement only ever become `PlayerError` events.

use thiserror::Error;

/// Failure to turn a user query into tracks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// Backend found nothing for the query
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input names a source this deployment cannot handle
    #[error("Unsupported source: {0}")]
    Unsupported(String),

    /// Backend refused the request because of quota or rate limiting
    #[error("Rate limited by {0}")]
    RateLimited(String),

    /// Network, HTTP or payload failure at the backend
    #[error("Upstream error: {0}")]
    Upstream(String),
}

/// Failure to open a byte stream for a track
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream network error: {0}")]
    Network(String),

    /// The resource is not audio (or not a format the sink accepts)
    #[error("Unsupported stream format: {0}")]
    FormatUnsupported(String),
}

/// Rejected playback command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Skip needs a track after the head
    #[error("Queue has no track to skip to")]
    InsufficientQueue,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Voice transport failure (join, sink hand-off)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Voice join failed: {0}")]
    Join(String),

    #[error("Audio sink rejected stream: {0}")]
    Sink(String),
}

/// Main error type for encore-player
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration or startup errors
    #[error(transparent)]
    Common(#[from] encore_common::Error),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),
}

/// Convenience Result type using encore-player Error
pub type Result<T> = std::result::Result<T, Error>;
