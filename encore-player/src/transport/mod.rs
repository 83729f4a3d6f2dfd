//! Voice transport seam
//!
//! The voice-I/O layer lives outside this crate. The engine talks to it
//! through three object-safe traits:
//!
//! - [`VoiceTransport`] creates per-guild sinks and joins channels
//! - [`AudioSink`] plays one byte stream at a time and reports back
//! - [`VoiceConnection`] is the live channel link; the engine only subscribes
//!   its sink and requests destruction
//!
//! Every stream handed to a sink carries a [`PlaybackTicket`]. Sink events
//! echo the ticket so the engine can ignore reports about streams it has
//! already replaced or stopped.

mod headless;

pub use headless::HeadlessTransport;

use crate::error::TransportError;
use crate::resolver::ByteStream;
use async_trait::async_trait;
use encore_common::{ChannelId, GuildId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Generation tag attached to a stream handed to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackTicket(pub u64);

impl fmt::Display for PlaybackTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Low-level player status reported by a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEventKind {
    /// First bytes reached the transport
    Started,
    /// Stream reached end-of-data
    Finished,
    /// Stream broke mid-playback
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkEvent {
    pub ticket: PlaybackTicket,
    pub kind: SinkEventKind,
}

impl SinkEvent {
    pub fn new(ticket: PlaybackTicket, kind: SinkEventKind) -> Self {
        Self { ticket, kind }
    }
}

/// Per-guild audio player owned by the engine
///
/// Methods are synchronous: they only hand work to the transport's own tasks.
pub trait AudioSink: Send + Sync {
    /// Replace whatever is playing with `stream`
    fn play(&self, stream: ByteStream, ticket: PlaybackTicket) -> Result<(), TransportError>;

    /// Hold the current stream. False when nothing was playing.
    fn pause(&self) -> bool;

    /// Continue a held stream. False when nothing was paused.
    fn resume(&self) -> bool;

    /// Drop the current stream without reporting Finished
    fn stop(&self);
}

/// Live audio link to one voice channel
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// Route a sink's audio into this connection
    fn subscribe(&self, sink: Arc<dyn AudioSink>);

    /// Leave the channel and release transport resources
    async fn destroy(&self);
}

/// Entry point into the voice-I/O layer
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Create the sink for a guild; status reports go to `events`
    fn create_sink(
        &self,
        guild_id: GuildId,
        events: mpsc::UnboundedSender<SinkEvent>,
    ) -> Arc<dyn AudioSink>;

    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError>;
}
