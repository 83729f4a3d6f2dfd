//! Event types for the Encore per-guild notification channel
//!
//! Every guild session owns exactly one [`EventSink`]. The playback engine and
//! the disconnect watchdog publish into it; presentation layers (HTTP SSE, chat
//! replies) subscribe to it. There is no process-wide emitter: a subscriber
//! only ever sees the events of the guild it subscribed to.

mod playback_types;
mod queue_types;

pub use playback_types::PlayerState;
pub use queue_types::QueueChangeTrigger;

use crate::{GuildId, Track};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Per-guild events
///
/// Serialized with an internal `type` tag so they can be forwarded verbatim
/// over SSE.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GuildEvent {
    /// A track's stream was handed to the voice sink
    ///
    /// Triggers:
    /// - Presentation: "Now Playing" announcement
    SongStarted {
        guild_id: GuildId,
        /// Track now at queue position 0
        track: Track,
        /// Queue length including the started track
        queue_length: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track could not be materialized, or its stream broke mid-playback
    ///
    /// Triggers:
    /// - Presentation: error notice in the command channel
    PlayerError {
        guild_id: GuildId,
        /// Track that failed (None if the queue was already gone)
        track: Option<Track>,
        /// Human-readable failure description
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Player state changed
    PlayerStateChanged {
        guild_id: GuildId,
        old_state: PlayerState,
        new_state: PlayerState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue contents changed
    QueueChanged {
        guild_id: GuildId,
        /// Queue length after the change
        length: usize,
        trigger: QueueChangeTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session was torn down after the voice channel stayed empty
    IdleDisconnect {
        guild_id: GuildId,
        /// Grace period that elapsed without listeners
        grace_period_secs: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GuildEvent {
    /// Event name, used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            GuildEvent::SongStarted { .. } => "SongStarted",
            GuildEvent::PlayerError { .. } => "PlayerError",
            GuildEvent::PlayerStateChanged { .. } => "PlayerStateChanged",
            GuildEvent::QueueChanged { .. } => "QueueChanged",
            GuildEvent::IdleDisconnect { .. } => "IdleDisconnect",
        }
    }

    /// Guild the event belongs to
    pub fn guild_id(&self) -> GuildId {
        match self {
            GuildEvent::SongStarted { guild_id, .. }
            | GuildEvent::PlayerError { guild_id, .. }
            | GuildEvent::PlayerStateChanged { guild_id, .. }
            | GuildEvent::QueueChanged { guild_id, .. }
            | GuildEvent::IdleDisconnect { guild_id, .. } => *guild_id,
        }
    }
}

/// Per-guild event channel
///
/// Thin wrapper over a `tokio::sync::broadcast` channel. Cloning the sink
/// clones the sending half; all clones feed the same subscribers.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<GuildEvent>,
    capacity: usize,
}

impl EventSink {
    /// Creates a new sink buffering up to `capacity` events per subscriber
    ///
    /// Slow subscribers lose the oldest events (`RecvError::Lagged`).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<GuildEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: GuildEvent,
    ) -> Result<usize, broadcast::error::SendError<GuildEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GuildEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
