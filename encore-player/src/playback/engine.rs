//! Per-guild playback engine
//!
//! Owns one guild's queue and player state machine:
//!
//! ```text
//! Idle    --enqueue(first)/skip--> Loading
//! Loading --materialize ok------> Playing
//! Loading --materialize failed--> Errored   (PlayerError, head kept)
//! Playing --sink Finished-------> Loading   (head popped, queue nonempty)
//! Playing --sink Finished-------> Idle      (head popped, queue empty)
//! Playing --pause()-------------> Paused
//! Paused  --resume()------------> Playing
//! any     --stop()--------------> Idle      (queue cleared)
//! any     --sink Failed---------> Errored   (PlayerError)
//! ```
//!
//! All operations and sink events are serialized behind one async mutex.
//! Materialization runs without the lock: each load carries the generation it
//! was started under and is discarded if the generation moved meanwhile. The
//! stream handed to the sink is tagged with a [`PlaybackTicket`]; sink events
//! carrying any other ticket are ignored, so a stopped or replaced stream can
//! never pop the queue.

use super::queue::TrackQueue;
use crate::error::{CommandError, TransportError};
use crate::resolver::StreamSource;
use crate::transport::{
    AudioSink, PlaybackTicket, SinkEvent, SinkEventKind, VoiceConnection, VoiceTransport,
};
use chrono::Utc;
use encore_common::config::PlaybackConfig;
use encore_common::{
    ChannelId, EventSink, GuildEvent, GuildId, PlayerState, QueueChangeTrigger, Track,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

/// Engine behaviour switches taken from `[playback]`
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Drop a failed head and continue instead of halting in Errored
    pub skip_failed_tracks: bool,
}

impl From<&PlaybackConfig> for EngineOptions {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            skip_failed_tracks: config.skip_failed_tracks,
        }
    }
}

struct EngineState {
    queue: TrackQueue,
    player: PlayerState,
    /// Bumped whenever an in-flight load must be invalidated
    generation: u64,
    /// Ticket of the stream currently owned by the sink
    ticket: Option<PlaybackTicket>,
    connection: Option<Arc<dyn VoiceConnection>>,
}

/// Queue and player state machine for one guild
pub struct PlaybackEngine {
    guild_id: GuildId,
    state: Mutex<EngineState>,
    sink: Arc<dyn AudioSink>,
    source: Arc<dyn StreamSource>,
    transport: Arc<dyn VoiceTransport>,
    events: EventSink,
    options: EngineOptions,
}

impl PlaybackEngine {
    /// Create an engine and start consuming its sink's status reports
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        guild_id: GuildId,
        transport: Arc<dyn VoiceTransport>,
        source: Arc<dyn StreamSource>,
        events: EventSink,
        options: EngineOptions,
    ) -> Arc<Self> {
        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        let sink = transport.create_sink(guild_id, sink_tx);

        let engine = Arc::new(Self {
            guild_id,
            state: Mutex::new(EngineState {
                queue: TrackQueue::new(),
                player: PlayerState::Idle,
                generation: 0,
                ticket: None,
                connection: None,
            }),
            sink,
            source,
            transport,
            events,
            options,
        });

        tokio::spawn(run_sink_events(Arc::downgrade(&engine), sink_rx));
        debug!(guild_id = %guild_id, "Playback engine created");
        engine
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Append tracks, returning the new queue length
    ///
    /// Playback starts only when the queue was empty before the call.
    pub async fn enqueue(self: &Arc<Self>, tracks: Vec<Track>) -> usize {
        let mut state = self.state.lock().await;
        if tracks.is_empty() {
            return state.queue.len();
        }

        let was_empty = state.queue.is_empty();
        let added = tracks.len();
        let length = state.queue.extend(tracks);
        info!(guild_id = %self.guild_id, added, length, "Tracks enqueued");
        self.emit_queue_changed(&state, QueueChangeTrigger::Enqueue);

        if was_empty {
            self.begin_load(&mut state);
        }
        length
    }

    /// Drop the head and play the next track
    pub async fn skip(self: &Arc<Self>) -> Result<(), CommandError> {
        let mut state = self.state.lock().await;
        if state.queue.len() <= 1 {
            return Err(CommandError::InsufficientQueue);
        }

        if let Some(skipped) = state.queue.pop_head() {
            info!(guild_id = %self.guild_id, title = %skipped.title(), "Track skipped");
        }
        self.emit_queue_changed(&state, QueueChangeTrigger::Skip);
        self.begin_load(&mut state);
        Ok(())
    }

    /// Playing → Paused. False in any other state.
    pub async fn pause(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.player != PlayerState::Playing || !self.sink.pause() {
            return false;
        }
        self.transition(&mut state, PlayerState::Paused);
        true
    }

    /// Paused → Playing. False in any other state.
    pub async fn resume(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.player != PlayerState::Paused || !self.sink.resume() {
            return false;
        }
        self.transition(&mut state, PlayerState::Playing);
        true
    }

    /// Clear the queue, go Idle and release the voice connection
    ///
    /// The connection is destroyed before the state lock is released.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        state.ticket = None;
        self.sink.stop();

        if state.queue.clear() > 0 {
            self.emit_queue_changed(&state, QueueChangeTrigger::Stop);
        }
        self.transition(&mut state, PlayerState::Idle);

        if let Some(connection) = state.connection.take() {
            connection.destroy().await;
        }
        drop(state);
        info!(guild_id = %self.guild_id, "Playback stopped");
    }

    /// Remove queued tracks, returning how many were dropped
    ///
    /// An active head (Loading, Playing, Paused) survives. Otherwise the
    /// queue is emptied and the engine returns to Idle.
    pub async fn clear(&self) -> usize {
        let mut state = self.state.lock().await;

        let removed = if state.player.is_active() {
            state.queue.clear_keep_head()
        } else {
            state.generation += 1;
            state.ticket = None;
            self.sink.stop();
            let removed = state.queue.clear();
            self.transition(&mut state, PlayerState::Idle);
            removed
        };

        if removed > 0 {
            self.emit_queue_changed(&state, QueueChangeTrigger::Clear);
        }
        removed
    }

    /// Randomly permute the queue, holding the head unless Idle
    pub async fn shuffle(&self) -> usize {
        let mut rng = StdRng::from_entropy();
        self.shuffle_with(&mut rng).await
    }

    /// Shuffle with a caller-supplied generator
    ///
    /// Returns how many positions took part in the permutation.
    pub async fn shuffle_with<R: Rng + Send + ?Sized>(&self, rng: &mut R) -> usize {
        let mut state = self.state.lock().await;
        let keep_head = state.player != PlayerState::Idle;
        let shuffled = state.queue.shuffle(rng, keep_head);

        if shuffled > 1 {
            self.emit_queue_changed(&state, QueueChangeTrigger::Shuffle);
        }
        shuffled
    }

    /// Join a voice channel and route the engine's sink into it
    ///
    /// Joining the channel already connected is a no-op; a different channel
    /// replaces the existing connection.
    pub async fn connect(&self, channel_id: ChannelId) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.connection.as_ref() {
            if existing.channel_id() == channel_id {
                return Ok(());
            }
            existing.destroy().await;
            state.connection = None;
        }

        let joined = self.transport.join(self.guild_id, channel_id).await?;
        joined.subscribe(Arc::clone(&self.sink));
        state.connection = Some(joined);
        drop(state);

        info!(guild_id = %self.guild_id, channel_id = %channel_id, "Voice connection ready");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub async fn state(&self) -> PlayerState {
        self.state.lock().await.player
    }

    /// Queue contents in order (index 0 is the head)
    pub async fn queue(&self) -> Vec<Track> {
        self.state.lock().await.queue.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Head of the queue while it is loading, playing or paused
    pub async fn now_playing(&self) -> Option<Track> {
        let state = self.state.lock().await;
        if state.player.is_active() {
            state.queue.head().cloned()
        } else {
            None
        }
    }

    /// Voice channel currently joined, if any
    pub async fn connected_channel(&self) -> Option<ChannelId> {
        self.state
            .lock()
            .await
            .connection
            .as_ref()
            .map(|c| c.channel_id())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GuildEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Start materializing the head; caller holds the state lock
    fn begin_load(self: &Arc<Self>, state: &mut EngineState) {
        state.generation += 1;
        state.ticket = None;
        self.sink.stop();

        let Some(track) = state.queue.head().cloned() else {
            self.transition(state, PlayerState::Idle);
            return;
        };

        self.transition(state, PlayerState::Loading);

        let generation = state.generation;
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.complete_load(generation, track).await });
    }

    async fn complete_load(self: Arc<Self>, generation: u64, track: Track) {
        let result = self.source.materialize(&track).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(
                guild_id = %self.guild_id,
                title = %track.title(),
                "Discarding stale load"
            );
            return;
        }

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                self.handle_failure(&mut state, e.to_string());
                return;
            }
        };

        let ticket = PlaybackTicket(generation);
        if let Err(e) = self.sink.play(stream, ticket) {
            self.handle_failure(&mut state, e.to_string());
            return;
        }

        state.ticket = Some(ticket);
        self.transition(&mut state, PlayerState::Playing);
        info!(guild_id = %self.guild_id, title = %track.title(), ticket = %ticket, "Now playing");

        self.events.emit_lossy(GuildEvent::SongStarted {
            guild_id: self.guild_id,
            track,
            queue_length: state.queue.len(),
            timestamp: Utc::now(),
        });
    }

    /// The head failed to materialize or broke mid-stream
    fn handle_failure(self: &Arc<Self>, state: &mut EngineState, error: String) {
        state.ticket = None;
        let track = state.queue.head().cloned();
        warn!(
            guild_id = %self.guild_id,
            title = %track.as_ref().map(|t| t.title()).unwrap_or_default(),
            error = %error,
            "Playback failed"
        );

        self.events.emit_lossy(GuildEvent::PlayerError {
            guild_id: self.guild_id,
            track,
            error,
            timestamp: Utc::now(),
        });

        if self.options.skip_failed_tracks {
            state.queue.pop_head();
            self.emit_queue_changed(state, QueueChangeTrigger::FailedTrack);
            self.begin_load(state);
        } else {
            self.transition(state, PlayerState::Errored);
        }
    }

    // ------------------------------------------------------------------
    // Sink events
    // ------------------------------------------------------------------

    async fn handle_sink_event(self: &Arc<Self>, event: SinkEvent) {
        let mut state = self.state.lock().await;
        if state.ticket != Some(event.ticket) {
            debug!(guild_id = %self.guild_id, ticket = %event.ticket, "Ignoring stale sink event");
            return;
        }

        match event.kind {
            SinkEventKind::Started => {
                debug!(guild_id = %self.guild_id, ticket = %event.ticket, "Sink started");
            }
            SinkEventKind::Finished => {
                state.ticket = None;
                if let Some(finished) = state.queue.pop_head() {
                    debug!(guild_id = %self.guild_id, title = %finished.title(), "Track finished");
                }
                self.emit_queue_changed(&state, QueueChangeTrigger::Completion);
                self.begin_load(&mut state);
            }
            SinkEventKind::Failed(message) => {
                self.handle_failure(&mut state, message);
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn transition(&self, state: &mut EngineState, new_state: PlayerState) {
        let old_state = state.player;
        if old_state == new_state {
            return;
        }
        state.player = new_state;
        debug!(guild_id = %self.guild_id, from = %old_state, to = %new_state, "Player state changed");

        self.events.emit_lossy(GuildEvent::PlayerStateChanged {
            guild_id: self.guild_id,
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn emit_queue_changed(&self, state: &EngineState, trigger: QueueChangeTrigger) {
        self.events.emit_lossy(GuildEvent::QueueChanged {
            guild_id: self.guild_id,
            length: state.queue.len(),
            trigger,
            timestamp: Utc::now(),
        });
    }
}

/// Feed sink reports into the engine until the engine or the sink goes away
async fn run_sink_events(engine: Weak<PlaybackEngine>, mut rx: mpsc::UnboundedReceiver<SinkEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(engine) = engine.upgrade() else {
            break;
        };
        engine.handle_sink_event(event).await;
    }
}
