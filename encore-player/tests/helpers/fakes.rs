//! Scripted voice transport and gated stream source

use async_trait::async_trait;
use encore_common::{ChannelId, GuildId, Track};
use encore_player::error::{StreamError, TransportError};
use encore_player::resolver::{ByteStream, StreamSource};
use encore_player::transport::{
    AudioSink, PlaybackTicket, SinkEvent, SinkEventKind, VoiceConnection, VoiceTransport,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

// ============================================================================
// ScriptedTransport
// ============================================================================

#[derive(Default)]
struct GuildScript {
    events: Option<mpsc::UnboundedSender<SinkEvent>>,
    plays: Vec<PlaybackTicket>,
    stops: usize,
    paused: bool,
}

#[derive(Default)]
struct ScriptInner {
    guilds: Mutex<HashMap<GuildId, GuildScript>>,
    sinks_created: AtomicUsize,
    joins: Mutex<Vec<(GuildId, ChannelId)>>,
    destroy_calls: AtomicUsize,
    destroyed: AtomicUsize,
    destroy_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptInner {
    fn with_guild<R>(&self, guild_id: GuildId, f: impl FnOnce(&mut GuildScript) -> R) -> R {
        let mut guilds = self.guilds.lock().unwrap();
        f(guilds.entry(guild_id).or_default())
    }
}

/// Transport whose sinks never play anything on their own
///
/// Tests decide when a stream finishes or fails.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Arc<ScriptInner>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sinks_created(&self) -> usize {
        self.inner.sinks_created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Make every following `destroy` wait until the returned gate opens
    pub fn hold_destroy(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.inner.destroy_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Wait until `count` destroys have been entered, finished or not
    pub async fn wait_for_destroy_calls(&self, count: usize) {
        tokio::time::timeout(super::WAIT, async {
            while self.inner.destroy_calls.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for destroy");
    }

    pub fn joins(&self) -> Vec<(GuildId, ChannelId)> {
        self.inner.joins.lock().unwrap().clone()
    }

    /// Tickets handed to the guild's sink, in order
    pub fn plays(&self, guild_id: GuildId) -> Vec<PlaybackTicket> {
        self.inner.with_guild(guild_id, |g| g.plays.clone())
    }

    pub fn stops(&self, guild_id: GuildId) -> usize {
        self.inner.with_guild(guild_id, |g| g.stops)
    }

    pub fn last_ticket(&self, guild_id: GuildId) -> Option<PlaybackTicket> {
        self.inner.with_guild(guild_id, |g| g.plays.last().copied())
    }

    /// Report a sink event as the voice layer would
    pub fn fire(&self, guild_id: GuildId, ticket: PlaybackTicket, kind: SinkEventKind) {
        let sender = self.inner.with_guild(guild_id, |g| g.events.clone());
        sender
            .expect("no sink created for guild")
            .send(SinkEvent::new(ticket, kind))
            .expect("engine sink loop gone");
    }

    pub fn finish_current(&self, guild_id: GuildId) {
        let ticket = self.last_ticket(guild_id).expect("nothing was played");
        self.fire(guild_id, ticket, SinkEventKind::Finished);
    }

    pub fn fail_current(&self, guild_id: GuildId, message: &str) {
        let ticket = self.last_ticket(guild_id).expect("nothing was played");
        self.fire(guild_id, ticket, SinkEventKind::Failed(message.to_string()));
    }

    /// Wait until the guild's sink has received `count` streams
    pub async fn wait_for_plays(&self, guild_id: GuildId, count: usize) {
        tokio::time::timeout(super::WAIT, async {
            while self.plays(guild_id).len() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for sink plays");
    }
}

struct ScriptedSink {
    guild_id: GuildId,
    inner: Arc<ScriptInner>,
}

impl AudioSink for ScriptedSink {
    fn play(&self, _stream: ByteStream, ticket: PlaybackTicket) -> Result<(), TransportError> {
        self.inner.with_guild(self.guild_id, |g| {
            g.plays.push(ticket);
            g.paused = false;
        });
        Ok(())
    }

    fn pause(&self) -> bool {
        self.inner.with_guild(self.guild_id, |g| {
            let changed = !g.paused && !g.plays.is_empty();
            g.paused = true;
            changed
        })
    }

    fn resume(&self) -> bool {
        self.inner.with_guild(self.guild_id, |g| {
            let changed = g.paused;
            g.paused = false;
            changed
        })
    }

    fn stop(&self) {
        self.inner.with_guild(self.guild_id, |g| {
            g.stops += 1;
            g.paused = false;
        });
    }
}

struct ScriptedConnection {
    channel_id: ChannelId,
    inner: Arc<ScriptInner>,
}

#[async_trait]
impl VoiceConnection for ScriptedConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn subscribe(&self, _sink: Arc<dyn AudioSink>) {}

    async fn destroy(&self) {
        self.inner.destroy_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.inner.destroy_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.inner.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceTransport for ScriptedTransport {
    fn create_sink(
        &self,
        guild_id: GuildId,
        events: mpsc::UnboundedSender<SinkEvent>,
    ) -> Arc<dyn AudioSink> {
        self.inner.sinks_created.fetch_add(1, Ordering::SeqCst);
        self.inner.with_guild(guild_id, |g| g.events = Some(events));
        Arc::new(ScriptedSink {
            guild_id,
            inner: Arc::clone(&self.inner),
        })
    }

    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        self.inner.joins.lock().unwrap().push((guild_id, channel_id));
        Ok(Arc::new(ScriptedConnection {
            channel_id,
            inner: Arc::clone(&self.inner),
        }))
    }
}

// ============================================================================
// GatedSource
// ============================================================================

/// Stream source that records every materialization
///
/// Titles registered with [`GatedSource::gate`] block until released;
/// titles registered with [`GatedSource::fail`] return a network error.
#[derive(Default)]
pub struct GatedSource {
    calls: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    failing: Mutex<HashSet<String>>,
    completed: AtomicUsize,
}

impl GatedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold loads of `title` until the returned handle is notified
    pub fn gate(&self, title: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(title.to_string(), Arc::clone(&notify));
        notify
    }

    pub fn fail(&self, title: &str) {
        self.failing.lock().unwrap().insert(title.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Wait until `count` materializations have started
    pub async fn wait_for_calls(&self, count: usize) {
        tokio::time::timeout(super::WAIT, async {
            while self.calls().len() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for materialize calls");
    }
}

#[async_trait]
impl StreamSource for GatedSource {
    async fn materialize(&self, track: &Track) -> Result<ByteStream, StreamError> {
        let title = track.title().to_string();
        self.calls.lock().unwrap().push(title.clone());

        let gate = self.gates.lock().unwrap().get(&title).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failing = self.failing.lock().unwrap().contains(&title);
        self.completed.fetch_add(1, Ordering::SeqCst);
        if failing {
            return Err(StreamError::Network(format!("{} unreachable", title)));
        }
        Ok(Box::pin(futures::stream::empty()))
    }
}
