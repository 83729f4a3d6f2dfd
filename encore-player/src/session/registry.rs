//! Process-wide guild session registry
//!
//! Constructed once at startup and shared by reference. Sessions are created
//! lazily on the first command touching a guild and live until shutdown.

use super::watchdog::DisconnectWatchdog;
use crate::playback::{EngineOptions, PlaybackEngine};
use crate::resolver::StreamSource;
use crate::transport::VoiceTransport;
use encore_common::config::PlaybackConfig;
use encore_common::{EventSink, GuildId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

/// Everything owned on behalf of one guild
pub struct GuildSession {
    pub guild_id: GuildId,
    pub engine: Arc<PlaybackEngine>,
    pub watchdog: Arc<DisconnectWatchdog<PlaybackEngine>>,
    /// Dedicated channel shared by the engine and the watchdog
    pub events: EventSink,
}

/// Lazy map from guild to its session
pub struct SessionRegistry {
    sessions: RwLock<HashMap<GuildId, Arc<GuildSession>>>,
    transport: Arc<dyn VoiceTransport>,
    source: Arc<dyn StreamSource>,
    config: PlaybackConfig,
}

impl SessionRegistry {
    pub fn new(
        transport: Arc<dyn VoiceTransport>,
        source: Arc<dyn StreamSource>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            transport,
            source,
            config,
        }
    }

    /// Existing session, or a freshly wired one
    ///
    /// Concurrent callers for the same guild all receive the same session;
    /// construction happens exactly once.
    pub async fn get(&self, guild_id: GuildId) -> Arc<GuildSession> {
        if let Some(session) = self.sessions.read().await.get(&guild_id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(guild_id)
            .or_insert_with(|| self.build_session(guild_id));
        Arc::clone(session)
    }

    /// Session if one exists; never creates
    pub async fn find(&self, guild_id: GuildId) -> Option<Arc<GuildSession>> {
        self.sessions.read().await.get(&guild_id).cloned()
    }

    fn build_session(&self, guild_id: GuildId) -> Arc<GuildSession> {
        let events = EventSink::new(self.config.event_capacity);
        let engine = PlaybackEngine::new(
            guild_id,
            Arc::clone(&self.transport),
            Arc::clone(&self.source),
            events.clone(),
            EngineOptions::from(&self.config),
        );
        let watchdog = DisconnectWatchdog::new(
            guild_id,
            Arc::clone(&engine),
            Duration::from_secs(self.config.idle_disconnect_secs),
            events.clone(),
        );

        info!(guild_id = %guild_id, "Guild session created");
        Arc::new(GuildSession {
            guild_id,
            engine,
            watchdog,
            events,
        })
    }

    /// Forward a voice-occupancy change to the guild's watchdog
    pub async fn occupancy_changed(&self, guild_id: GuildId, listeners: u32) {
        let session = self.get(guild_id).await;
        session.watchdog.observe(listeners);
    }

    /// Guilds with a live session, in ascending id order
    pub async fn guild_ids(&self) -> Vec<GuildId> {
        let mut ids: Vec<GuildId> = self.sessions.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop every engine and cancel every watchdog
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<GuildSession>> =
            self.sessions.read().await.values().cloned().collect();

        for session in &sessions {
            session.watchdog.shutdown();
            session.engine.stop().await;
        }
        info!(guilds = sessions.len(), "All guild sessions stopped");
    }
}
