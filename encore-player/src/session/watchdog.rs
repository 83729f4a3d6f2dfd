//! Idle-disconnect supervisor
//!
//! Watches voice-occupancy transitions for one guild. When the listener count
//! drops to zero a single-shot timer is armed; any nonzero count cancels it.
//! If the grace period elapses uninterrupted the target is torn down exactly
//! once and an `IdleDisconnect` event is emitted.

use crate::playback::PlaybackEngine;
use async_trait::async_trait;
use chrono::Utc;
use encore_common::{EventSink, GuildEvent, GuildId};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Something that can be shut down when its channel stays empty
#[async_trait]
pub trait IdleTeardown: Send + Sync + 'static {
    async fn teardown(&self);
}

#[async_trait]
impl IdleTeardown for PlaybackEngine {
    /// Stopping releases the voice connection
    async fn teardown(&self) {
        self.stop().await;
    }
}

struct WatchState {
    /// Last observed listener count (None before the first observation)
    last: Option<u32>,
    pending: Option<CancellationToken>,
    /// Identifies the armed timer; expiries from older timers are ignored
    epoch: u64,
}

/// Per-guild idle-disconnect timer
pub struct DisconnectWatchdog<T: IdleTeardown> {
    guild_id: GuildId,
    target: Arc<T>,
    grace: Duration,
    events: EventSink,
    state: Mutex<WatchState>,
}

impl<T: IdleTeardown> DisconnectWatchdog<T> {
    pub fn new(guild_id: GuildId, target: Arc<T>, grace: Duration, events: EventSink) -> Arc<Self> {
        Arc::new(Self {
            guild_id,
            target,
            grace,
            events,
            state: Mutex::new(WatchState {
                last: None,
                pending: None,
                epoch: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, WatchState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Feed the current human listener count
    ///
    /// Must be called from within a tokio runtime.
    pub fn observe(self: &Arc<Self>, listeners: u32) {
        let mut state = self.lock();
        let previous = state.last.replace(listeners);

        if listeners > 0 {
            if let Some(token) = state.pending.take() {
                token.cancel();
                state.epoch += 1;
                debug!(guild_id = %self.guild_id, listeners, "Listener returned, idle timer cancelled");
            }
            return;
        }

        if previous == Some(0) {
            return;
        }

        // Transition to zero (or first observation of zero)
        if let Some(token) = state.pending.take() {
            token.cancel();
        }
        state.epoch += 1;
        let epoch = state.epoch;
        let token = CancellationToken::new();
        state.pending = Some(token.clone());
        drop(state);

        debug!(
            guild_id = %self.guild_id,
            grace_secs = self.grace.as_secs(),
            "Voice channel empty, idle timer armed"
        );

        let watchdog = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(watchdog.grace) => watchdog.expire(epoch).await,
            }
        });
    }

    async fn expire(&self, epoch: u64) {
        {
            let mut state = self.lock();
            if state.epoch != epoch || state.pending.is_none() {
                return;
            }
            state.pending = None;
        }

        info!(
            guild_id = %self.guild_id,
            grace_secs = self.grace.as_secs(),
            "No listeners left, disconnecting"
        );
        self.target.teardown().await;

        self.events.emit_lossy(GuildEvent::IdleDisconnect {
            guild_id: self.guild_id,
            grace_period_secs: self.grace.as_secs(),
            timestamp: Utc::now(),
        });
    }

    /// True while a timer is pending
    pub fn is_armed(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Cancel any pending timer (process shutdown)
    pub fn shutdown(&self) {
        let mut state = self.lock();
        if let Some(token) = state.pending.take() {
            token.cancel();
        }
        state.epoch += 1;
    }
}
