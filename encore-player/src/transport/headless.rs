//! Headless voice transport
//!
//! Consumes streams without producing sound. Used by the binary when no chat
//! gateway is attached and for dry runs against real backends: a track
//! "plays" for as long as its bytes take to download.

use super::{AudioSink, PlaybackTicket, SinkEvent, SinkEventKind, VoiceConnection, VoiceTransport};
use crate::error::TransportError;
use crate::resolver::ByteStream;
use async_trait::async_trait;
use encore_common::{ChannelId, GuildId};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transport whose sinks drain streams and report completion
#[derive(Debug, Default, Clone)]
pub struct HeadlessTransport;

impl HeadlessTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VoiceTransport for HeadlessTransport {
    fn create_sink(
        &self,
        guild_id: GuildId,
        events: mpsc::UnboundedSender<SinkEvent>,
    ) -> Arc<dyn AudioSink> {
        Arc::new(HeadlessSink {
            guild_id,
            events,
            active: Arc::new(Mutex::new(None)),
        })
    }

    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>, TransportError> {
        info!(guild_id = %guild_id, channel_id = %channel_id, "Joined voice channel (headless)");
        Ok(Arc::new(HeadlessConnection {
            guild_id,
            channel_id,
            subscribed: Mutex::new(None),
        }))
    }
}

struct ActiveStream {
    ticket: PlaybackTicket,
    cancel: CancellationToken,
    paused: watch::Sender<bool>,
}

type ActiveSlot = Arc<Mutex<Option<ActiveStream>>>;

fn with_slot<R>(slot: &ActiveSlot, f: impl FnOnce(&mut Option<ActiveStream>) -> R) -> R {
    // Poisoning cannot leave the slot half-written
    let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

struct HeadlessSink {
    guild_id: GuildId,
    events: mpsc::UnboundedSender<SinkEvent>,
    active: ActiveSlot,
}

impl HeadlessSink {
    fn with_active<R>(&self, f: impl FnOnce(&mut Option<ActiveStream>) -> R) -> R {
        with_slot(&self.active, f)
    }
}

impl AudioSink for HeadlessSink {
    fn play(&self, stream: ByteStream, ticket: PlaybackTicket) -> Result<(), TransportError> {
        let cancel = CancellationToken::new();
        let (paused_tx, paused_rx) = watch::channel(false);

        let previous = self.with_active(|slot| {
            slot.replace(ActiveStream {
                ticket,
                cancel: cancel.clone(),
                paused: paused_tx,
            })
        });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        debug!(guild_id = %self.guild_id, ticket = %ticket, "Headless sink playing");
        let slot = Arc::clone(&self.active);
        let events = self.events.clone();
        tokio::spawn(async move {
            let _ = events.send(SinkEvent::new(ticket, SinkEventKind::Started));
            let Some(outcome) = drain(stream, ticket, cancel, paused_rx).await else {
                return;
            };

            // The stream is over; a newer stream may already own the slot
            with_slot(&slot, |slot| {
                if slot.as_ref().is_some_and(|active| active.ticket == ticket) {
                    *slot = None;
                }
            });
            let _ = events.send(SinkEvent::new(ticket, outcome));
        });
        Ok(())
    }

    fn pause(&self) -> bool {
        self.with_active(|slot| match slot {
            Some(active) if !*active.paused.borrow() => {
                active.paused.send_replace(true);
                true
            }
            _ => false,
        })
    }

    fn resume(&self) -> bool {
        self.with_active(|slot| match slot {
            Some(active) if *active.paused.borrow() => {
                active.paused.send_replace(false);
                true
            }
            _ => false,
        })
    }

    fn stop(&self) {
        if let Some(active) = self.with_active(Option::take) {
            debug!(guild_id = %self.guild_id, ticket = %active.ticket, "Headless sink stopped");
            active.cancel.cancel();
        }
    }
}

/// Pull the stream to its end, honouring pause
///
/// Returns the event to report, or `None` when cancelled.
async fn drain(
    mut stream: ByteStream,
    ticket: PlaybackTicket,
    cancel: CancellationToken,
    mut paused: watch::Receiver<bool>,
) -> Option<SinkEventKind> {
    let mut received = 0usize;

    loop {
        while *paused.borrow() {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                changed = paused.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => received += bytes.len(),
                Some(Err(e)) => {
                    warn!(ticket = %ticket, error = %e, "Stream failed mid-playback");
                    return Some(SinkEventKind::Failed(e.to_string()));
                }
                None => {
                    debug!(ticket = %ticket, bytes = received, "Stream finished");
                    return Some(SinkEventKind::Finished);
                }
            }
        }
    }
}

struct HeadlessConnection {
    guild_id: GuildId,
    channel_id: ChannelId,
    subscribed: Mutex<Option<Arc<dyn AudioSink>>>,
}

#[async_trait]
impl VoiceConnection for HeadlessConnection {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    fn subscribe(&self, sink: Arc<dyn AudioSink>) {
        let mut guard = self.subscribed.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(sink);
    }

    async fn destroy(&self) {
        // The sink belongs to the engine and outlives the connection
        self.subscribed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        info!(guild_id = %self.guild_id, channel_id = %self.channel_id, "Left voice channel (headless)");
    }
}
