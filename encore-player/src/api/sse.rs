//! Server-Sent Events (SSE) per guild
//!
//! Streams one guild's `GuildEvent`s to connected clients.

use crate::api::server::AppContext;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use encore_common::GuildId;
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// GET /guilds/:guild_id/events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(guild_id = %guild_id, "New SSE client connected");

    let session = ctx.registry.get(guild_id).await;
    let mut rx = session.events.subscribe();
    let state = session.engine.state().await;

    let stream = async_stream::stream! {
        // Initial state so clients can render before the first change
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data(format!("connected:{}", state)));

        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => yield Ok(Event::default().event(event.event_type()).data(json)),
                    Err(e) => warn!("Failed to serialize event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(guild_id = %guild_id, skipped, "SSE client lagged, events dropped");
                }
                Err(RecvError::Closed) => {
                    debug!(guild_id = %guild_id, "Event channel closed, ending SSE stream");
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
