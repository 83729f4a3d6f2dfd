//! Test helper modules for Encore player integration tests
//!
//! Provides reusable test infrastructure components:
//! - ScriptedTransport: voice transport whose sink events are fired by the test
//! - GatedSource: stream source that records calls and can hold or fail loads
//! - backend: fake HTTP backends served on 127.0.0.1:0
//! - event helpers with timeouts

#![allow(dead_code)]

pub mod backend;
pub mod fakes;

pub use backend::spawn_backend;
pub use fakes::{GatedSource, ScriptedTransport};

use encore_common::{GuildEvent, PlayerState, SourceKind, Track};
use std::time::Duration;
use tokio::sync::broadcast;

/// Upper bound for any single wait in these tests
pub const WAIT: Duration = Duration::from_secs(5);

pub fn track(name: &str) -> Track {
    Track::new(
        SourceKind::DirectLink,
        name,
        format!("https://files.example.com/{}.mp3", name),
    )
}

pub fn tracks(names: &[&str]) -> Vec<Track> {
    names.iter().map(|n| track(n)).collect()
}

pub fn titles(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|t| t.title().to_string()).collect()
}

/// Receive events until `pred` matches, failing the test after [`WAIT`]
pub async fn next_matching<F>(rx: &mut broadcast::Receiver<GuildEvent>, mut pred: F) -> GuildEvent
where
    F: FnMut(&GuildEvent) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event channel closed: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Wait for a transition into `state`
pub async fn wait_for_state(rx: &mut broadcast::Receiver<GuildEvent>, state: PlayerState) {
    next_matching(rx, |e| {
        matches!(e, GuildEvent::PlayerStateChanged { new_state, .. } if *new_state == state)
    })
    .await;
}

/// Collect the sequence of state transitions up to and including `until`
pub async fn states_until(
    rx: &mut broadcast::Receiver<GuildEvent>,
    until: PlayerState,
) -> Vec<PlayerState> {
    let mut seen = Vec::new();
    tokio::time::timeout(WAIT, async {
        loop {
            if let Ok(GuildEvent::PlayerStateChanged { new_state, .. }) = rx.recv().await {
                seen.push(new_state);
                if new_state == until {
                    return;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for state");
    seen
}

/// Let spawned tasks run to quiescence
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}
