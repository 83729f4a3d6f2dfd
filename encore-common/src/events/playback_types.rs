//! Playback-related type definitions

use serde::{Deserialize, Serialize};

/// Player state of one guild
///
/// Exactly one per guild, owned by that guild's playback engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// Nothing is playing and nothing is being prepared
    #[default]
    Idle,
    /// The queue head's stream is being materialized
    Loading,
    /// The queue head is being streamed to the voice sink
    Playing,
    /// The queue head is held by the voice sink
    Paused,
    /// The queue head failed to materialize or broke mid-stream
    Errored,
}

impl PlayerState {
    /// True when queue index 0 is the track this state refers to
    pub fn is_active(self) -> bool {
        matches!(self, PlayerState::Loading | PlayerState::Playing | PlayerState::Paused)
    }
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Loading => write!(f, "loading"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Errored => write!(f, "errored"),
        }
    }
}
