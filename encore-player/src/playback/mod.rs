//! Playback engine and queue management

pub mod engine;
pub mod queue;

pub use engine::{EngineOptions, PlaybackEngine};
pub use queue::TrackQueue;
