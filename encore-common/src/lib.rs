//! # Encore Common Library
//!
//! Shared code for the Encore playback orchestrator:
//! - Guild/channel identifiers
//! - Track data model
//! - Per-guild event types (GuildEvent) and the EventSink channel
//! - Bootstrap configuration loading
//! - Human-readable duration formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod ids;
pub mod track;

pub use error::{Error, Result};
pub use events::{EventSink, GuildEvent, PlayerState, QueueChangeTrigger};
pub use ids::{ChannelId, GuildId};
pub use track::{SourceKind, Track};
