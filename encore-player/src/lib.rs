//! # Encore Player Library (encore-player)
//!
//! Multi-guild audio playback orchestration.
//!
//! **Purpose:** Resolve tracks from streaming-video, audio-share, direct-link
//! and uploaded-file sources, keep one queue and player state machine per
//! guild, leave voice channels that stay empty, and expose HTTP/SSE control.
//!
//! **Layout:**
//! - [`resolver`]: input classification and source backends
//! - [`transport`]: voice-I/O seam and the headless transport
//! - [`playback`]: per-guild queue and state machine
//! - [`session`]: guild registry, idle-disconnect watchdog, search offers
//! - [`api`]: Axum router and SSE

pub mod api;
pub mod error;
pub mod playback;
pub mod resolver;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use playback::PlaybackEngine;
pub use resolver::{ResolvedSet, SourceResolver, StreamSource};
pub use session::SessionRegistry;
