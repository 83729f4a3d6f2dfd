//! HTTP control API
//!
//! REST endpoints per guild plus a per-guild SSE stream.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, serve, AppContext};
