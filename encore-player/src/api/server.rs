//! HTTP server setup and routing
//!
//! Sets up the Axum router for guild control endpoints and per-guild SSE.

use crate::error::{Error, Result};
use crate::resolver::SourceResolver;
use crate::session::{SelectionOffers, SessionRegistry};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub registry: Arc<SessionRegistry>,
    pub resolver: Arc<SourceResolver>,
    pub offers: Arc<SelectionOffers>,
    /// Number of ranked results offered by `/search`
    pub search_results: usize,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    use super::handlers;

    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        .route("/guilds", get(handlers::list_guilds))

        // Voice
        .route("/guilds/:guild_id/connect", post(handlers::connect))
        .route("/guilds/:guild_id/occupancy", post(handlers::occupancy))

        // Adding tracks
        .route("/guilds/:guild_id/play", post(handlers::play))
        .route("/guilds/:guild_id/upload", post(handlers::upload))
        .route("/guilds/:guild_id/search", post(handlers::search))
        .route("/guilds/:guild_id/select", post(handlers::select))

        // Playback control
        .route("/guilds/:guild_id/skip", post(handlers::skip))
        .route("/guilds/:guild_id/pause", post(handlers::pause))
        .route("/guilds/:guild_id/resume", post(handlers::resume))
        .route("/guilds/:guild_id/stop", post(handlers::stop))
        .route("/guilds/:guild_id/clear", post(handlers::clear))
        .route("/guilds/:guild_id/shuffle", post(handlers::shuffle))

        // Views
        .route("/guilds/:guild_id/queue", get(handlers::queue))
        .route("/guilds/:guild_id/now-playing", get(handlers::now_playing))

        // SSE event stream
        .route("/guilds/:guild_id/events", get(super::sse::event_stream))

        // Attach application context
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Run the HTTP API until `shutdown` resolves
pub async fn serve<F>(ctx: AppContext, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
