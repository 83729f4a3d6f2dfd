//! HTTP request handlers
//!
//! Each handler looks up (or lazily creates) the guild's session and calls
//! one engine operation. Errors are mapped onto status codes here and nowhere
//! else.

use crate::api::server::AppContext;
use crate::error::{CommandError, ResolutionError, TransportError};
use crate::resolver::{ResolvedSet, SourceResolver};
use crate::session::SelectionError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use encore_common::human_time::format_total_duration;
use encore_common::{ChannelId, GuildId, PlayerState, Track};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Queue view page size
pub const QUEUE_PAGE_SIZE: usize = 10;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    guilds: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct GuildListResponse {
    guilds: Vec<GuildId>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    channel_id: ChannelId,
}

#[derive(Debug, Deserialize)]
pub struct OccupancyRequest {
    listeners: u32,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    name: String,
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub added: usize,
    pub queue_length: usize,
    /// Set when a playlist was resolved
    pub playlist_title: Option<String>,
    /// First added track
    pub track: Track,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    query: String,
    requester: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResult {
    pub index: usize,
    pub title: String,
    pub author: String,
    pub duration: String,
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub offer_id: Uuid,
    pub expires_in_secs: u64,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    offer_id: Uuid,
    index: usize,
    requester: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub state: PlayerState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    page: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueEntry {
    /// 0 is the head
    pub position: usize,
    pub track: Track,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueResponse {
    pub state: PlayerState,
    pub total: usize,
    pub page: usize,
    pub pages: usize,
    pub total_duration: String,
    pub entries: Vec<QueueEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NowPlayingResponse {
    pub state: PlayerState,
    pub track: Option<Track>,
    pub duration: Option<String>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn error_response(status: StatusCode, message: impl ToString) -> ApiError {
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", message.to_string()),
        }),
    )
}

fn resolution_error(e: ResolutionError) -> ApiError {
    let status = match &e {
        ResolutionError::NotFound(_) => StatusCode::NOT_FOUND,
        ResolutionError::Unsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ResolutionError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        ResolutionError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    warn!(error = %e, "Resolution failed");
    error_response(status, e)
}

fn command_error(e: CommandError) -> ApiError {
    error_response(StatusCode::CONFLICT, e)
}

fn transport_error(e: TransportError) -> ApiError {
    warn!(error = %e, "Voice transport failed");
    error_response(StatusCode::BAD_GATEWAY, e)
}

fn selection_error(e: SelectionError) -> ApiError {
    let status = match &e {
        SelectionError::Expired | SelectionError::Unknown => StatusCode::GONE,
        SelectionError::NotRequester => StatusCode::FORBIDDEN,
        SelectionError::OutOfRange { .. } => StatusCode::BAD_REQUEST,
    };
    error_response(status, e)
}

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "encore-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        guilds: ctx.registry.len().await,
    })
}

/// GET /guilds - Guilds with a live session
pub async fn list_guilds(State(ctx): State<AppContext>) -> Json<GuildListResponse> {
    Json(GuildListResponse {
        guilds: ctx.registry.guild_ids().await,
    })
}

// ============================================================================
// Voice Endpoints
// ============================================================================

/// POST /guilds/:guild_id/connect - Join a voice channel
pub async fn connect(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<StatusResponse> {
    let session = ctx.registry.get(guild_id).await;
    session
        .engine
        .connect(req.channel_id)
        .await
        .map_err(transport_error)?;
    Ok(ok())
}

/// POST /guilds/:guild_id/occupancy - Report human listeners in the voice channel
pub async fn occupancy(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
    Json(req): Json<OccupancyRequest>,
) -> Json<StatusResponse> {
    ctx.registry.occupancy_changed(guild_id, req.listeners).await;
    ok()
}

// ============================================================================
// Enqueue Endpoints
// ============================================================================

async fn enqueue_set(
    ctx: &AppContext,
    guild_id: GuildId,
    set: ResolvedSet,
) -> ApiResult<EnqueueResponse> {
    let playlist_title = match &set {
        ResolvedSet::Playlist { title, .. } => Some(title.clone()),
        ResolvedSet::Single(_) => None,
    };

    let tracks = set.into_tracks();
    let Some(first) = tracks.first().cloned() else {
        return Err(error_response(StatusCode::NOT_FOUND, "nothing to enqueue"));
    };
    let added = tracks.len();

    let session = ctx.registry.get(guild_id).await;
    let queue_length = session.engine.enqueue(tracks).await;

    Ok(Json(EnqueueResponse {
        added,
        queue_length,
        playlist_title,
        track: first,
    }))
}

/// POST /guilds/:guild_id/play - Resolve a URL or search text and enqueue it
pub async fn play(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
    Json(req): Json<PlayRequest>,
) -> ApiResult<EnqueueResponse> {
    info!(guild_id = %guild_id, query = %req.query, "Play requested");
    let set = ctx
        .resolver
        .resolve(&req.query)
        .await
        .map_err(resolution_error)?;
    enqueue_set(&ctx, guild_id, set).await
}

/// POST /guilds/:guild_id/upload - Enqueue a chat attachment
pub async fn upload(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
    Json(req): Json<UploadRequest>,
) -> ApiResult<EnqueueResponse> {
    if url::Url::parse(&req.url).is_err() {
        return Err(error_response(StatusCode::BAD_REQUEST, "attachment url is not a URL"));
    }
    let track = SourceResolver::attachment(&req.name, &req.url);
    enqueue_set(&ctx, guild_id, ResolvedSet::Single(track)).await
}

/// POST /guilds/:guild_id/search - Offer ranked results for selection
pub async fn search(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let tracks = ctx
        .resolver
        .search(&req.query, ctx.search_results)
        .await
        .map_err(resolution_error)?;

    let results = tracks
        .iter()
        .enumerate()
        .map(|(index, track)| SearchResult {
            index,
            title: track.title().to_string(),
            author: track.author().to_string(),
            duration: track.formatted_duration(),
            url: track.url().to_string(),
        })
        .collect();

    let offer_id = ctx.offers.offer(guild_id, req.requester, tracks);

    Ok(Json(SearchResponse {
        offer_id,
        expires_in_secs: ctx.offers.window().as_secs(),
        results,
    }))
}

/// POST /guilds/:guild_id/select - Pick one result of a search offer
pub async fn select(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<EnqueueResponse> {
    let track = ctx
        .offers
        .take(guild_id, req.offer_id, req.requester.as_deref(), req.index)
        .map_err(selection_error)?;
    enqueue_set(&ctx, guild_id, ResolvedSet::Single(track)).await
}

// ============================================================================
// Playback Control Endpoints
// ============================================================================

/// POST /guilds/:guild_id/skip - Skip to the next track
pub async fn skip(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
) -> ApiResult<StatusResponse> {
    let session = ctx.registry.get(guild_id).await;
    session.engine.skip().await.map_err(command_error)?;
    Ok(ok())
}

/// POST /guilds/:guild_id/pause - Pause playback
pub async fn pause(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
) -> ApiResult<StateResponse> {
    let session = ctx.registry.get(guild_id).await;
    if !session.engine.pause().await {
        return Err(command_error(CommandError::InvalidState(
            "nothing is playing".to_string(),
        )));
    }
    Ok(Json(StateResponse {
        state: session.engine.state().await,
    }))
}

/// POST /guilds/:guild_id/resume - Resume paused playback
pub async fn resume(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
) -> ApiResult<StateResponse> {
    let session = ctx.registry.get(guild_id).await;
    if !session.engine.resume().await {
        return Err(command_error(CommandError::InvalidState(
            "playback is not paused".to_string(),
        )));
    }
    Ok(Json(StateResponse {
        state: session.engine.state().await,
    }))
}

/// POST /guilds/:guild_id/stop - Stop, clear the queue and leave voice
pub async fn stop(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
) -> Json<StatusResponse> {
    let session = ctx.registry.get(guild_id).await;
    session.engine.stop().await;
    ok()
}

/// POST /guilds/:guild_id/clear - Drop queued tracks
pub async fn clear(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
) -> Json<CountResponse> {
    let session = ctx.registry.get(guild_id).await;
    Json(CountResponse {
        count: session.engine.clear().await,
    })
}

/// POST /guilds/:guild_id/shuffle - Shuffle upcoming tracks
pub async fn shuffle(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
) -> Json<CountResponse> {
    let session = ctx.registry.get(guild_id).await;
    Json(CountResponse {
        count: session.engine.shuffle().await,
    })
}

// ============================================================================
// View Endpoints
// ============================================================================

/// GET /guilds/:guild_id/queue?page=N - Paged queue view (pages start at 1)
pub async fn queue(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
    Query(params): Query<QueueParams>,
) -> ApiResult<QueueResponse> {
    let session = ctx.registry.get(guild_id).await;
    let state = session.engine.state().await;
    let tracks = session.engine.queue().await;

    let total = tracks.len();
    let pages = total.div_ceil(QUEUE_PAGE_SIZE).max(1);
    let page = params.page.unwrap_or(1);
    if page == 0 || page > pages {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("page must be between 1 and {}", pages),
        ));
    }

    let total_duration = format_total_duration(tracks.iter().map(|t| t.duration_seconds()));
    let entries = tracks
        .into_iter()
        .enumerate()
        .skip((page - 1) * QUEUE_PAGE_SIZE)
        .take(QUEUE_PAGE_SIZE)
        .map(|(position, track)| QueueEntry { position, track })
        .collect();

    Ok(Json(QueueResponse {
        state,
        total,
        page,
        pages,
        total_duration,
        entries,
    }))
}

/// GET /guilds/:guild_id/now-playing - Active head, if any
pub async fn now_playing(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<GuildId>,
) -> Json<NowPlayingResponse> {
    let session = ctx.registry.get(guild_id).await;
    let track = session.engine.now_playing().await;
    Json(NowPlayingResponse {
        state: session.engine.state().await,
        duration: track.as_ref().map(|t| t.formatted_duration()),
        track,
    })
}
