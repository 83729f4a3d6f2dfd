//! Source resolver integration tests against fake upstream services
//!
//! Each test starts a local axum server standing in for the video mirror
//! instance, the Data API or the audio-share API, and points the resolver at
//! it through configuration.

mod helpers;

use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use encore_common::config::{TomlConfig, VideoBackendKind};
use encore_common::{SourceKind, Track};
use encore_player::error::{ResolutionError, StreamError};
use encore_player::resolver::ByteStream;
use encore_player::{ResolvedSet, SourceResolver, StreamSource};
use futures::StreamExt;
use helpers::spawn_backend;
use serde_json::{json, Value};
use std::collections::HashMap;

type Params = Query<HashMap<String, String>>;

// ============================================================================
// Fake services
// ============================================================================

fn inv_video(id: &str, title: &str) -> Value {
    json!({
        "type": "video",
        "videoId": id,
        "title": title,
        "author": "Uploader",
        "lengthSeconds": 180,
        "videoThumbnails": [
            { "quality": "medium", "url": format!("/vi/{}/mq.jpg", id) },
            { "quality": "high", "url": format!("https://img.example.com/{}/hq.jpg", id) }
        ]
    })
}

fn audio(body: &'static str, mime: &'static str) -> Response {
    ([(header::CONTENT_TYPE, mime)], body).into_response()
}

fn invidious_router() -> Router {
    Router::new()
        .route(
            "/api/v1/videos/:id",
            get(|Path(id): Path<String>, Query(params): Params| async move {
                match id.as_str() {
                    "missingvid0" => StatusCode::NOT_FOUND.into_response(),
                    "ratelimit00" => StatusCode::TOO_MANY_REQUESTS.into_response(),
                    "novideoaud1" => {
                        let mut video = inv_video(&id, "Silent");
                        video["adaptiveFormats"] =
                            json!([{ "type": "video/mp4", "url": "/video", "bitrate": "900000" }]);
                        Json(video).into_response()
                    }
                    _ => {
                        let mut video = inv_video(&id, "Never Gonna Give You Up");
                        video["lengthSeconds"] = json!(213);
                        video["author"] = json!("Rick Astley");
                        if params.get("local").map(String::as_str) == Some("true") {
                            video["adaptiveFormats"] = json!([
                                { "type": "video/mp4", "url": "/video", "bitrate": "900000" },
                                { "type": "audio/webm; codecs=\"opus\"", "url": "/audio/low", "bitrate": 64000 },
                                { "type": "audio/mp4", "url": "/audio/high", "bitrate": "128000" }
                            ]);
                        }
                        Json(video).into_response()
                    }
                }
            }),
        )
        .route(
            "/api/v1/playlists/:id",
            get(|Path(id): Path<String>, Query(params): Params| async move {
                let page: u32 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
                if id != "PLtest" {
                    return Json(json!({ "title": "", "videos": [] }));
                }
                let videos = match page {
                    1 => json!([inv_video("aaaaaaaaaa1", "One"), inv_video("aaaaaaaaaa2", "Two")]),
                    // Later pages repeat the last one, as real instances do
                    _ => json!([inv_video("aaaaaaaaaa3", "Three"), inv_video("aaaaaaaaaa2", "Two")]),
                };
                Json(json!({ "title": "Test Mix", "videos": videos }))
            }),
        )
        .route(
            "/api/v1/search",
            get(|Query(params): Params| async move {
                assert_eq!(params.get("type").map(String::as_str), Some("video"));
                if params.get("q").map(String::as_str) == Some("nothing at all") {
                    return Json(json!([]));
                }
                Json(json!([
                    { "type": "channel", "author": "Some Channel" },
                    inv_video("bbbbbbbbbb1", "First Hit"),
                    { "type": "playlist", "title": "A Playlist" },
                    inv_video("bbbbbbbbbb2", "Second Hit"),
                    inv_video("bbbbbbbbbb3", "Third Hit")
                ]))
            }),
        )
        .route("/audio/high", get(|| async { audio("HIGH-BITRATE-AUDIO", "audio/mp4") }))
        .route("/audio/low", get(|| async { audio("LOW", "audio/webm") }))
        .route("/song.mp3", get(|| async { audio("ID3-SONG", "audio/mpeg") }))
        .route(
            "/broken.mp3",
            get(|| async { audio("<html>not found</html>", "text/html; charset=utf-8") }),
        )
        .route("/gone.mp3", get(|| async { StatusCode::NOT_FOUND }))
}

fn data_api_item(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "snippet": {
            "title": title,
            "channelTitle": "Data Channel",
            "thumbnails": { "high": { "url": format!("https://img.example.com/{}.jpg", id) } }
        },
        "contentDetails": { "duration": "PT3M33S" }
    })
}

fn playlist_item(id: &str) -> Value {
    json!({ "snippet": { "title": "", "resourceId": { "videoId": id } } })
}

fn data_api_router() -> Router {
    Router::new()
        .route(
            "/playlistItems",
            get(|Query(params): Params| async move {
                assert_eq!(params.get("key").map(String::as_str), Some("test-key"));
                match params.get("pageToken").map(String::as_str) {
                    None => Json(json!({
                        "items": [playlist_item("aaaaaaaaaa1"), playlist_item("aaaaaaaaaa2")],
                        "nextPageToken": "page-2"
                    })),
                    Some(_) => Json(json!({ "items": [playlist_item("aaaaaaaaaa3")] })),
                }
            }),
        )
        .route(
            "/videos",
            get(|Query(params): Params| async move {
                let ids = params.get("id").cloned().unwrap_or_default();
                // Answer in reverse to check the requested order is restored
                let items: Vec<Value> = ids
                    .split(',')
                    .rev()
                    .filter(|id| !id.is_empty())
                    .map(|id| data_api_item(id, &format!("Video {}", id)))
                    .collect();
                Json(json!({ "items": items }))
            }),
        )
        .route(
            "/playlists",
            get(|| async { Json(json!({ "items": [{ "snippet": { "title": "Data Mix" } }] })) }),
        )
        .route(
            "/search",
            get(|Query(params): Params| async move {
                if params.get("q").map(String::as_str) == Some("quota") {
                    let body = json!({
                        "error": { "code": 403, "errors": [{ "reason": "quotaExceeded" }] }
                    });
                    return (StatusCode::FORBIDDEN, Json(body)).into_response();
                }
                if params.get("q").map(String::as_str) == Some("forbidden") {
                    return (StatusCode::FORBIDDEN, "access denied").into_response();
                }
                Json(json!({
                    "items": [
                        { "id": { "videoId": "ccccccccc01" } },
                        { "id": { "channelId": "UCxyz" } },
                        { "id": { "videoId": "ccccccccc02" } }
                    ]
                }))
                .into_response()
            }),
        )
}

fn soundcloud_router(base: String) -> Router {
    let progressive = format!("{}/media/progressive", base);
    let hls = format!("{}/media/hls", base);
    let audio_url = format!("{}/sc-audio.mp3", base);

    Router::new()
        .route(
            "/resolve",
            get(move |Query(params): Params| async move {
                if params.get("client_id").map(String::as_str) != Some("sc-client") {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                let url = params.get("url").cloned().unwrap_or_default();
                if url.contains("/sets/") {
                    return Json(json!({ "kind": "playlist", "title": "A Set" })).into_response();
                }
                if url.contains("missing") {
                    return StatusCode::NOT_FOUND.into_response();
                }
                Json(json!({
                    "kind": "track",
                    "title": "Track One",
                    "permalink_url": "https://soundcloud.com/artist/track-one",
                    "duration": 201500,
                    "artwork_url": null,
                    "user": { "username": "Artist" },
                    "media": { "transcodings": [
                        { "url": hls, "format": { "protocol": "hls", "mime_type": "audio/mpeg" } },
                        { "url": progressive, "format": { "protocol": "progressive", "mime_type": "audio/mpeg" } }
                    ]}
                }))
                .into_response()
            }),
        )
        .route(
            "/media/progressive",
            get(move || async move { Json(json!({ "url": audio_url })) }),
        )
        .route("/sc-audio.mp3", get(|| async { audio("SC-AUDIO", "audio/mpeg") }))
}

// ============================================================================
// Helpers
// ============================================================================

fn invidious_config(base: &str) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.video.invidious_instance = base.to_string();
    config.audio_share.api_base = base.to_string();
    config.audio_share.client_id = Some("sc-client".to_string());
    config.http.timeout_secs = 5;
    config
}

async fn invidious_resolver() -> (String, SourceResolver) {
    let base = spawn_backend(|_| invidious_router()).await;
    let resolver = SourceResolver::from_config(&invidious_config(&base)).unwrap();
    (base, resolver)
}

async fn read_all(mut stream: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

fn single(set: ResolvedSet) -> Track {
    match set {
        ResolvedSet::Single(track) => track,
        other => panic!("expected a single track, got {} tracks", other.len()),
    }
}

// ============================================================================
// Video mirror backend
// ============================================================================

#[tokio::test]
async fn test_video_link_resolves_metadata() {
    let (base, resolver) = invidious_resolver().await;

    let track = single(
        resolver
            .resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42")
            .await
            .unwrap(),
    );

    assert_eq!(track.title(), "Never Gonna Give You Up");
    assert_eq!(track.author(), "Rick Astley");
    assert_eq!(track.duration_seconds(), 213);
    assert_eq!(track.source(), SourceKind::StreamingVideo);
    assert_eq!(track.url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert_eq!(track.thumbnail_url(), "https://img.example.com/dQw4w9WgXcQ/hq.jpg");
    assert!(!track.thumbnail_url().starts_with(&base));
}

#[tokio::test]
async fn test_short_and_mirror_links_resolve() {
    let (_base, resolver) = invidious_resolver().await;

    let short = single(resolver.resolve("https://youtu.be/dQw4w9WgXcQ").await.unwrap());
    let mirror = single(
        resolver
            .resolve("https://yewtu.be/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap(),
    );
    assert_eq!(short.url(), mirror.url());
}

#[tokio::test]
async fn test_missing_video_is_not_found() {
    let (_base, resolver) = invidious_resolver().await;
    let err = resolver
        .resolve("https://www.youtube.com/watch?v=missingvid0")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::NotFound(_)));
}

#[tokio::test]
async fn test_throttled_backend_is_rate_limited() {
    let (_base, resolver) = invidious_resolver().await;
    let err = resolver
        .resolve("https://www.youtube.com/watch?v=ratelimit00")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::RateLimited(_)));
}

#[tokio::test]
async fn test_video_link_without_id_is_unsupported() {
    let (_base, resolver) = invidious_resolver().await;
    let err = resolver
        .resolve("https://www.youtube.com/channel/UC38IQsAvIsxxjztdMZQtwHA")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::Unsupported(_)));
}

#[tokio::test]
async fn test_playlist_pages_until_exhausted() {
    let (_base, resolver) = invidious_resolver().await;

    let set = resolver
        .resolve("https://www.youtube.com/playlist?list=PLtest")
        .await
        .unwrap();

    match set {
        ResolvedSet::Playlist { title, tracks } => {
            assert_eq!(title, "Test Mix");
            let titles: Vec<&str> = tracks.iter().map(|t| t.title()).collect();
            assert_eq!(titles, vec!["One", "Two", "Three"]);
        }
        other => panic!("expected playlist, got {} tracks", other.len()),
    }
}

#[tokio::test]
async fn test_empty_playlist_is_not_found() {
    let (_base, resolver) = invidious_resolver().await;
    let err = resolver
        .resolve("https://www.youtube.com/playlist?list=PLempty")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::NotFound(_)));
}

#[tokio::test]
async fn test_free_text_plays_top_video_hit() {
    let (_base, resolver) = invidious_resolver().await;
    let track = single(resolver.resolve("  lofi beats  ").await.unwrap());
    assert_eq!(track.title(), "First Hit");
}

#[tokio::test]
async fn test_search_skips_non_video_results() {
    let (_base, resolver) = invidious_resolver().await;

    let results = resolver.search("lofi", 2).await.unwrap();
    let titles: Vec<&str> = results.iter().map(|t| t.title()).collect();
    assert_eq!(titles, vec!["First Hit", "Second Hit"]);

    let err = resolver.search("nothing at all", 5).await.unwrap_err();
    assert!(matches!(err, ResolutionError::NotFound(_)));

    let err = resolver.search("   ", 5).await.unwrap_err();
    assert!(matches!(err, ResolutionError::NotFound(_)));
}

#[tokio::test]
async fn test_video_stream_uses_best_audio_format() {
    let (_base, resolver) = invidious_resolver().await;
    let track = single(
        resolver
            .resolve("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap(),
    );

    let bytes = read_all(resolver.materialize(&track).await.unwrap()).await;
    assert_eq!(bytes, b"HIGH-BITRATE-AUDIO");
}

#[tokio::test]
async fn test_video_without_audio_format_is_unsupported() {
    let (_base, resolver) = invidious_resolver().await;
    let track = Track::new(
        SourceKind::StreamingVideo,
        "Silent",
        "https://www.youtube.com/watch?v=novideoaud1",
    );

    let err = match resolver.materialize(&track).await {
        Err(e) => e,
        Ok(_) => panic!("expected a stream error"),
    };
    assert!(matches!(err, StreamError::FormatUnsupported(_)));
}

// ============================================================================
// Direct links and uploads
// ============================================================================

#[tokio::test]
async fn test_direct_link_streams_file() {
    let (base, resolver) = invidious_resolver().await;

    let track = single(resolver.resolve(&format!("{}/song.mp3", base)).await.unwrap());
    assert_eq!(track.title(), "song.mp3");
    assert_eq!(track.source(), SourceKind::DirectLink);

    let bytes = read_all(resolver.materialize(&track).await.unwrap()).await;
    assert_eq!(bytes, b"ID3-SONG");
}

#[tokio::test]
async fn test_html_behind_audio_extension_is_unsupported() {
    let (base, resolver) = invidious_resolver().await;
    let track = single(resolver.resolve(&format!("{}/broken.mp3", base)).await.unwrap());

    match resolver.materialize(&track).await {
        Err(StreamError::FormatUnsupported(msg)) => assert!(msg.contains("text/html")),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("html page must not stream"),
    }
}

#[tokio::test]
async fn test_missing_file_is_network_error() {
    let (base, resolver) = invidious_resolver().await;
    let track = SourceResolver::attachment("gone.mp3", &format!("{}/gone.mp3", base));
    assert_eq!(track.source(), SourceKind::UploadedFile);

    match resolver.materialize(&track).await {
        Err(StreamError::Network(msg)) => assert!(msg.contains("404")),
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(_) => panic!("missing file must not stream"),
    }
}

// ============================================================================
// Data API backend
// ============================================================================

async fn data_api_resolver() -> SourceResolver {
    let base = spawn_backend(|_| data_api_router()).await;
    let mut config = TomlConfig::default();
    config.video.backend = VideoBackendKind::DataApi;
    config.video.data_api_base = base;
    config.video.api_key = Some("test-key".to_string());
    config.http.timeout_secs = 5;
    SourceResolver::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_data_api_playlist_follows_page_tokens() {
    let resolver = data_api_resolver().await;

    let set = resolver
        .resolve("https://www.youtube.com/playlist?list=PLdata")
        .await
        .unwrap();

    match set {
        ResolvedSet::Playlist { title, tracks } => {
            assert_eq!(title, "Data Mix");
            let urls: Vec<&str> = tracks.iter().map(|t| t.url()).collect();
            assert_eq!(
                urls,
                vec![
                    "https://www.youtube.com/watch?v=aaaaaaaaaa1",
                    "https://www.youtube.com/watch?v=aaaaaaaaaa2",
                    "https://www.youtube.com/watch?v=aaaaaaaaaa3",
                ]
            );
            assert!(tracks.iter().all(|t| t.duration_seconds() == 213));
            assert_eq!(tracks[0].author(), "Data Channel");
        }
        other => panic!("expected playlist, got {} tracks", other.len()),
    }
}

#[tokio::test]
async fn test_data_api_search_keeps_only_videos() {
    let resolver = data_api_resolver().await;
    let results = resolver.search("anything", 10).await.unwrap();
    let titles: Vec<&str> = results.iter().map(|t| t.title()).collect();
    assert_eq!(titles, vec!["Video ccccccccc01", "Video ccccccccc02"]);
}

#[tokio::test]
async fn test_data_api_quota_is_rate_limited() {
    let resolver = data_api_resolver().await;

    let err = resolver.search("quota", 5).await.unwrap_err();
    assert!(matches!(err, ResolutionError::RateLimited(_)));

    let err = resolver.search("forbidden", 5).await.unwrap_err();
    assert!(matches!(err, ResolutionError::Upstream(_)));
}

// ============================================================================
// Audio-share backend
// ============================================================================

#[tokio::test]
async fn test_audio_share_track_resolves_and_streams() {
    let base = spawn_backend(soundcloud_router).await;
    let resolver = SourceResolver::from_config(&invidious_config(&base)).unwrap();

    let track = single(
        resolver
            .resolve("https://soundcloud.com/artist/track-one")
            .await
            .unwrap(),
    );
    assert_eq!(track.title(), "Track One");
    assert_eq!(track.author(), "Artist");
    assert_eq!(track.duration_seconds(), 201);
    assert_eq!(track.source(), SourceKind::AudioShare);

    let bytes = read_all(resolver.materialize(&track).await.unwrap()).await;
    assert_eq!(bytes, b"SC-AUDIO");
}

#[tokio::test]
async fn test_audio_share_sets_are_unsupported() {
    let base = spawn_backend(soundcloud_router).await;
    let resolver = SourceResolver::from_config(&invidious_config(&base)).unwrap();

    let err = resolver
        .resolve("https://soundcloud.com/artist/sets/summer")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::Unsupported(_)));

    let err = resolver
        .resolve("https://soundcloud.com/artist/missing-track")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::NotFound(_)));
}

#[tokio::test]
async fn test_audio_share_without_client_id_is_unsupported() {
    let base = spawn_backend(soundcloud_router).await;
    let mut config = invidious_config(&base);
    config.audio_share.client_id = None;
    let resolver = SourceResolver::from_config(&config).unwrap();

    let err = resolver
        .resolve("https://soundcloud.com/artist/track-one")
        .await
        .unwrap_err();
    assert!(matches!(err, ResolutionError::Unsupported(_)));
}
