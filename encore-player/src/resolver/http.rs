//! Shared HTTP plumbing for source backends
//!
//! One `reqwest::Client` is built at startup and cloned into every backend.
//! Status mapping is uniform: 404 is NotFound, 429 is RateLimited, any other
//! non-success status or an undecodable body is Upstream.

use crate::error::{ResolutionError, StreamError};
use crate::resolver::ByteStream;
use encore_common::config::HttpConfig;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Build the shared client from `[http]` settings
pub fn build_client(config: &HttpConfig) -> Result<Client, ResolutionError> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ResolutionError::Upstream(format!("HTTP client setup failed: {}", e)))
}

/// Attach the opaque credential blob when one is configured
pub fn with_cookie(request: RequestBuilder, cookie: Option<&str>) -> RequestBuilder {
    match cookie {
        Some(value) => request.header(COOKIE, value),
        None => request,
    }
}

/// Send a request and decode its JSON body
///
/// `backend` names the service in error messages.
pub async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    backend: &str,
) -> Result<T, ResolutionError> {
    let response = request
        .send()
        .await
        .map_err(|e| ResolutionError::Upstream(format!("{} request failed: {}", backend, e)))?;

    let response = check_status(response, backend).await?;

    response
        .json::<T>()
        .await
        .map_err(|e| ResolutionError::Upstream(format!("{} returned invalid JSON: {}", backend, e)))
}

/// Map a non-success status onto the resolution taxonomy
pub async fn check_status(response: Response, backend: &str) -> Result<Response, ResolutionError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == 404 {
        return Err(ResolutionError::NotFound(format!(
            "{} has no such item",
            backend
        )));
    }

    if status == 429 {
        return Err(ResolutionError::RateLimited(backend.to_string()));
    }

    let error_text = response.text().await.unwrap_or_default();
    tracing::debug!(backend, status = status.as_u16(), body = %error_text, "Backend request failed");
    Err(ResolutionError::Upstream(format!(
        "{} returned HTTP {}",
        backend,
        status.as_u16()
    )))
}

/// Open a byte stream for an audio resource
///
/// Textual responses (HTML pages, JSON error bodies) are rejected as
/// FormatUnsupported before any audio bytes are handed out.
pub async fn open_stream(request: RequestBuilder) -> Result<ByteStream, StreamError> {
    let response = request
        .send()
        .await
        .map_err(|e| StreamError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(StreamError::Network(format!(
            "{} returned HTTP {}",
            response.url(),
            status.as_u16()
        )));
    }

    if let Some(content_type) = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        if is_non_audio_content_type(content_type) {
            return Err(StreamError::FormatUnsupported(format!(
                "{} serves {}",
                response.url(),
                content_type
            )));
        }
    }

    let stream = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| StreamError::Network(e.to_string())));

    Ok(Box::pin(stream))
}

fn is_non_audio_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/") || mime == "application/json"
}
