//! Fake upstream services served from an ephemeral local port

use axum::Router;
use tokio::net::TcpListener;

/// Serve a router on 127.0.0.1 and return its base URL
///
/// The builder receives the base URL so responses can point back at the
/// same server (stream redirects, relative format URLs).
pub async fn spawn_backend<F>(build: F) -> String
where
    F: FnOnce(String) -> Router,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake backend");
    let addr = listener.local_addr().expect("No local address");
    let base = format!("http://{}", addr);

    let app = build(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Fake backend failed");
    });

    base
}
