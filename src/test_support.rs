//! In-process stand-ins for the HTTP collaborators, used by unit tests.

use axum::{Json, Router, routing::post};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Binds `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// `/token` route issuing a fresh token per call, counting the calls.
pub fn token_route(calls: Arc<AtomicUsize>, expires_in: u64) -> Router {
    Router::new().route(
        "/token",
        post(move || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Json(json!({
                    "access_token": format!("tok-{n}"),
                    "token_type": "Bearer",
                    "expires_in": expires_in
                }))
            }
        }),
    )
}
