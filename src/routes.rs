use axum::{Json, Router, extract::State, routing::{get, post}};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::{Any, CorsLayer}, services::ServeDir, trace::TraceLayer};

use crate::{models::{NoveltyRequest, ResolveRequest}, resolver::{BackgroundResolver, Resolution}};

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<BackgroundResolver>,
}

pub fn router(state: AppState, asset_dir: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/background/resolve", post(resolve_background))
        .route("/api/background/novelty", post(classify_novelty))
        .route("/api/background/cache", get(cache_stats))
        .nest_service("/assets", ServeDir::new(asset_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}

pub async fn health() -> &'static str { "ok" }

/// Always 200: a background is always displayable.
pub async fn resolve_background(State(state): State<AppState>, Json(body): Json<ResolveRequest>) -> Json<Resolution> {
    let resolution = state.resolver.resolve_detailed(&body.setting, &body.products, &body.options).await;
    tracing::info!("🖼️ Resolved '{}' via {:?}", body.setting, resolution.source);
    Json(resolution)
}

pub async fn classify_novelty(State(state): State<AppState>, Json(body): Json<NoveltyRequest>) -> Json<Value> {
    let novelty = state.resolver.novelty();
    Json(json!({
        "novel": novelty.is_novel(body.prompt.as_deref(), &body.setting),
        "strategy": novelty.strategy_name(),
    }))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "entries": state.resolver.cache().len() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use crate::novelty::NoveltyClassifier;
    use crate::preseeded::PreseededAssetBank;
    use crate::resolver::ResolverSettings;
    use axum::{body::{to_bytes, Body}, http::{Request, StatusCode}};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    fn app() -> Router {
        let resolver = BackgroundResolver::new(
            ResolverSettings { dynamic_generation: false, provider: ProviderKind::None },
            NoveltyClassifier::default(),
            PreseededAssetBank::new(reqwest::Client::new(), "http://127.0.0.1:1", vec![]),
        );
        router(AppState { resolver: Arc::new(resolver) }, "./public/assets")
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn resolve_route_never_fails() {
        let (status, body) = call(app(), "POST", "/api/background/resolve", Some(json!({"setting": "unknown-setting-xyz"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "gradient");
        assert_eq!(body["novel"], true);
        assert!(body["image"].as_str().unwrap().starts_with("linear-gradient("));
    }

    #[tokio::test]
    async fn resolve_route_preserves_existing_background() {
        let payload = json!({
            "setting": "vanity",
            "products": [{"name": "Lip Oil"}],
            "options": {"existing_background": "https://cdn/current.jpg"}
        });
        let (_, body) = call(app(), "POST", "/api/background/resolve", Some(payload)).await;
        assert_eq!(body["image"], "https://cdn/current.jpg");
        assert_eq!(body["source"], "preserved");
    }

    #[tokio::test]
    async fn novelty_and_cache_routes() {
        let app = app();
        let (_, body) = call(app.clone(), "POST", "/api/background/novelty", Some(json!({"setting": "bathroom", "prompt": "rooftop in Tokyo"}))).await;
        assert_eq!(body, json!({"novel": true, "strategy": "deny-list"}));

        call(app.clone(), "POST", "/api/background/resolve", Some(json!({"setting": "gym"}))).await;
        let (_, body) = call(app, "GET", "/api/background/cache", None).await;
        assert_eq!(body, json!({"entries": 1}));
    }
}
