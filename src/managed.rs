use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::ManagedAssetQuery;
use crate::org::{ClientError, OrgApi};

/// Organization-curated images in the content-management store.
#[async_trait]
pub trait ManagedAssetClient: Send + Sync {
    async fn fetch(&self, query: &ManagedAssetQuery) -> Result<Option<String>, ClientError>;
    async fn upload(&self, image_url: &str, title: &str, tags: &[String]) -> Result<(), ClientError>;
}

#[derive(Debug, Deserialize)]
struct ManagedAssetResponse {
    #[serde(default, alias = "image_url", alias = "imageUrl")]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    image_url: &'a str,
    title: &'a str,
    tags: &'a [String],
}

pub struct HttpManagedAssets {
    api: OrgApi,
}

impl HttpManagedAssets {
    pub fn new(api: OrgApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ManagedAssetClient for HttpManagedAssets {
    async fn fetch(&self, query: &ManagedAssetQuery) -> Result<Option<String>, ClientError> {
        let request = self.api.request(Method::GET, "/cms/assets").await?.query(query);
        let Some(response) = OrgApi::optional(request, "cms lookup").await? else {
            return Ok(None);
        };
        let body: ManagedAssetResponse = response.json().await?;
        let url = body.url.filter(|u| !u.trim().is_empty());
        debug!("🗂️ CMS lookup for {:?} -> {:?}", query, url);
        Ok(url)
    }

    async fn upload(&self, image_url: &str, title: &str, tags: &[String]) -> Result<(), ClientError> {
        let request = self.api
            .request(Method::POST, "/cms/assets")
            .await?
            .json(&UploadRequest { image_url, title, tags });
        OrgApi::ensure_success(request.send().await?, "cms upload").await?;
        info!("☁️ Uploaded '{}' to CMS with tags {:?}", title, tags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::StaticToken;
    use crate::test_support::spawn_server;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use pretty_assertions::assert_eq;
    use reqwest::Client;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    async fn cms(router: Router) -> HttpManagedAssets {
        let base = spawn_server(router).await;
        HttpManagedAssets::new(OrgApi::new(Client::new(), &base, Arc::new(StaticToken)))
    }

    #[tokio::test]
    async fn fetch_by_tag_reads_either_url_field() {
        let router = Router::new().route(
            "/cms/assets",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                match q.get("tag").map(String::as_str) {
                    Some("summer") => Json(json!({"image_url": "https://cms/summer.jpg"})),
                    _ => Json(json!({"url": ""})),
                }
            })
            .post(|Json(body): Json<Value>| async move {
                assert_eq!(body["tags"], json!(["vanity", "edited"]));
                StatusCode::CREATED
            }),
        );
        let cms = cms(router).await;

        let hit = ManagedAssetQuery { tag: Some("summer".into()), setting: "vanity".into(), ..Default::default() };
        assert_eq!(cms.fetch(&hit).await.unwrap().as_deref(), Some("https://cms/summer.jpg"));

        let miss = ManagedAssetQuery { setting: "vanity".into(), ..Default::default() };
        assert_eq!(cms.fetch(&miss).await.unwrap(), None);

        cms.upload("https://gen/1.png", "vanity background", &["vanity".to_string(), "edited".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn upload_failure_is_reported() {
        let router = Router::new().route("/cms/assets", axum::routing::post(|| async { StatusCode::FORBIDDEN }));
        let err = cms(router).await.upload("u", "t", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 403, .. }));
    }
}
