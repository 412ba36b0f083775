use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info};

use crate::models::{NewRegistryAsset, RegistryAsset, RegistryCriteria};
use crate::org::{ClientError, OrgApi};

/// Catalog of previously generated or curated scenes. The resolver reads it,
/// bumps usage counters and registers new generations; it never deletes.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn find(&self, criteria: &RegistryCriteria) -> Result<Option<RegistryAsset>, ClientError>;
    async fn record_usage(&self, id: &str) -> Result<(), ClientError>;
    async fn register(&self, asset: &NewRegistryAsset) -> Result<(), ClientError>;
}

pub struct HttpRegistry {
    api: OrgApi,
}

impl HttpRegistry {
    pub fn new(api: OrgApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RegistryClient for HttpRegistry {
    async fn find(&self, criteria: &RegistryCriteria) -> Result<Option<RegistryAsset>, ClientError> {
        let request = self.api.request(Method::GET, "/registry/assets").await?.query(criteria);
        let Some(response) = OrgApi::optional(request, "registry lookup").await? else {
            return Ok(None);
        };
        let mut matches: Vec<RegistryAsset> = response.json().await?;
        debug!("📚 Registry returned {} candidates for {:?}", matches.len(), criteria);
        // Prefer a real image; among those, the most reused.
        matches.retain(RegistryAsset::has_real_image);
        matches.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        Ok(matches.into_iter().next())
    }

    async fn record_usage(&self, id: &str) -> Result<(), ClientError> {
        let request = self.api.request(Method::POST, &format!("/registry/assets/{id}/usage")).await?;
        OrgApi::ensure_success(request.send().await?, "registry usage").await?;
        debug!("📈 Recorded usage for registry asset {}", id);
        Ok(())
    }

    async fn register(&self, asset: &NewRegistryAsset) -> Result<(), ClientError> {
        let request = self.api.request(Method::POST, "/registry/assets").await?.json(asset);
        OrgApi::ensure_success(request.send().await?, "registry register").await?;
        info!("📝 Registered generated scene for {}", asset.setting);
        Ok(())
    }
}
