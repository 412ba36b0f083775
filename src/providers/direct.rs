use async_trait::async_trait;
use tracing::info;

use super::{extract_image, generation_body, GenerationError, GenerationProvider, ProviderEndpoint};

/// Single round trip: `POST /generate` answers with the image.
pub struct DirectProvider {
    endpoint: ProviderEndpoint,
}

impl DirectProvider {
    pub fn new(endpoint: ProviderEndpoint) -> Self {
        Self { endpoint }
    }

    async fn run(&self, prompt: &str, seed_image_url: Option<&str>) -> Result<String, GenerationError> {
        info!("🎯 Direct generation ({}) with prompt: {}", if seed_image_url.is_some() { "edit" } else { "fresh" }, super::truncate(prompt, 100));
        let response = self.endpoint.submit(&generation_body(prompt, seed_image_url)).await?;
        extract_image(&response).ok_or_else(|| GenerationError::NoImage("direct generation response".into()))
    }
}

#[async_trait]
impl GenerationProvider for DirectProvider {
    fn name(&self) -> &'static str { "direct" }

    async fn generate_from_prompt(&self, prompt: &str) -> Result<String, GenerationError> {
        self.run(prompt, None).await
    }

    async fn edit_scene_background(&self, seed_image_url: &str, prompt: &str) -> Result<String, GenerationError> {
        self.run(prompt, Some(seed_image_url)).await
    }
}
