//! Image generation backends used by the last resolution tier.
//!
//! Two interchangeable strategies live behind [`GenerationProvider`]: a
//! direct single round trip and an async submit-then-poll job protocol.
//! Both authenticate with a client-credentials bearer token and share the
//! same multi-shape image extraction.

pub mod async_job;
pub mod direct;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, error};

use crate::auth::{AuthError, AuthProvider};
use crate::models::{Product, Setting};

pub use async_job::AsyncJobProvider;
pub use direct::DirectProvider;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("provider auth failed: {0}")] Auth(#[from] AuthError),
    #[error("HTTP error: {0}")] Http(#[from] reqwest::Error),
    #[error("submission rejected with status {status}: {body}")] Submission { status: u16, body: String },
    #[error("job {job_id} failed: {message}")] JobFailed { job_id: String, message: String },
    #[error("job {job_id} was cancelled: {message}")] JobCancelled { job_id: String, message: String },
    #[error("no image in {0}")] NoImage(String),
    #[error("job {job_id} timed out after {elapsed:?} ({attempts} polls)")] Timeout { job_id: String, elapsed: Duration, attempts: u32 },
    #[error("invalid provider response: {0}")] InvalidResponse(String),
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate_from_prompt(&self, prompt: &str) -> Result<String, GenerationError>;

    async fn edit_scene_background(&self, seed_image_url: &str, prompt: &str) -> Result<String, GenerationError>;

    async fn generate_scene_background(&self, setting: &Setting, products: &[Product]) -> Result<String, GenerationError> {
        self.generate_from_prompt(&scene_prompt(setting, products)).await
    }
}

const HOUSE_STYLE: &str = "Photorealistic retail background. Leave the lower center clear for product placement. \
Soft natural light, shallow depth of field, no people, no text, no logos, no products in frame.";

/// Wraps a raw creative prompt with the house style rules.
pub fn build_generation_prompt(setting: &Setting, creative_prompt: &str) -> String {
    format!("{} Scene: {}. Setting category: {}.", HOUSE_STYLE, creative_prompt.trim(), setting)
}

/// Prompt for a setting's default treatment, nudged by the products shown on top of it.
pub fn scene_prompt(setting: &Setting, products: &[Product]) -> String {
    let mut prompt = format!("{} Scene: {}.", HOUSE_STYLE, setting.default_scene());
    let names: Vec<&str> = products.iter().take(5).map(|p| p.name.as_str()).collect();
    if !names.is_empty() {
        prompt.push_str(&format!(" The backdrop should complement: {}.", names.join(", ")));
    }
    prompt
}

// --- Response shape probing ---

type Extractor = fn(&Value) -> Option<String>;

/// Known response envelopes, tried in order. First non-empty wins.
const IMAGE_EXTRACTORS: &[(&str, Extractor)] = &[
    ("image_url", top_level_image_url),
    ("url", top_level_url),
    ("data[].url", openai_url),
    ("data[].b64_json", openai_b64),
    ("result.image_url", nested_result_url),
    ("output", output_field),
    ("images[]", images_array),
];

fn non_empty(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn top_level_image_url(v: &Value) -> Option<String> { non_empty(v.get("image_url")).or_else(|| non_empty(v.get("imageUrl"))) }

fn top_level_url(v: &Value) -> Option<String> { non_empty(v.get("url")) }

fn openai_url(v: &Value) -> Option<String> { non_empty(v.pointer("/data/0/url")) }

fn openai_b64(v: &Value) -> Option<String> { non_empty(v.pointer("/data/0/b64_json")).map(|b64| data_uri(&b64)) }

fn nested_result_url(v: &Value) -> Option<String> {
    non_empty(v.pointer("/result/image_url")).or_else(|| non_empty(v.pointer("/result/url")))
}

fn output_field(v: &Value) -> Option<String> {
    match v.get("output")? {
        Value::String(_) => non_empty(v.get("output")),
        Value::Array(_) => non_empty(v.pointer("/output/0")),
        Value::Object(_) => non_empty(v.pointer("/output/image_url")).or_else(|| non_empty(v.pointer("/output/url"))),
        _ => None,
    }
}

fn images_array(v: &Value) -> Option<String> {
    non_empty(v.pointer("/images/0")).or_else(|| non_empty(v.pointer("/images/0/url")))
}

pub fn extract_image(response: &Value) -> Option<String> {
    IMAGE_EXTRACTORS.iter().find_map(|(shape, extract)| {
        let found = extract(response)?;
        info!("🎯 Found image via '{}' response shape", shape);
        Some(found)
    })
}

/// Turns a bare base64 payload into a data URI, sniffing the mime type from its magic bytes.
fn data_uri(b64: &str) -> String {
    let head: String = b64.chars().take(16).collect();
    let mime = match base64::engine::general_purpose::STANDARD.decode(head.as_bytes()) {
        Ok(bytes) if bytes.starts_with(&[0x89, b'P', b'N', b'G']) => "image/png",
        Ok(bytes) if bytes.starts_with(&[0xFF, 0xD8]) => "image/jpeg",
        Ok(bytes) if bytes.starts_with(b"RIFF") => "image/webp",
        _ => "image/png",
    };
    format!("data:{mime};base64,{b64}")
}

/// Shared `POST /generate` + `GET /status/{id}` plumbing with bearer auth.
pub struct ProviderEndpoint {
    client: Client,
    base_url: String,
    auth: Arc<dyn AuthProvider>,
}

impl ProviderEndpoint {
    pub fn new(client: Client, base_url: &str, auth: Arc<dyn AuthProvider>) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string(), auth }
    }

    pub async fn submit(&self, body: &Value) -> Result<Value, GenerationError> {
        let token = self.auth.access_token().await?;
        let url = format!("{}/generate", self.base_url);
        info!("🔗 Submitting generation request to: {}", url);

        let response = self.client
            .post(&url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        info!("📥 Response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Generation submission rejected: {}", body);
            return Err(GenerationError::Submission { status: status.as_u16(), body });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| GenerationError::InvalidResponse(format!("{e}: {}", truncate(&text, 200))))
    }

    pub async fn status(&self, job_id: &str) -> Result<reqwest::Response, GenerationError> {
        let token = self.auth.access_token().await?;
        let response = self.client
            .get(format!("{}/status/{}", self.base_url, job_id))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response)
    }
}

fn generation_body(prompt: &str, seed_image_url: Option<&str>) -> Value {
    match seed_image_url {
        Some(seed) => serde_json::json!({ "prompt": prompt, "mode": "edit", "seed_image_url": seed }),
        None => serde_json::json!({ "prompt": prompt, "mode": "generate" }),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max { s.to_string() } else { format!("{}…", s.chars().take(max).collect::<String>()) }
}
