use async_trait::async_trait;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{extract_image, generation_body, truncate, GenerationError, GenerationProvider, ProviderEndpoint};
use crate::config::PollPolicy;

/// Lifecycle of a provider-side job as far as polling cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Includes `cancel_pending` and anything unrecognised.
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn from_response(body: &Value) -> Self {
        let raw = body
            .get("status")
            .or_else(|| body.get("state"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_ascii_lowercase();
        match raw.as_str() {
            "succeeded" | "success" | "completed" => JobState::Succeeded,
            "failed" | "error" => JobState::Failed,
            "cancelled" | "canceled" => JobState::Cancelled,
            _ => JobState::Running,
        }
    }
}

fn job_id(submitted: &Value) -> Option<String> {
    ["job_id", "jobId", "id"]
        .iter()
        .find_map(|key| match submitted.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Provider message if present, otherwise its error code.
fn failure_message(body: &Value) -> String {
    ["/error/message", "/message", "/error", "/error/code", "/error_code", "/code"]
        .iter()
        .find_map(|path| match body.pointer(path)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(format!("code {n}")),
            _ => None,
        })
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Submit-then-poll: `POST /generate` returns a job id, `GET /status/{id}` is
/// polled on a fixed interval until the job reaches a terminal state.
pub struct AsyncJobProvider {
    endpoint: ProviderEndpoint,
    poll: PollPolicy,
}

impl AsyncJobProvider {
    pub fn new(endpoint: ProviderEndpoint, poll: PollPolicy) -> Self {
        Self { endpoint, poll }
    }

    async fn run(&self, prompt: &str, seed_image_url: Option<&str>) -> Result<String, GenerationError> {
        let submitted = self.endpoint.submit(&generation_body(prompt, seed_image_url)).await?;
        let job_id = job_id(&submitted)
            .ok_or_else(|| GenerationError::InvalidResponse(format!("submission carried no job id: {}", truncate(&submitted.to_string(), 200))))?;
        info!("🚀 Submitted generation job {}", job_id);
        self.wait_for(&job_id).await
    }

    async fn wait_for(&self, job_id: &str) -> Result<String, GenerationError> {
        let started = Instant::now();
        for attempt in 1..=self.poll.max_attempts {
            tokio::time::sleep(self.poll.interval).await;

            let response = match self.endpoint.status(job_id).await {
                Ok(response) => response,
                Err(GenerationError::Http(e)) => {
                    warn!("⚠️ Poll {} for job {} failed in transit: {}", attempt, job_id, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = response.status();
            if !status.is_success() {
                warn!("⚠️ Poll {} for job {} returned {}, polling on", attempt, job_id, status);
                continue;
            }

            let body: Value = match response.json().await {
                Ok(body) => body,
                Err(e) => {
                    warn!("⚠️ Poll {} for job {} returned unreadable body: {}", attempt, job_id, e);
                    continue;
                }
            };

            match JobState::from_response(&body) {
                JobState::Succeeded => {
                    info!("✅ Job {} succeeded after {} polls", job_id, attempt);
                    return extract_image(&body).ok_or_else(|| GenerationError::NoImage(format!("succeeded job {job_id}")));
                }
                JobState::Failed => {
                    return Err(GenerationError::JobFailed { job_id: job_id.to_string(), message: failure_message(&body) });
                }
                JobState::Cancelled => {
                    return Err(GenerationError::JobCancelled { job_id: job_id.to_string(), message: failure_message(&body) });
                }
                JobState::Running => debug!("⏳ Job {} still running (poll {})", job_id, attempt),
            }
        }

        Err(GenerationError::Timeout {
            job_id: job_id.to_string(),
            elapsed: started.elapsed(),
            attempts: self.poll.max_attempts,
        })
    }
}

#[async_trait]
impl GenerationProvider for AsyncJobProvider {
    fn name(&self) -> &'static str { "async" }

    async fn generate_from_prompt(&self, prompt: &str) -> Result<String, GenerationError> {
        self.run(prompt, None).await
    }

    async fn edit_scene_background(&self, seed_image_url: &str, prompt: &str) -> Result<String, GenerationError> {
        self.run(prompt, Some(seed_image_url)).await
    }
}
