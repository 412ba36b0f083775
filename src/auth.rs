use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, error};

use crate::config::Credentials;

/// Tokens are refreshed this long before the expiry the server states.
const REFRESH_MARGIN_SECS: i64 = 5 * 60;
/// Upper bound on how long a token is trusted, whatever the server claims.
const MAX_TOKEN_LIFETIME_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")] Http(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")] Rejected { status: u16, body: String },
}

/// Source of bearer tokens for outbound calls.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 { 3600 }

struct CachedToken {
    value: String,
    refresh_at: DateTime<Utc>,
}

/// OAuth client-credentials token source with an in-memory cache.
pub struct ClientCredentialsAuth {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsAuth {
    pub fn new(client: Client, credentials: &Credentials) -> Self {
        Self {
            client,
            token_url: format!("{}/token", credentials.base_url),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, AuthError> {
        info!("🔑 Requesting access token from {}", self.token_url);
        let response = self.client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ Token request rejected with status {}", status);
            return Err(AuthError::Rejected { status: status.as_u16(), body });
        }

        let token: TokenResponse = response.json().await?;
        let now = Utc::now();
        let lifetime = token.expires_in.clamp(0, MAX_TOKEN_LIFETIME_SECS) - REFRESH_MARGIN_SECS;
        // Anything unrepresentable means "refresh on the next call".
        let refresh_at = TimeDelta::try_seconds(lifetime.max(0))
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(now);
        Ok(CachedToken { value: token.access_token, refresh_at })
    }
}

#[async_trait]
impl AuthProvider for ClientCredentialsAuth {
    async fn access_token(&self) -> Result<String, AuthError> {
        // Held across the fetch so concurrent callers share one refresh.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }
        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}
