use reqwest::{Client, Method, RequestBuilder, Response};
use std::sync::Arc;
use thiserror::Error;

use crate::auth::{AuthError, AuthProvider};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("auth error: {0}")] Auth(#[from] AuthError),
    #[error("HTTP error: {0}")] Http(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}: {body}")] Status { endpoint: String, status: u16, body: String },
}

/// Authenticated access to the organization's registry and CMS endpoints.
#[derive(Clone)]
pub struct OrgApi {
    client: Client,
    base_url: String,
    auth: Arc<dyn AuthProvider>,
}

impl OrgApi {
    pub fn new(client: Client, base_url: &str, auth: Arc<dyn AuthProvider>) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_string(), auth }
    }

    pub async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.auth.access_token().await?;
        Ok(self.client.request(method, format!("{}{}", self.base_url, path)).bearer_auth(token))
    }

    /// 404 maps to `None`; any other non-2xx is an error.
    pub async fn optional(request: RequestBuilder, endpoint: &str) -> Result<Option<Response>, ClientError> {
        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::ensure_success(response, endpoint).await.map(Some)
    }

    pub async fn ensure_success(response: Response, endpoint: &str) -> Result<Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Status { endpoint: endpoint.to_string(), status: status.as_u16(), body });
        }
        Ok(response)
    }
}
