//! Authenticated HTTP session
//!
//! Credentials are established before the checks run; the session only
//! attaches them to each request.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::QueryParams;
use crate::error::{HealthCheckError, Result};

/// Default timeout for backend requests
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("secops-health/", env!("CARGO_PKG_VERSION"));

/// Raw response: status code and text body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResponse {
    pub status: u16,
    pub body: String,
}

impl SessionResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            HealthCheckError::parse(format!("invalid JSON in {} response: {}", self.status, e))
        })
    }
}

/// An authenticated session able to issue GET requests
#[async_trait]
pub trait HttpSession: Send + Sync {
    async fn get(&self, url: &str, params: &QueryParams) -> Result<SessionResponse>;
}

/// Bearer-token session over reqwest
pub struct AuthorizedSession {
    client: reqwest::Client,
    access_token: String,
    accept: Option<String>,
}

impl AuthorizedSession {
    /// Create new session
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                HealthCheckError::Transport(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client, access_token))
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client, access_token: impl Into<String>) -> Self {
        Self {
            client,
            access_token: access_token.into(),
            accept: None,
        }
    }

    /// Set the `Accept` header sent with each request
    pub fn accept(mut self, media_type: impl Into<String>) -> Self {
        self.accept = Some(media_type.into());
        self
    }
}

#[async_trait]
impl HttpSession for AuthorizedSession {
    async fn get(&self, url: &str, params: &QueryParams) -> Result<SessionResponse> {
        let mut request = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(params.as_pairs());

        if let Some(accept) = &self.accept {
            request = request.header(reqwest::header::ACCEPT, accept);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(SessionResponse { status, body })
    }
}
