//! GitHub API reachability check
//!
//! Performs a small read through the GitHub API. Each successful call
//! produces the audit events that the log ingestion check later searches for.

use async_trait::async_trait;
use std::sync::Arc;

use super::{HealthCheck, GITHUB_PING};
use crate::client::{AuthorizedSession, HttpSession, QueryExecutor, QueryParams};
use crate::config::HealthCheckConfig;
use crate::contracts::*;
use crate::error::Result;

/// Media type recommended by the GitHub REST API
pub const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

/// Reads the organization through the GitHub API
pub struct GithubPingCheck {
    executor: QueryExecutor,
    api_base_url: String,
    org: String,
}

impl GithubPingCheck {
    pub fn new(session: Arc<dyn HttpSession>, api_base_url: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            executor: QueryExecutor::new(session),
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            org: org.into(),
        }
    }

    pub fn from_config(config: &HealthCheckConfig) -> Result<Self> {
        let org = config.require_github_org()?;
        let pat = config.require_github_pat()?;
        let session = AuthorizedSession::new(pat, config.request_timeout)?.accept(GITHUB_MEDIA_TYPE);
        Ok(Self::new(Arc::new(session), config.github_api_base_url.as_str(), org))
    }

    pub fn org_url(&self) -> String {
        format!("{}/orgs/{}", self.api_base_url, self.org)
    }

    /// Fetch the organization and return its JSON description
    pub async fn ping(&self) -> Result<serde_json::Value> {
        tracing::info!(org = %self.org, "Attempting to retrieve GitHub organization information");

        let response = self
            .executor
            .execute_once(&self.org_url(), &QueryParams::new())
            .await?;
        let organization: serde_json::Value = response.json()?;
        let pretty = serde_json::to_string_pretty(&organization)?;

        tracing::info!(
            org = %self.org,
            organization = %pretty,
            "GitHub API is reachable and authentication is successful"
        );
        Ok(organization)
    }
}

#[async_trait]
impl HealthCheck for GithubPingCheck {
    fn name(&self) -> &str {
        GITHUB_PING
    }

    async fn run(&self) -> std::result::Result<CheckReport, StageFailure> {
        self.ping()
            .await
            .map_err(|e| StageFailure::new(CheckStage::GithubPing, e))?;

        Ok(CheckReport::new(self.name(), None).with_stage(CheckStage::GithubPing, 1))
    }
}
