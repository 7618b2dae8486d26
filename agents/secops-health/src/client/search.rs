//! Typed search facades over the Google SecOps REST API
//!
//! API reference: https://cloud.google.com/chronicle/docs/reference/rest/v1alpha/projects.locations.instances

use crate::contracts::*;
use crate::error::{HealthCheckError, Result};

use super::{QueryExecutor, QueryParams, DEFAULT_MAX_RETRIES};

/// Base URLs of the SecOps instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecOpsEndpoints {
    /// e.g. `https://us-chronicle.googleapis.com/v1alpha`
    pub api_base_url: String,

    /// e.g. `projects/{project}/locations/{region}/instances/{id}`
    pub instance: String,

    /// Base URL of the legacy Search API, e.g. `https://backstory.googleapis.com/v1`
    pub backstory_api_base_url: Option<String>,
}

impl SecOpsEndpoints {
    pub fn new(api_base_url: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            api_base_url: trim_slash(api_base_url.into()),
            instance: instance.into().trim_matches('/').to_string(),
            backstory_api_base_url: None,
        }
    }

    pub fn with_backstory(mut self, base_url: impl Into<String>) -> Self {
        self.backstory_api_base_url = Some(trim_slash(base_url.into()));
        self
    }

    fn instance_url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.api_base_url, self.instance, suffix)
    }

    pub fn udm_search_url(&self) -> String {
        self.instance_url(":udmSearch")
    }

    pub fn detections_url(&self) -> String {
        self.instance_url("/legacy:legacySearchDetections")
    }

    pub fn rule_alerts_url(&self) -> String {
        self.instance_url("/legacy:legacySearchRulesAlerts")
    }

    pub fn legacy_udm_search_url(&self) -> Result<String> {
        self.backstory_api_base_url
            .as_ref()
            .map(|base| format!("{}/events:udmSearch", base))
            .ok_or_else(|| HealthCheckError::config("legacy Search API base URL is not configured"))
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Search client for one SecOps instance
#[derive(Clone)]
pub struct SecOpsClient {
    executor: QueryExecutor,
    endpoints: SecOpsEndpoints,
    max_retries: u32,
}

impl SecOpsClient {
    /// Create new client
    pub fn new(executor: QueryExecutor, endpoints: SecOpsEndpoints) -> Self {
        Self {
            executor,
            endpoints,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Set the rate-limit retry budget
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn endpoints(&self) -> &SecOpsEndpoints {
        &self.endpoints
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// UDM search on the instance endpoint, retrying while rate limited.
    ///
    /// The response is capped by `limit` (or the backend default); there is no pagination.
    pub async fn udm_search(&self, query: &UdmSearchQuery) -> Result<UdmSearchResponse> {
        let response = self
            .executor
            .execute(&self.endpoints.udm_search_url(), &udm_params(query), self.max_retries)
            .await?;
        response.json()
    }

    /// UDM search through the legacy Search API. Single attempt.
    pub async fn udm_search_legacy(&self, query: &UdmSearchQuery) -> Result<UdmSearchResponse> {
        let url = self.endpoints.legacy_udm_search_url()?;
        let response = self.executor.execute_once(&url, &udm_params(query)).await?;
        response.json()
    }

    /// One page of detections for `query`
    pub async fn search_detections(&self, query: &DetectionsQuery) -> Result<Page<Detection>> {
        let window = query.window.as_ref();
        let params = QueryParams::new()
            .with("rule_id", &query.rule_id)
            .with_opt("alert_state", query.alert_state.map(|s| s.as_str()))
            .with_opt("start_time", window.map(|w| &w.start_time))
            .with_opt("end_time", window.map(|w| &w.end_time))
            .with_opt("list_basis", query.list_basis.map(|b| b.as_str()))
            .with_opt("page_size", query.page_size)
            .with_opt("page_token", query.page_token.as_ref());

        let response = self
            .executor
            .execute(&self.endpoints.detections_url(), &params, self.max_retries)
            .await?;
        let body: DetectionsResponse = response.json()?;
        Ok(body.into())
    }

    /// Alerts for every rule in the window. Filtering by rule is up to the caller.
    pub async fn search_rule_alerts(&self, query: &RuleAlertsQuery) -> Result<RuleAlertsResponse> {
        let params = QueryParams::new()
            .with("time_range.start_time", &query.window.start_time)
            .with("time_range.end_time", &query.window.end_time)
            .with_opt("max_num_alerts_to_return", query.max_alerts);

        let response = self
            .executor
            .execute(&self.endpoints.rule_alerts_url(), &params, self.max_retries)
            .await?;
        response.json()
    }
}

fn udm_params(query: &UdmSearchQuery) -> QueryParams {
    QueryParams::new()
        .with("query", &query.query)
        .with("time_range.start_time", &query.window.start_time)
        .with("time_range.end_time", &query.window.end_time)
        .with_opt("limit", query.limit)
}
