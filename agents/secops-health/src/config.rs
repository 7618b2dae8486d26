//! Health check configuration
//!
//! All values come from environment variables and are resolved before any
//! network call. Each check asks only for the values it needs, so a missing
//! GitHub token does not break the SecOps checks.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::client::{
    AuthorizedSession, HttpSession, QueryExecutor, SecOpsClient, SecOpsEndpoints,
    DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT,
};
use crate::contracts::SearchWindow;
use crate::error::{HealthCheckError, Result};

/// Environment variable names
pub mod vars {
    pub const SECOPS_API_BASE_URL: &str = "GOOGLE_SECOPS_API_BASE_URL";
    pub const SECOPS_INSTANCE: &str = "GOOGLE_SECOPS_INSTANCE";
    pub const SECOPS_BACKSTORY_API_BASE_URL: &str = "GOOGLE_SECOPS_BACKSTORY_API_BASE_URL";
    pub const SECOPS_ACCESS_TOKEN: &str = "GOOGLE_SECOPS_ACCESS_TOKEN";
    pub const RULE_ID: &str = "GITHUB_HEALTH_CHECK_RULE_ID";
    pub const SEARCH_TIME_WINDOW_HOURS: &str = "SEARCH_TIME_WINDOW_HOURS";
    pub const GITHUB_ORG_NAME: &str = "HEALTH_CHECK_GITHUB_ORG_NAME";
    pub const GITHUB_PAT: &str = "HEALTH_CHECK_GITHUB_PAT";
    pub const GITHUB_API_BASE_URL: &str = "HEALTH_CHECK_GITHUB_API_BASE_URL";
    pub const MAX_RETRIES: &str = "HEALTH_CHECK_MAX_RETRIES";
    pub const REQUEST_TIMEOUT_SECS: &str = "HEALTH_CHECK_REQUEST_TIMEOUT_SECS";
}

/// Default GitHub REST API base URL
pub const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com";

/// Resolved configuration. Required values stay optional here and are
/// checked by the `require_*` accessors of the check that needs them.
#[derive(Clone)]
pub struct HealthCheckConfig {
    pub secops_api_base_url: Option<String>,
    pub secops_instance: Option<String>,
    pub backstory_api_base_url: Option<String>,
    pub secops_access_token: Option<String>,
    pub rule_id: Option<String>,
    pub search_window_hours: Option<u32>,
    pub github_org: Option<String>,
    pub github_pat: Option<String>,
    pub github_api_base_url: String,
    pub max_retries: u32,
    pub request_timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            secops_api_base_url: None,
            secops_instance: None,
            backstory_api_base_url: None,
            secops_access_token: None,
            rule_id: None,
            search_window_hours: None,
            github_org: None,
            github_pat: None,
            github_api_base_url: DEFAULT_GITHUB_API_BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for HealthCheckConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheckConfig")
            .field("secops_api_base_url", &self.secops_api_base_url)
            .field("secops_instance", &self.secops_instance)
            .field("backstory_api_base_url", &self.backstory_api_base_url)
            .field(
                "secops_access_token",
                &self.secops_access_token.as_ref().map(|_| "<redacted>"),
            )
            .field("rule_id", &self.rule_id)
            .field("search_window_hours", &self.search_window_hours)
            .field("github_org", &self.github_org)
            .field("github_pat", &self.github_pat.as_ref().map(|_| "<redacted>"))
            .field("github_api_base_url", &self.github_api_base_url)
            .field("max_retries", &self.max_retries)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl HealthCheckConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`, which maps a variable name to its value.
    ///
    /// Fails only on malformed values; missing required values are reported
    /// when a check asks for them.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let search_window_hours =
            parse_var::<u32>(vars::SEARCH_TIME_WINDOW_HOURS, get(vars::SEARCH_TIME_WINDOW_HOURS))?;
        if search_window_hours == Some(0) {
            return Err(HealthCheckError::config(format!(
                "{} must be a positive number of hours",
                vars::SEARCH_TIME_WINDOW_HOURS
            )));
        }
        if let Some(hours) = search_window_hours {
            SearchWindow::last_hours(hours).map_err(|_| {
                HealthCheckError::config(format!(
                    "{} value {} reaches past the earliest supported timestamp",
                    vars::SEARCH_TIME_WINDOW_HOURS,
                    hours
                ))
            })?;
        }

        let max_retries = parse_var::<u32>(vars::MAX_RETRIES, get(vars::MAX_RETRIES))?
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let request_timeout =
            parse_var::<u64>(vars::REQUEST_TIMEOUT_SECS, get(vars::REQUEST_TIMEOUT_SECS))?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT);

        Ok(Self {
            secops_api_base_url: get(vars::SECOPS_API_BASE_URL),
            secops_instance: get(vars::SECOPS_INSTANCE),
            backstory_api_base_url: get(vars::SECOPS_BACKSTORY_API_BASE_URL),
            secops_access_token: get(vars::SECOPS_ACCESS_TOKEN),
            rule_id: get(vars::RULE_ID),
            search_window_hours,
            github_org: get(vars::GITHUB_ORG_NAME),
            github_pat: get(vars::GITHUB_PAT),
            github_api_base_url: get(vars::GITHUB_API_BASE_URL)
                .unwrap_or_else(|| DEFAULT_GITHUB_API_BASE_URL.to_string()),
            max_retries,
            request_timeout,
        })
    }

    pub fn require_rule_id(&self) -> Result<&str> {
        require(&self.rule_id, vars::RULE_ID)
    }

    pub fn require_search_window_hours(&self) -> Result<u32> {
        self.search_window_hours
            .ok_or_else(|| missing(vars::SEARCH_TIME_WINDOW_HOURS))
    }

    pub fn require_github_org(&self) -> Result<&str> {
        require(&self.github_org, vars::GITHUB_ORG_NAME)
    }

    pub fn require_github_pat(&self) -> Result<&str> {
        require(&self.github_pat, vars::GITHUB_PAT)
    }

    /// Instance endpoints; the legacy Search API URL is attached when configured
    pub fn require_secops_endpoints(&self) -> Result<SecOpsEndpoints> {
        let mut endpoints = SecOpsEndpoints::new(
            require(&self.secops_api_base_url, vars::SECOPS_API_BASE_URL)?,
            require(&self.secops_instance, vars::SECOPS_INSTANCE)?,
        );
        if let Some(backstory) = &self.backstory_api_base_url {
            endpoints = endpoints.with_backstory(backstory.clone());
        }
        Ok(endpoints)
    }

    /// Authenticated SecOps session
    pub fn secops_session(&self) -> Result<Arc<dyn HttpSession>> {
        let token = require(&self.secops_access_token, vars::SECOPS_ACCESS_TOKEN)?;
        Ok(Arc::new(AuthorizedSession::new(token, self.request_timeout)?))
    }

    /// Search client wired from this configuration
    pub fn secops_client(&self) -> Result<SecOpsClient> {
        let endpoints = self.require_secops_endpoints()?;
        let executor = QueryExecutor::new(self.secops_session()?);
        Ok(SecOpsClient::new(executor, endpoints).with_max_retries(self.max_retries))
    }
}

fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| missing(name))
}

fn missing(name: &str) -> HealthCheckError {
    HealthCheckError::config(format!("required environment variable {} is not set", name))
}

fn parse_var<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                HealthCheckError::config(format!("{} has invalid value {:?}", name, raw))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<HealthCheckConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HealthCheckConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.request_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.github_api_base_url, DEFAULT_GITHUB_API_BASE_URL);
        assert!(config.rule_id.is_none());
    }

    #[test]
    fn test_missing_required_value_names_variable() {
        let config = config(&[(vars::SEARCH_TIME_WINDOW_HOURS, "24")]).unwrap();
        let err = config.require_rule_id().unwrap_err();

        assert!(matches!(err, HealthCheckError::Config(_)));
        assert!(err.to_string().contains(vars::RULE_ID));
        assert_eq!(config.require_search_window_hours().unwrap(), 24);
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let config = config(&[(vars::RULE_ID, "   ")]).unwrap();
        assert!(config.require_rule_id().is_err());
    }

    #[test]
    fn test_malformed_numbers_are_rejected() {
        assert!(matches!(
            config(&[(vars::SEARCH_TIME_WINDOW_HOURS, "a day")]),
            Err(HealthCheckError::Config(_))
        ));
        assert!(config(&[(vars::SEARCH_TIME_WINDOW_HOURS, "0")]).is_err());
        assert!(config(&[(vars::MAX_RETRIES, "-1")]).is_err());
    }

    #[test]
    fn test_oversized_window_is_rejected_at_load() {
        let err = config(&[(vars::SEARCH_TIME_WINDOW_HOURS, "4000000000")]).unwrap_err();
        assert!(matches!(err, HealthCheckError::Config(_)));
        assert!(err.to_string().contains(vars::SEARCH_TIME_WINDOW_HOURS));

        let config = config(&[(vars::SEARCH_TIME_WINDOW_HOURS, "8760")]).unwrap();
        assert_eq!(config.require_search_window_hours().unwrap(), 8760);
    }

    #[test]
    fn test_endpoints_require_base_and_instance() {
        let config = config(&[(vars::SECOPS_API_BASE_URL, "https://secops.test/v1alpha")]).unwrap();
        let err = config.require_secops_endpoints().unwrap_err();
        assert!(err.to_string().contains(vars::SECOPS_INSTANCE));

        let config = config_with_instance();
        let endpoints = config.require_secops_endpoints().unwrap();
        assert_eq!(endpoints.instance, "projects/p/locations/us/instances/i");
        assert!(endpoints.backstory_api_base_url.is_none());
    }

    fn config_with_instance() -> HealthCheckConfig {
        config(&[
            (vars::SECOPS_API_BASE_URL, "https://secops.test/v1alpha"),
            (vars::SECOPS_INSTANCE, "projects/p/locations/us/instances/i"),
        ])
        .unwrap()
    }

    #[test]
    fn test_client_requires_token() {
        let err = config_with_instance().secops_client().err().unwrap();
        assert!(err.to_string().contains(vars::SECOPS_ACCESS_TOKEN));
    }

    #[test]
    fn test_client_wiring() {
        let config = config(&[
            (vars::SECOPS_API_BASE_URL, "https://secops.test/v1alpha"),
            (vars::SECOPS_INSTANCE, "projects/p/locations/us/instances/i"),
            (vars::SECOPS_BACKSTORY_API_BASE_URL, "https://backstory.test"),
            (vars::SECOPS_ACCESS_TOKEN, "ya29"),
            (vars::MAX_RETRIES, "5"),
        ])
        .unwrap();

        let client = config.secops_client().unwrap();

        assert_eq!(client.max_retries(), 5);
        assert_eq!(
            client.endpoints().udm_search_url(),
            "https://secops.test/v1alpha/projects/p/locations/us/instances/i:udmSearch"
        );
        assert_eq!(
            client.endpoints().backstory_api_base_url.as_deref(),
            Some("https://backstory.test")
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = config(&[
            (vars::GITHUB_PAT, "ghp_secret"),
            (vars::SECOPS_ACCESS_TOKEN, "ya29"),
        ])
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("ghp_secret"));
        assert!(!debug.contains("ya29"));
    }
}
