//! Pipeline validation checks
//!
//! Search indexing and rule evaluation lag behind ingestion, so every
//! check searches a trailing window rather than a single point in time.

use async_trait::async_trait;

use super::{HealthCheck, VALIDATE_ALERT_GENERATION, VALIDATE_LOG_INGESTION};
use crate::client::{collect_pages, ResultSet, SecOpsClient};
use crate::config::HealthCheckConfig;
use crate::contracts::*;
use crate::error::{HealthCheckError, Result};

/// Programmatic access name of the token used by the GitHub ping check
pub const GITHUB_PING_TOKEN_NAME: &str = "github-api-health-check";

/// UDM query matching the audit events produced by the GitHub ping check
pub fn github_ping_event_query(org: &str) -> String {
    format!(
        concat!(
            r#"metadata.log_type = "GITHUB" AND metadata.product_name = "GITHUB" "#,
            r#"AND metadata.product_event_type = "api.request" AND extracted.fields["org"] = "{}" "#,
            r#"AND network.http.method = "GET" "#,
            r#"AND extracted.fields["user_programmatic_access_name"] = "{}""#
        ),
        org, GITHUB_PING_TOKEN_NAME
    )
}

/// Validates that the test events generated by the ping check are searchable
pub struct LogIngestionCheck {
    client: SecOpsClient,
    query: UdmSearchQuery,
}

impl LogIngestionCheck {
    pub fn new(client: SecOpsClient, query: UdmSearchQuery) -> Self {
        Self { client, query }
    }

    /// Check for the GitHub ping audit events of `org` in `window`
    pub fn github(client: SecOpsClient, org: &str, window: SearchWindow) -> Self {
        Self::new(client, UdmSearchQuery::new(github_ping_event_query(org), window))
    }

    pub fn from_config(config: &HealthCheckConfig) -> Result<Self> {
        let window = SearchWindow::last_hours(config.require_search_window_hours()?)?;
        let org = config.require_github_org()?;
        let client = config.secops_client()?;
        Ok(Self::github(client, org, window))
    }

    pub fn query(&self) -> &UdmSearchQuery {
        &self.query
    }

    /// Run the UDM search once and return the number of matching events
    pub async fn validate_log_ingestion(&self) -> Result<usize> {
        let query_json = serde_json::to_string_pretty(&self.query)?;
        tracing::info!(query = %query_json, "Running UDM search to validate GitHub log ingestion");

        let response = self.client.udm_search(&self.query).await?;

        match response.events {
            Some(events) if !events.is_empty() => {
                tracing::info!(count = events.len(), query = %query_json, "Events returned from UDM search");
                Ok(events.len())
            }
            _ => {
                tracing::error!(query = %query_json, "0 events returned from UDM search");
                Err(HealthCheckError::data_absence(format!(
                    "0 events returned from UDM search: {}",
                    query_json
                )))
            }
        }
    }
}

#[async_trait]
impl HealthCheck for LogIngestionCheck {
    fn name(&self) -> &str {
        VALIDATE_LOG_INGESTION
    }

    async fn run(&self) -> std::result::Result<CheckReport, StageFailure> {
        let count = self.validate_log_ingestion().await.map_err(|e| {
            StageFailure::new(CheckStage::LogIngestion, e)
                .with_query(QueryContext::Udm(self.query().clone()))
        })?;

        Ok(CheckReport::new(self.name(), Some(self.query().window.clone()))
            .with_stage(CheckStage::LogIngestion, count))
    }
}

/// Validates that a detection rule produced a detection and then an alert.
///
/// Stages run strictly in order; the alert stage never runs if the detection
/// stage fails.
pub struct AlertGenerationCheck {
    client: SecOpsClient,
    rule_id: String,
    window: SearchWindow,
}

impl AlertGenerationCheck {
    pub fn new(client: SecOpsClient, rule_id: impl Into<String>, window: SearchWindow) -> Self {
        Self {
            client,
            rule_id: rule_id.into(),
            window,
        }
    }

    pub fn from_config(config: &HealthCheckConfig) -> Result<Self> {
        let window = SearchWindow::last_hours(config.require_search_window_hours()?)?;
        let rule_id = config.require_rule_id()?;
        let client = config.secops_client()?;
        Ok(Self::new(client, rule_id, window))
    }

    pub fn rule_id(&self) -> &str {
        &self.rule_id
    }

    pub fn window(&self) -> &SearchWindow {
        &self.window
    }

    /// First-page detection query for the rule, listed by creation time
    pub fn detections_query(&self) -> DetectionsQuery {
        DetectionsQuery::new(self.rule_id.as_str())
            .with_window(self.window().clone())
            .with_list_basis(ListBasis::CreatedTime)
    }

    /// Alert query for the window; alerts of every rule come back
    pub fn alerts_query(&self) -> RuleAlertsQuery {
        RuleAlertsQuery::new(self.window().clone())
    }

    /// Collect every detection the rule created in the window
    pub async fn validate_detection_generation(&self) -> Result<ResultSet<Detection>> {
        tracing::info!(
            rule_id = %self.rule_id,
            start_time = %self.window.start_time,
            end_time = %self.window.end_time,
            "Searching for detections"
        );

        let query = self.detections_query();
        let client = &self.client;

        let detections = collect_pages(|cursor| {
            let page_query = query.with_page_token(cursor);
            async move { client.search_detections(&page_query).await }
        })
        .await
        .map_err(|err| match err {
            HealthCheckError::DataAbsence(_) => {
                tracing::error!(
                    rule_id = %self.rule_id,
                    start_time = %self.window.start_time,
                    end_time = %self.window.end_time,
                    "No detections found for rule. Check data pipeline and rule for issues."
                );
                HealthCheckError::data_absence(format!(
                    "No detections found for rule ID {} between {}. Check data pipeline and rule for issues.",
                    self.rule_id, self.window
                ))
            }
            other => other,
        })?;

        tracing::info!(
            rule_id = %self.rule_id,
            count = detections.len(),
            pages = detections.pages(),
            "Retrieved detections for rule"
        );
        Ok(detections)
    }

    /// Find the alerts raised by the rule in the window and return their count
    pub async fn validate_alert_generation(&self) -> Result<usize> {
        tracing::info!(
            start_time = %self.window.start_time,
            end_time = %self.window.end_time,
            "Searching for alerts generated by rules"
        );

        let response = self
            .client
            .search_rule_alerts(&self.alerts_query())
            .await?;

        if response.is_empty() {
            tracing::error!(
                start_time = %self.window.start_time,
                end_time = %self.window.end_time,
                "No alerts found for any rules"
            );
            return Err(HealthCheckError::data_absence(format!(
                "No alerts found for any rules between {}. Check data pipeline and rule for issues.",
                self.window
            )));
        }

        let relevant = response.alerts_for_rule(&self.rule_id).count();
        if relevant == 0 {
            tracing::error!(
                rule_id = %self.rule_id,
                start_time = %self.window.start_time,
                end_time = %self.window.end_time,
                "No alerts found for rule"
            );
            return Err(HealthCheckError::data_absence(format!(
                "No alerts found for rule ID {} between {}. Check data pipeline and rule for issues.",
                self.rule_id, self.window
            )));
        }

        tracing::info!(rule_id = %self.rule_id, count = relevant, "Retrieved alerts for rule");
        Ok(relevant)
    }
}

#[async_trait]
impl HealthCheck for AlertGenerationCheck {
    fn name(&self) -> &str {
        VALIDATE_ALERT_GENERATION
    }

    async fn run(&self) -> std::result::Result<CheckReport, StageFailure> {
        let detections = self.validate_detection_generation().await.map_err(|e| {
            StageFailure::new(CheckStage::DetectionGeneration, e)
                .with_query(QueryContext::Detections(self.detections_query()))
        })?;

        let alerts = self.validate_alert_generation().await.map_err(|e| {
            StageFailure::new(CheckStage::AlertGeneration, e).with_query(QueryContext::RuleAlerts {
                rule_id: self.rule_id.clone(),
                query: self.alerts_query(),
            })
        })?;

        Ok(CheckReport::new(self.name(), Some(self.window().clone()))
            .with_stage(CheckStage::DetectionGeneration, detections.len())
            .with_stage(CheckStage::AlertGeneration, alerts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fakes::{RecordingSleeper, ScriptedSession};
    use crate::client::{QueryExecutor, SecOpsEndpoints, SessionResponse};
    use crate::error::FailureKind;
    use serde_json::json;
    use std::sync::Arc;

    fn client(session: &Arc<ScriptedSession>) -> SecOpsClient {
        let executor = QueryExecutor::new(session.clone())
            .with_sleeper(Arc::new(RecordingSleeper::default()));
        SecOpsClient::new(executor, SecOpsEndpoints::new("https://secops.test/v1alpha", "instances/i"))
    }

    fn window() -> SearchWindow {
        SearchWindow::new("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z")
    }

    fn alerts(rule_ids: &[&str]) -> serde_json::Value {
        let alerts: Vec<_> = rule_ids
            .iter()
            .map(|id| json!({"ruleMetadata": {"ruleId": id}}))
            .collect();
        json!({ "ruleAlerts": alerts })
    }

    #[test]
    fn test_github_event_query() {
        let query = github_ping_event_query("threatpunter1");
        assert!(query.starts_with(r#"metadata.log_type = "GITHUB" AND"#));
        assert!(query.contains(r#"extracted.fields["org"] = "threatpunter1""#));
        assert!(query.ends_with(r#"extracted.fields["user_programmatic_access_name"] = "github-api-health-check""#));
    }

    #[tokio::test]
    async fn test_log_ingestion_counts_events() {
        let session = Arc::new(ScriptedSession::json(vec![json!({"events": [{"e": 1}, {"e": 2}]})]));
        let check = LogIngestionCheck::github(client(&session), "org", window());

        let report = check.run().await.unwrap();

        assert_eq!(report.count(CheckStage::LogIngestion), Some(2));
        assert_eq!(session.call_count(), 1);
    }

    #[tokio::test]
    async fn test_log_ingestion_empty_events() {
        let session = Arc::new(ScriptedSession::json(vec![json!({"events": []})]));
        let check = LogIngestionCheck::github(client(&session), "org", window());

        let failure = check.run().await.unwrap_err();

        assert_eq!(failure.stage, CheckStage::LogIngestion);
        assert_eq!(failure.error.kind(), FailureKind::DataAbsence);
        let query = failure.query.unwrap();
        assert_eq!(query, QueryContext::Udm(check.query().clone()));
        assert_eq!(query.window(), Some(&window()));
    }

    #[tokio::test]
    async fn test_detections_collected_across_pages() {
        let session = Arc::new(ScriptedSession::json(vec![
            json!({"detections": [{"id": "d1"}], "nextPageToken": "tok1"}),
            json!({"detections": [{"id": "d2"}, {"id": "d3"}]}),
        ]));
        let check = AlertGenerationCheck::new(client(&session), "ru_1", window());

        let detections = check.validate_detection_generation().await.unwrap();

        let ids: Vec<_> = detections.items().iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["d1", "d2", "d3"]);

        let calls = session.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].1.contains("page_token"));
        assert_eq!(calls[1].1.get("page_token"), Some("tok1"));
        for (_, params) in &calls {
            assert_eq!(params.get("rule_id"), Some("ru_1"));
            assert_eq!(params.get("list_basis"), Some("CREATED_TIME"));
            assert_eq!(params.get("start_time"), Some("2024-01-01T00:00:00Z"));
        }
    }

    #[tokio::test]
    async fn test_no_detections_skips_alert_stage() {
        let session = Arc::new(ScriptedSession::json(vec![
            json!({}),
            alerts(&["ru_1"]),
        ]));
        let check = AlertGenerationCheck::new(client(&session), "ru_1", window());

        let failure = check.run().await.unwrap_err();

        assert_eq!(failure.stage, CheckStage::DetectionGeneration);
        assert!(failure.error.to_string().contains("ru_1"));
        assert_eq!(session.call_count(), 1);

        match failure.query {
            Some(QueryContext::Detections(query)) => {
                assert_eq!(query.rule_id, "ru_1");
                assert_eq!(query.window, Some(window()));
                assert_eq!(query.list_basis, Some(ListBasis::CreatedTime));
                assert!(query.page_token.is_none());
            }
            other => panic!("unexpected query context: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_alert_filter_keeps_matching_rule() {
        let session = Arc::new(ScriptedSession::json(vec![
            json!({"detections": [{"id": "d1"}]}),
            alerts(&["A", "B", "A"]),
        ]));
        let check = AlertGenerationCheck::new(client(&session), "A", window());

        let report = check.run().await.unwrap();

        assert_eq!(report.count(CheckStage::DetectionGeneration), Some(1));
        assert_eq!(report.count(CheckStage::AlertGeneration), Some(2));
    }

    #[tokio::test]
    async fn test_alert_filter_without_matching_rule() {
        let session = Arc::new(ScriptedSession::json(vec![
            json!({"detections": [{"id": "d1"}]}),
            alerts(&["A", "B", "A"]),
        ]));
        let check = AlertGenerationCheck::new(client(&session), "C", window());

        let failure = check.run().await.unwrap_err();

        assert_eq!(failure.stage, CheckStage::AlertGeneration);
        assert!(failure.error.to_string().contains("rule ID C"));
        assert_eq!(
            failure.query,
            Some(QueryContext::RuleAlerts {
                rule_id: "C".to_string(),
                query: RuleAlertsQuery::new(window()),
            })
        );
    }

    #[tokio::test]
    async fn test_no_alerts_for_any_rule() {
        let session = Arc::new(ScriptedSession::json(vec![json!({})]));
        let check = AlertGenerationCheck::new(client(&session), "A", window());

        let err = check.validate_alert_generation().await.unwrap_err();

        assert!(err.to_string().contains("any rules"));
    }

    #[tokio::test]
    async fn test_http_error_is_not_data_absence() {
        let session = Arc::new(ScriptedSession::new(vec![SessionResponse::new(403, "denied")]));
        let check = AlertGenerationCheck::new(client(&session), "A", window());

        let failure = check.run().await.unwrap_err();

        assert_eq!(failure.stage, CheckStage::DetectionGeneration);
        assert_eq!(failure.error.kind(), FailureKind::Http);
    }
}
