//! Check outcome types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{DetectionsQuery, RuleAlertsQuery, SearchWindow, UdmSearchQuery};
use crate::error::HealthCheckError;

/// Stage of a health check that can fail independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStage {
    /// GitHub API reachability
    GithubPing,
    /// Test events searchable in SecOps
    LogIngestion,
    /// Rule produced at least one detection
    DetectionGeneration,
    /// Rule produced at least one alert
    AlertGeneration,
}

impl CheckStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStage::GithubPing => "github_ping",
            CheckStage::LogIngestion => "log_ingestion",
            CheckStage::DetectionGeneration => "detection_generation",
            CheckStage::AlertGeneration => "alert_generation",
        }
    }
}

impl fmt::Display for CheckStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result count recorded by a passing stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: CheckStage,
    pub count: usize,
}

/// Summary of a passing check run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    /// Registered check name
    pub check: String,

    /// Identifier of this invocation, for log correlation
    pub run_id: Uuid,

    /// Search window the stages ran against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<SearchWindow>,

    /// Stages in the order they passed
    pub stages: Vec<StageReport>,

    pub completed_at: DateTime<Utc>,
}

impl CheckReport {
    pub fn new(check: impl Into<String>, window: Option<SearchWindow>) -> Self {
        Self {
            check: check.into(),
            run_id: Uuid::new_v4(),
            window,
            stages: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    /// Record a passing stage
    pub fn with_stage(mut self, stage: CheckStage, count: usize) -> Self {
        self.stages.push(StageReport { stage, count });
        self.completed_at = Utc::now();
        self
    }

    /// Count recorded for `stage`, if it ran
    pub fn count(&self, stage: CheckStage) -> Option<usize> {
        self.stages.iter().find(|s| s.stage == stage).map(|s| s.count)
    }
}

/// Parameters of the search a failing stage ran
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "search", rename_all = "snake_case")]
pub enum QueryContext {
    Udm(UdmSearchQuery),
    Detections(DetectionsQuery),
    /// Alerts are fetched for every rule and filtered on `rule_id` afterwards
    RuleAlerts {
        rule_id: String,
        #[serde(flatten)]
        query: RuleAlertsQuery,
    },
}

impl QueryContext {
    pub fn window(&self) -> Option<&SearchWindow> {
        match self {
            QueryContext::Udm(query) => Some(&query.window),
            QueryContext::Detections(query) => query.window.as_ref(),
            QueryContext::RuleAlerts { query, .. } => Some(&query.window),
        }
    }

    /// Rule the search was scoped to, if any
    pub fn rule_id(&self) -> Option<&str> {
        match self {
            QueryContext::Udm(_) => None,
            QueryContext::Detections(query) => Some(&query.rule_id),
            QueryContext::RuleAlerts { rule_id, .. } => Some(rule_id),
        }
    }
}

/// A stage error, tagged with the stage that raised it and the search it ran
#[derive(Debug)]
pub struct StageFailure {
    pub stage: CheckStage,
    pub error: HealthCheckError,
    pub query: Option<QueryContext>,
}

impl StageFailure {
    pub fn new(stage: CheckStage, error: HealthCheckError) -> Self {
        Self {
            stage,
            error,
            query: None,
        }
    }

    /// Attach the search that produced the failure
    pub fn with_query(mut self, query: QueryContext) -> Self {
        self.query = Some(query);
        self
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for StageFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Terminal result of one check invocation. There is no degraded state.
#[derive(Debug)]
pub enum CheckOutcome {
    Passed(CheckReport),
    Failed {
        check: String,
        /// `None` when the check failed before any stage ran (configuration, unknown check)
        stage: Option<CheckStage>,
        error: HealthCheckError,
        /// Search that returned no qualifying results, or that the failing request belonged to
        query: Option<QueryContext>,
    },
}

impl CheckOutcome {
    /// Failure raised before any stage ran
    pub fn setup_failed(check: impl Into<String>, error: HealthCheckError) -> Self {
        CheckOutcome::Failed {
            check: check.into(),
            stage: None,
            error,
            query: None,
        }
    }

    /// Failure raised by a stage
    pub fn stage_failed(check: impl Into<String>, failure: StageFailure) -> Self {
        CheckOutcome::Failed {
            check: check.into(),
            stage: Some(failure.stage),
            error: failure.error,
            query: failure.query,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, CheckOutcome::Passed(_))
    }

    /// Failing stage, if any
    pub fn failed_stage(&self) -> Option<CheckStage> {
        match self {
            CheckOutcome::Passed(_) => None,
            CheckOutcome::Failed { stage, .. } => *stage,
        }
    }

    pub fn error(&self) -> Option<&HealthCheckError> {
        match self {
            CheckOutcome::Passed(_) => None,
            CheckOutcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn query(&self) -> Option<&QueryContext> {
        match self {
            CheckOutcome::Passed(_) => None,
            CheckOutcome::Failed { query, .. } => query.as_ref(),
        }
    }

    pub fn into_result(self) -> Result<CheckReport, HealthCheckError> {
        match self {
            CheckOutcome::Passed(report) => Ok(report),
            CheckOutcome::Failed { error, .. } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_stage_counts() {
        let report = CheckReport::new("validate-alert-generation", None)
            .with_stage(CheckStage::DetectionGeneration, 3)
            .with_stage(CheckStage::AlertGeneration, 1);

        assert_eq!(report.count(CheckStage::DetectionGeneration), Some(3));
        assert_eq!(report.count(CheckStage::AlertGeneration), Some(1));
        assert_eq!(report.count(CheckStage::LogIngestion), None);
    }

    #[test]
    fn test_stage_failure_outcome() {
        let failure = StageFailure::new(
            CheckStage::AlertGeneration,
            HealthCheckError::data_absence("no alerts"),
        );
        let outcome = CheckOutcome::stage_failed("validate-alert-generation", failure);

        assert!(!outcome.is_passed());
        assert_eq!(outcome.failed_stage(), Some(CheckStage::AlertGeneration));
        assert!(matches!(outcome.error(), Some(HealthCheckError::DataAbsence(_))));
        assert!(outcome.query().is_none());
    }

    #[test]
    fn test_failure_carries_query() {
        let window = SearchWindow::new("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z");
        let failure = StageFailure::new(
            CheckStage::AlertGeneration,
            HealthCheckError::data_absence("no alerts"),
        )
        .with_query(QueryContext::RuleAlerts {
            rule_id: "ru_1".to_string(),
            query: RuleAlertsQuery::new(window.clone()),
        });
        let outcome = CheckOutcome::stage_failed("validate-alert-generation", failure);

        let query = outcome.query().unwrap();
        assert_eq!(query.rule_id(), Some("ru_1"));
        assert_eq!(query.window(), Some(&window));

        let json = serde_json::to_value(query).unwrap();
        assert_eq!(json["search"], "rule_alerts");
        assert_eq!(json["rule_id"], "ru_1");
        assert_eq!(json["window"]["start_time"], "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_stage_serializes_snake_case() {
        let json = serde_json::to_string(&CheckStage::DetectionGeneration).unwrap();
        assert_eq!(json, "\"detection_generation\"");
    }
}
