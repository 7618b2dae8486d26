//! Health check engine
//!
//! Named checks are built from configuration on demand, so a check only
//! fails on configuration it actually uses, and always before its first
//! network call.

mod ping;
mod validation;

pub use ping::*;
pub use validation::*;

use async_trait::async_trait;

use crate::config::HealthCheckConfig;
use crate::contracts::*;
use crate::error::{HealthCheckError, Result};

/// Registered check names
pub const GITHUB_PING: &str = "github-ping";
pub const VALIDATE_LOG_INGESTION: &str = "validate-log-ingestion";
pub const VALIDATE_ALERT_GENERATION: &str = "validate-alert-generation";

/// A pass/fail health check made of one or more ordered stages
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Check identifier
    fn name(&self) -> &str;

    /// Run all stages in order, stopping at the first failure
    async fn run(&self) -> std::result::Result<CheckReport, StageFailure>;
}

/// Builds a check from configuration
pub type CheckFactory =
    Box<dyn Fn(&HealthCheckConfig) -> Result<Box<dyn HealthCheck>> + Send + Sync>;

/// Registry of named checks
pub struct HealthCheckEngine {
    factories: Vec<(String, CheckFactory)>,
}

impl Default for HealthCheckEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthCheckEngine {
    /// Create new engine with the GitHub Enterprise checks
    pub fn new() -> Self {
        Self::empty()
            .register(GITHUB_PING, |config| {
                Ok(Box::new(GithubPingCheck::from_config(config)?))
            })
            .register(VALIDATE_LOG_INGESTION, |config| {
                Ok(Box::new(LogIngestionCheck::from_config(config)?))
            })
            .register(VALIDATE_ALERT_GENERATION, |config| {
                Ok(Box::new(AlertGenerationCheck::from_config(config)?))
            })
    }

    /// Create engine without any checks
    pub fn empty() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Register a check, replacing any check with the same name
    pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&HealthCheckConfig) -> Result<Box<dyn HealthCheck>> + Send + Sync + 'static,
    {
        let name = name.into();
        self.factories.retain(|(existing, _)| *existing != name);
        self.factories.push((name, Box::new(factory)));
        self
    }

    /// Registered check names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| n == name)
    }

    /// Build the named check
    pub fn build(&self, name: &str, config: &HealthCheckConfig) -> Result<Box<dyn HealthCheck>> {
        let (_, factory) = self
            .factories
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| HealthCheckError::UnknownCheck(name.to_string()))?;
        factory(config)
    }

    /// Build and run the named check
    pub async fn run(&self, name: &str, config: &HealthCheckConfig) -> CheckOutcome {
        match self.build(name, config) {
            Ok(check) => run_check(name, check.as_ref()).await,
            Err(error) => {
                tracing::error!(
                    check = %name,
                    kind = ?error.kind(),
                    error = %error,
                    "Health check could not be started"
                );
                CheckOutcome::setup_failed(name, error)
            }
        }
    }
}

/// Run a check under the name it was triggered by and log its outcome
pub async fn run_check(name: &str, check: &dyn HealthCheck) -> CheckOutcome {
    tracing::info!(check = %name, "Running health check");

    match check.run().await {
        Ok(mut report) => {
            report.check = name.to_string();
            tracing::info!(
                check = %name,
                run_id = %report.run_id,
                stages = ?report.stages,
                "Health check passed"
            );
            CheckOutcome::Passed(report)
        }
        Err(failure) => {
            tracing::error!(
                check = %name,
                stage = %failure.stage,
                kind = ?failure.error.kind(),
                error = %failure.error,
                query = ?failure.query,
                "Health check failed"
            );
            CheckOutcome::stage_failed(name, failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    struct StaticCheck {
        fail: bool,
    }

    #[async_trait]
    impl HealthCheck for StaticCheck {
        fn name(&self) -> &str {
            "static"
        }

        async fn run(&self) -> std::result::Result<CheckReport, StageFailure> {
            if self.fail {
                Err(StageFailure::new(
                    CheckStage::LogIngestion,
                    HealthCheckError::data_absence("nothing"),
                ))
            } else {
                Ok(CheckReport::new("static", None).with_stage(CheckStage::LogIngestion, 1))
            }
        }
    }

    #[test]
    fn test_default_checks_registered() {
        let engine = HealthCheckEngine::new();
        assert_eq!(
            engine.names(),
            vec![GITHUB_PING, VALIDATE_LOG_INGESTION, VALIDATE_ALERT_GENERATION]
        );
    }

    #[test]
    fn test_register_replaces_existing() {
        let engine = HealthCheckEngine::empty()
            .register("static", |_| Ok(Box::new(StaticCheck { fail: true })))
            .register("static", |_| Ok(Box::new(StaticCheck { fail: false })));
        assert_eq!(engine.names(), vec!["static"]);
    }

    #[tokio::test]
    async fn test_unknown_check() {
        let outcome = HealthCheckEngine::new()
            .run("nope", &HealthCheckConfig::default())
            .await;

        assert_eq!(outcome.error().map(|e| e.kind()), Some(FailureKind::UnknownCheck));
        assert_eq!(outcome.failed_stage(), None);
    }

    #[tokio::test]
    async fn test_missing_config_fails_before_running() {
        let outcome = HealthCheckEngine::new()
            .run(VALIDATE_ALERT_GENERATION, &HealthCheckConfig::default())
            .await;

        assert_eq!(outcome.error().map(|e| e.kind()), Some(FailureKind::Config));
        assert_eq!(outcome.failed_stage(), None);
    }

    #[tokio::test]
    async fn test_stage_failure_is_reported() {
        let engine = HealthCheckEngine::empty()
            .register("static", |_| Ok(Box::new(StaticCheck { fail: true })));

        let outcome = engine.run("static", &HealthCheckConfig::default()).await;

        assert_eq!(outcome.failed_stage(), Some(CheckStage::LogIngestion));
        assert!(outcome.error().unwrap().is_pipeline_failure());
    }

    #[tokio::test]
    async fn test_passing_check() {
        let outcome = run_check("static", &StaticCheck { fail: false }).await;
        let report = outcome.into_result().unwrap();
        assert_eq!(report.count(CheckStage::LogIngestion), Some(1));
    }

    #[tokio::test]
    async fn test_outcome_uses_registered_name() {
        let engine = HealthCheckEngine::empty()
            .register("nightly-ok", |_| Ok(Box::new(StaticCheck { fail: false })))
            .register("nightly-bad", |_| Ok(Box::new(StaticCheck { fail: true })));
        let config = HealthCheckConfig::default();

        let report = engine.run("nightly-ok", &config).await.into_result().unwrap();
        assert_eq!(report.check, "nightly-ok");

        match engine.run("nightly-bad", &config).await {
            CheckOutcome::Failed { check, .. } => assert_eq!(check, "nightly-bad"),
            CheckOutcome::Passed(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_out_of_range_window_is_config_error() {
        let config = HealthCheckConfig {
            search_window_hours: Some(4_000_000_000),
            rule_id: Some("ru_1".to_string()),
            ..HealthCheckConfig::default()
        };

        for name in [VALIDATE_LOG_INGESTION, VALIDATE_ALERT_GENERATION] {
            let outcome = HealthCheckEngine::new().run(name, &config).await;
            assert_eq!(outcome.error().map(|e| e.kind()), Some(FailureKind::Config));
            assert_eq!(outcome.failed_stage(), None);
        }
    }
}
