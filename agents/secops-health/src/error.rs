//! Error types for the SecOps health checks
//!
//! Distinguishes infrastructure failures (HTTP, transport, parsing) from the
//! data-absence failures that are the health signal itself.

use serde::Serialize;
use thiserror::Error;

/// Main error type for health check operations
#[derive(Error, Debug)]
pub enum HealthCheckError {
    /// Non-success HTTP status, including a rate limit that outlived the retry budget
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// The backend answered, but the expected results are missing
    #[error("No results: {0}")]
    DataAbsence(String),

    /// Required configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request could not be completed at all
    #[error("Network error: {0}")]
    Transport(String),

    /// A success response with an unexpected body
    #[error("Parse error: {0}")]
    Parse(String),

    /// No check is registered under this name
    #[error("Unknown health check: {0}")]
    UnknownCheck(String),
}

/// Failure category, for callers that branch on the kind of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Http,
    DataAbsence,
    Config,
    Transport,
    Parse,
    UnknownCheck,
}

impl HealthCheckError {
    /// Create a data absence error
    pub fn data_absence(msg: impl Into<String>) -> Self {
        HealthCheckError::DataAbsence(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        HealthCheckError::Config(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        HealthCheckError::Parse(msg.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            HealthCheckError::Http { .. } => FailureKind::Http,
            HealthCheckError::DataAbsence(_) => FailureKind::DataAbsence,
            HealthCheckError::Config(_) => FailureKind::Config,
            HealthCheckError::Transport(_) => FailureKind::Transport,
            HealthCheckError::Parse(_) => FailureKind::Parse,
            HealthCheckError::UnknownCheck(_) => FailureKind::UnknownCheck,
        }
    }

    /// HTTP status of the failing response, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            HealthCheckError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self)
    }

    /// Check if this failure is the pipeline health signal (vs an infrastructure problem)
    pub fn is_pipeline_failure(&self) -> bool {
        matches!(self, HealthCheckError::DataAbsence(_))
    }
}

impl From<reqwest::Error> for HealthCheckError {
    fn from(err: reqwest::Error) -> Self {
        HealthCheckError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for HealthCheckError {
    fn from(err: serde_json::Error) -> Self {
        HealthCheckError::Parse(format!("JSON error: {}", err))
    }
}

/// Result type alias for health check operations
pub type Result<T> = std::result::Result<T, HealthCheckError>;

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Check passed
    Success = 0,
    /// Expected events, detections or alerts are missing
    DataAbsence = 1,
    /// Backend returned an error status
    HttpError = 2,
    /// Missing or malformed configuration
    ConfigError = 3,
    /// Network failure before a response was received
    NetworkError = 4,
    /// Unexpected response body
    ParseError = 5,
    /// Unknown check name
    UnknownCheck = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<&HealthCheckError> for ExitCode {
    fn from(err: &HealthCheckError) -> Self {
        match err.kind() {
            FailureKind::DataAbsence => ExitCode::DataAbsence,
            FailureKind::Http => ExitCode::HttpError,
            FailureKind::Config => ExitCode::ConfigError,
            FailureKind::Transport => ExitCode::NetworkError,
            FailureKind::Parse => ExitCode::ParseError,
            FailureKind::UnknownCheck => ExitCode::UnknownCheck,
        }
    }
}
