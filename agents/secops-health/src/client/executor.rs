//! Rate-limit aware query execution
//!
//! Only HTTP 429 is retried. Every other error status is fatal on first
//! occurrence, since retrying cannot fix a configuration or backend fault.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{HttpSession, QueryParams, SessionResponse};
use crate::error::{HealthCheckError, Result};

/// Fixed wait after a rate-limited response
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Default number of retries after a rate-limited response
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// What to do after a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then send the same request again
    Retry { wait: Duration },
    /// Keep this response
    Stop,
}

/// Backoff policy: maps a response status and the retries already used to a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    max_retries: u32,
    interval: Duration,
}

impl BackoffPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            interval: RATE_LIMIT_BACKOFF,
        }
    }

    /// Set the wait between attempts
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn decide(&self, status: u16, retries_used: u32) -> RetryDecision {
        if status == 429 && retries_used < self.max_retries {
            RetryDecision::Retry {
                wait: self.interval,
            }
        } else {
            RetryDecision::Stop
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

/// Suspends the current task between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Per-call retry bookkeeping, discarded when the call returns
#[derive(Debug, Default)]
struct RetryState {
    attempts: u32,
    retries_used: u32,
    last_status: Option<u16>,
    slept: Duration,
}

/// Issues GET requests through a session and applies the backoff policy
#[derive(Clone)]
pub struct QueryExecutor {
    session: Arc<dyn HttpSession>,
    sleeper: Arc<dyn Sleeper>,
    interval: Duration,
}

impl QueryExecutor {
    /// Create new executor with the tokio sleeper
    pub fn new(session: Arc<dyn HttpSession>) -> Self {
        Self {
            session,
            sleeper: Arc::new(TokioSleeper),
            interval: RATE_LIMIT_BACKOFF,
        }
    }

    /// Replace the sleeper
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Set the wait after a rate-limited response
    pub fn with_backoff_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Send one GET, retrying up to `max_retries` times while the backend answers 429.
    ///
    /// Fails with [`HealthCheckError::Http`] if the final status is 400 or above.
    pub async fn execute(
        &self,
        url: &str,
        params: &QueryParams,
        max_retries: u32,
    ) -> Result<SessionResponse> {
        let policy = BackoffPolicy::new(max_retries).with_interval(self.interval);
        let mut state = RetryState::default();

        loop {
            let response = self.session.get(url, params).await?;
            state.attempts += 1;
            state.last_status = Some(response.status);

            match policy.decide(response.status, state.retries_used) {
                RetryDecision::Retry { wait } => {
                    tracing::warn!(
                        url = %url,
                        status = response.status,
                        body = %response.body,
                        attempt = state.attempts,
                        max_retries = policy.max_retries(),
                        wait_secs = wait.as_secs(),
                        "API rate limit exceeded, sleeping before retrying"
                    );
                    self.sleeper.sleep(wait).await;
                    state.retries_used += 1;
                    state.slept += wait;
                }
                RetryDecision::Stop => {
                    tracing::debug!(
                        url = %url,
                        status = ?state.last_status,
                        attempts = state.attempts,
                        slept_secs = state.slept.as_secs(),
                        "Request finished"
                    );
                    return check_status(url, response);
                }
            }
        }
    }

    /// Send one GET without retrying
    pub async fn execute_once(&self, url: &str, params: &QueryParams) -> Result<SessionResponse> {
        self.execute(url, params, 0).await
    }
}

fn check_status(url: &str, response: SessionResponse) -> Result<SessionResponse> {
    if response.is_error() {
        tracing::error!(
            url = %url,
            status = response.status,
            body = %response.body,
            "Request failed"
        );
        return Err(HealthCheckError::Http {
            status: response.status,
            body: response.body,
        });
    }
    Ok(response)
}
