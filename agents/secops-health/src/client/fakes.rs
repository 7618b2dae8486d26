//! In-memory session and sleeper for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use super::{HttpSession, QueryParams, SessionResponse, Sleeper};
use crate::error::{HealthCheckError, Result};

/// Replays scripted responses in order and records each request
#[derive(Default)]
pub(crate) struct ScriptedSession {
    responses: Mutex<VecDeque<SessionResponse>>,
    calls: Mutex<Vec<(String, QueryParams)>>,
}

impl ScriptedSession {
    pub(crate) fn new(responses: Vec<SessionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn json(bodies: Vec<serde_json::Value>) -> Self {
        Self::new(
            bodies
                .into_iter()
                .map(|body| SessionResponse::new(200, body.to_string()))
                .collect(),
        )
    }

    pub(crate) fn calls(&self) -> Vec<(String, QueryParams)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpSession for ScriptedSession {
    async fn get(&self, url: &str, params: &QueryParams) -> Result<SessionResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), params.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| HealthCheckError::Transport(format!("unexpected request to {}", url)))
    }
}

/// Records requested sleeps without waiting
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
