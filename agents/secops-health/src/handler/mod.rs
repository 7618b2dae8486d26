//! HTTP handler for the health checks
//!
//! Cloud Run entry point: a scheduler POSTs an opaque trigger payload to
//! `/checks/{name}` and treats a `200 OK` body of `OK` as success.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::HealthCheckConfig;
use crate::contracts::*;
use crate::engine::HealthCheckEngine;
use crate::error::{FailureKind, HealthCheckError};

/// Success body expected by the scheduler
pub const SUCCESS_BODY: &str = "OK";

/// Application state
pub struct AppState {
    pub engine: HealthCheckEngine,
    pub config: HealthCheckConfig,
}

impl AppState {
    pub fn new(engine: HealthCheckEngine, config: HealthCheckConfig) -> Self {
        Self { engine, config }
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/checks", get(list_checks))
        .route("/checks/:name", post(run_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Registered check names
async fn list_checks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let names: Vec<String> = state.engine.names().into_iter().map(String::from).collect();
    Json(names)
}

/// Run a check; the trigger payload is accepted but not interpreted
async fn run_check(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Bytes,
) -> Response {
    tracing::debug!(check = %name, payload_bytes = payload.len(), "Received check trigger");

    match state.engine.run(&name, &state.config).await {
        CheckOutcome::Passed(_) => (StatusCode::OK, SUCCESS_BODY).into_response(),
        CheckOutcome::Failed {
            check,
            stage,
            error,
            query,
        } => {
            let body = ApiError {
                kind: error.kind(),
                message: error.to_string(),
                check,
                stage,
                query,
            };
            (status_for(&error), Json(body)).into_response()
        }
    }
}

/// HTTP status reported to the scheduler for a failed check
pub fn status_for(error: &HealthCheckError) -> StatusCode {
    match error.kind() {
        FailureKind::UnknownCheck => StatusCode::NOT_FOUND,
        FailureKind::Http | FailureKind::Transport => StatusCode::BAD_GATEWAY,
        FailureKind::DataAbsence | FailureKind::Config | FailureKind::Parse => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// API error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
    pub check: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<CheckStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryContext>,
}
