//! SecOps Health Checks
//!
//! Scheduled checks that verify GitHub Enterprise audit logs flow end to end
//! into Google SecOps: events are searchable, and the health check rule
//! produces detections and alerts.
//!
//! # Checks
//! - `github-ping`: read the organization through the GitHub API
//! - `validate-log-ingestion`: find the resulting audit events with a UDM search
//! - `validate-alert-generation`: find the rule's detections, then its alerts
//!
//! # Design Principles
//! - Read-only: the checks never write to the backend
//! - Stateless: each invocation owns its session and results
//! - Binary: a check passes or fails, there is no degraded state

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod telemetry;

#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
pub use error::{HealthCheckError, Result};
