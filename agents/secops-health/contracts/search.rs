//! Search query and response types for the Google SecOps APIs

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HealthCheckError, Result};

/// UDM search coerces anything above this to the maximum
pub const MAX_UDM_SEARCH_LIMIT: u32 = 10_000;

/// Timestamp format accepted by the search endpoints
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A detection as returned by the backend; its shape is opaque to the checks
pub type Detection = serde_json::Value;

/// A UDM event as returned by the backend
pub type UdmEvent = serde_json::Value;

/// Half-open search window `[start_time, end_time)` in RFC3339 UTC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub start_time: String,
    pub end_time: String,
}

impl SearchWindow {
    /// Create a window from already formatted timestamps
    pub fn new(start_time: impl Into<String>, end_time: impl Into<String>) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }

    /// Window covering the `hours` leading up to `end`.
    ///
    /// Fails with a config error if the start would fall outside the representable range.
    pub fn ending_at(end: DateTime<Utc>, hours: u32) -> Result<Self> {
        let start = TimeDelta::try_hours(i64::from(hours))
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                HealthCheckError::config(format!("search window of {} hours is out of range", hours))
            })?;
        Ok(Self::new(format_timestamp(start), format_timestamp(end)))
    }

    /// Window covering the `hours` leading up to now
    pub fn last_hours(hours: u32) -> Result<Self> {
        Self::ending_at(Utc::now(), hours)
    }
}

impl fmt::Display for SearchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} and {}", self.start_time, self.end_time)
    }
}

/// Format a timestamp the way the search endpoints expect it
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// UDM search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UdmSearchQuery {
    /// UDM query expression
    pub query: String,

    /// Time range to search
    pub window: SearchWindow,

    /// Maximum number of events, already clamped to [`MAX_UDM_SEARCH_LIMIT`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl UdmSearchQuery {
    pub fn new(query: impl Into<String>, window: SearchWindow) -> Self {
        Self {
            query: query.into(),
            window,
            limit: None,
        }
    }

    /// Cap the number of returned events
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit.min(MAX_UDM_SEARCH_LIMIT));
        self
    }
}

/// Filter detections by their alerting state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertState {
    Alerting,
    NotAlerting,
}

impl AlertState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertState::Alerting => "ALERTING",
            AlertState::NotAlerting => "NOT_ALERTING",
        }
    }
}

/// Whether the detection time filter applies to detection time or creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListBasis {
    DetectionTime,
    CreatedTime,
}

impl ListBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListBasis::DetectionTime => "DETECTION_TIME",
            ListBasis::CreatedTime => "CREATED_TIME",
        }
    }
}

/// Detection search query.
///
/// `rule_id` is passed through untouched and accepts `{id}`, `{id}@{revision}`,
/// `{id}@*` and `*`. A `page_token` is only valid together with the exact
/// parameters of the query that produced it, so pages are requested with
/// [`DetectionsQuery::with_page_token`] on the first query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionsQuery {
    pub rule_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_state: Option<AlertState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<SearchWindow>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_basis: Option<ListBasis>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,
}

impl DetectionsQuery {
    pub fn new(rule_id: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            alert_state: None,
            window: None,
            list_basis: None,
            page_size: None,
            page_token: None,
        }
    }

    pub fn with_window(mut self, window: SearchWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_alert_state(mut self, state: AlertState) -> Self {
        self.alert_state = Some(state);
        self
    }

    pub fn with_list_basis(mut self, basis: ListBasis) -> Self {
        self.list_basis = Some(basis);
        self
    }

    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Same query, positioned at `token`
    pub fn with_page_token(&self, token: Option<String>) -> Self {
        Self {
            page_token: token,
            ..self.clone()
        }
    }
}

/// Rule alerts search query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleAlertsQuery {
    pub window: SearchWindow,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_alerts: Option<u32>,
}

impl RuleAlertsQuery {
    pub fn new(window: SearchWindow) -> Self {
        Self {
            window,
            max_alerts: None,
        }
    }

    pub fn with_max_alerts(mut self, max: u32) -> Self {
        self.max_alerts = Some(max);
        self
    }
}

/// One page of a paginated search.
///
/// `items` is `None` when the backend omitted the result field entirely,
/// which is different from an empty page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Option<Vec<T>>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Option<Vec<T>>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// Final page carrying `items`
    pub fn last(items: Vec<T>) -> Self {
        Self::new(Some(items), None)
    }
}

/// UDM search response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UdmSearchResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<UdmEvent>>,

    #[serde(default)]
    pub more_data_available: bool,
}

impl UdmSearchResponse {
    /// Number of returned events, zero when the field is absent
    pub fn event_count(&self) -> usize {
        self.events.as_ref().map_or(0, Vec::len)
    }
}

/// Detection search response body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionsResponse {
    #[serde(default)]
    pub detections: Option<Vec<Detection>>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl From<DetectionsResponse> for Page<Detection> {
    fn from(response: DetectionsResponse) -> Self {
        Page::new(response.detections, response.next_page_token)
    }
}

/// Rule identity attached to an alert
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleMetadata {
    #[serde(default)]
    pub rule_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
}

/// An alert raised by a detection rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAlert {
    #[serde(default)]
    pub rule_metadata: RuleMetadata,

    /// Remaining alert fields, kept for diagnostics
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl RuleAlert {
    pub fn rule_id(&self) -> Option<&str> {
        self.rule_metadata.rule_id.as_deref()
    }
}

/// Rule alerts search response body. Alerts for every rule in range are returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAlertsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_alerts: Option<Vec<RuleAlert>>,
}

impl RuleAlertsResponse {
    /// True when no alert for any rule was returned
    pub fn is_empty(&self) -> bool {
        self.rule_alerts.as_ref().map_or(true, Vec::is_empty)
    }

    /// Alerts whose rule identity equals `rule_id`
    pub fn alerts_for_rule<'a>(&'a self, rule_id: &'a str) -> impl Iterator<Item = &'a RuleAlert> + 'a {
        self.rule_alerts
            .iter()
            .flatten()
            .filter(move |alert| alert.rule_id() == Some(rule_id))
    }
}
