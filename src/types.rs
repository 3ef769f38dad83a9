//! Core data types for the behavioral event tracker
//!
//! Events are immutable once emitted. Aggregates and page visits are always
//! derived from the event log and never persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Kind of captured interaction or lifecycle record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PageView,
    Click,
    Hover,
    ScrollMilestone,
    DwellTime,
    SessionExit,
    /// A kind written by a newer tracker version
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PageView => "page_view",
            EventKind::Click => "click",
            EventKind::Hover => "hover",
            EventKind::ScrollMilestone => "scroll_milestone",
            EventKind::DwellTime => "dwell_time",
            EventKind::SessionExit => "session_exit",
            EventKind::Unknown => "unknown",
        }
    }

    /// Whether events of this kind carry a `duration` in seconds
    pub fn carries_duration(&self) -> bool {
        matches!(self, EventKind::DwellTime | EventKind::SessionExit)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single captured event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Identity of the browser that produced the event
    #[serde(default)]
    pub user_id: String,
    /// Event kind
    pub kind: EventKind,
    /// Label of the interacted element (or a fixed lifecycle label)
    pub target: String,
    /// Logical route active when the event was captured
    pub path: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Kind-specific fields (`duration`, `tag`, `percent`, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Event {
    /// Build an event without metadata
    pub fn new(
        user_id: impl Into<String>,
        kind: EventKind,
        target: impl Into<String>,
        path: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            target: target.into(),
            path: path.into(),
            timestamp,
            metadata: Map::new(),
        }
    }

    /// Attach one metadata entry
    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Dwell or exit duration in seconds
    pub fn duration_secs(&self) -> Option<f64> {
        self.metadata.get("duration").and_then(Value::as_f64)
    }

    /// Scroll milestone percentage.
    ///
    /// Falls back to parsing a `"50%"`-style target for logs written without
    /// the `percent` metadata field.
    pub fn scroll_percent(&self) -> Option<f64> {
        self.metadata
            .get("percent")
            .and_then(Value::as_f64)
            .or_else(|| self.target.trim_end_matches('%').trim().parse::<f64>().ok())
    }

    /// Element tag name for click and hover events
    pub fn tag(&self) -> Option<&str> {
        self.metadata.get("tag").and_then(Value::as_str)
    }
}

/// Summary statistics derived from the event log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    /// Number of events in the log
    pub total_events: usize,
    /// Number of `page_view` events
    pub total_views: u64,
    /// Number of distinct identities seen in the log
    pub total_sessions: u64,
    /// Mean dwell/exit duration in seconds (0 if none)
    pub avg_view_time: f64,
    /// Mean scroll milestone percentage (0 if none)
    pub avg_scroll_depth: f64,
    /// Click counts keyed by target label
    pub click_frequency: BTreeMap<String, u64>,
    /// Hover counts keyed by target label
    pub hover_frequency: BTreeMap<String, u64>,
    /// Page view counts keyed by route
    pub page_visits: BTreeMap<String, u64>,
}

/// One route visit reconstructed from the flat log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageVisit {
    /// Identity that made the visit
    pub user_id: String,
    /// Visited route
    pub path: String,
    /// Timestamp of the `page_view`
    pub started_at: i64,
    /// Seconds spent on the route, if a dwell/exit event closed the visit
    pub view_time_secs: Option<f64>,
    /// Highest scroll milestone reached (0 if none)
    pub max_scroll: f64,
    /// Clicks recorded during the visit
    pub clicks: u32,
    /// Hovers recorded during the visit
    pub hovers: u32,
}
