//! Aggregation over the event log
//!
//! Pure functions: the same event slice always yields the same result, and
//! nothing here is persisted.

use crate::types::{AggregateStats, Event, EventKind, PageVisit};
use std::collections::{HashMap, HashSet};

/// Compute summary statistics for a dashboard.
///
/// - `total_views`: number of `page_view` events
/// - `total_sessions`: number of distinct identities
/// - `avg_view_time`: mean `duration` of `dwell_time`/`session_exit` events
/// - `avg_scroll_depth`: mean milestone percentage
/// - click, hover and page-view counts keyed by target or route
pub fn compute_aggregates(events: &[Event]) -> AggregateStats {
    let mut stats = AggregateStats {
        total_events: events.len(),
        ..AggregateStats::default()
    };

    let mut identities: HashSet<&str> = HashSet::new();
    let mut durations = Vec::new();
    let mut scroll_depths = Vec::new();

    for event in events {
        if !event.user_id.is_empty() {
            identities.insert(event.user_id.as_str());
        }

        match event.kind {
            EventKind::PageView => {
                stats.total_views += 1;
                *stats.page_visits.entry(event.path.clone()).or_insert(0) += 1;
            }
            EventKind::Click => {
                *stats.click_frequency.entry(event.target.clone()).or_insert(0) += 1;
            }
            EventKind::Hover => {
                *stats.hover_frequency.entry(event.target.clone()).or_insert(0) += 1;
            }
            EventKind::ScrollMilestone => {
                scroll_depths.push(event.scroll_percent().unwrap_or(0.0));
            }
            _ if event.kind.carries_duration() => {
                durations.push(event.duration_secs().unwrap_or(0.0));
            }
            _ => {}
        }
    }

    stats.total_sessions = identities.len() as u64;
    stats.avg_view_time = mean(&durations);
    stats.avg_scroll_depth = mean(&scroll_depths);
    stats
}

/// Mean of a slice, 0 when empty
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Reconstruct route visits from the flat log.
///
/// A `page_view` opens a visit for its identity. Interactions on the same
/// route attach to the open visit, and a `dwell_time` or `session_exit` for
/// that route closes it with its duration.
pub fn group_visits(events: &[Event]) -> Vec<PageVisit> {
    let mut visits: Vec<PageVisit> = Vec::new();
    let mut open: HashMap<&str, usize> = HashMap::new();

    for event in events {
        if event.kind == EventKind::PageView {
            open.insert(event.user_id.as_str(), visits.len());
            visits.push(PageVisit {
                user_id: event.user_id.clone(),
                path: event.path.clone(),
                started_at: event.timestamp,
                view_time_secs: None,
                max_scroll: 0.0,
                clicks: 0,
                hovers: 0,
            });
            continue;
        }

        let Some(&index) = open.get(event.user_id.as_str()) else {
            continue;
        };
        let visit = &mut visits[index];
        if visit.path != event.path {
            continue;
        }

        match event.kind {
            EventKind::Click => visit.clicks += 1,
            EventKind::Hover => visit.hovers += 1,
            EventKind::ScrollMilestone => {
                let depth = event.scroll_percent().unwrap_or(0.0);
                if depth > visit.max_scroll {
                    visit.max_scroll = depth;
                }
            }
            _ if event.kind.carries_duration() => {
                visit.view_time_secs = event.duration_secs();
                open.remove(event.user_id.as_str());
            }
            _ => {}
        }
    }

    visits
}
