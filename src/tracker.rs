//! Behavioral event tracker
//!
//! `Tracker` owns the identity provider, the persistent log and the timer
//! state machines. The host forwards route changes and interaction signals;
//! the tracker turns them into events. Nothing on the capture surface returns
//! an error or panics: storage and serialization failures are logged and
//! absorbed.
//!
//! Timers are polled, not scheduled. Every signal first fires whatever timers
//! are due at the current clock reading, so events stay in chronological
//! order even when the host only calls in on interaction.

use crate::aggregate::{compute_aggregates, group_visits};
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::element::{
    closest, resolve_label, Element, CLICK_FALLBACK_LABEL, CLICK_SELECTORS, HOVER_FALLBACK_LABEL,
    HOVER_SELECTORS,
};
use crate::error::TrackerError;
use crate::event_log::EventLog;
use crate::identity::IdentityProvider;
use crate::scroll::{ScrollDepthTracker, ScrollGeometry};
use crate::signal::Signal;
use crate::storage::KeyValueStore;
use crate::timer::DeadlineTimer;
use crate::types::{AggregateStats, Event, EventKind, PageVisit};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const PAGE_VIEW_TARGET: &str = "load";
const DWELL_TARGET: &str = "previous_page";
const EXIT_TARGET: &str = "unload";

/// Normalize hash-based and path-based routes to `/segment` form
pub fn normalize_route(raw: &str) -> String {
    let route = raw.trim().trim_start_matches('#').trim();
    if route.is_empty() {
        "/".to_string()
    } else if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{}", route)
    }
}

/// Route currently on screen
#[derive(Debug, Clone, PartialEq)]
struct ActiveRoute {
    path: String,
    started_at: i64,
}

/// Element awaiting hover intent
#[derive(Debug, Clone, PartialEq)]
struct HoverTarget {
    label: String,
    tag: String,
}

/// Persisted state of the active visit, refreshed by the heartbeat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct VisitCheckpoint {
    path: String,
    started_at: i64,
    last_seen: i64,
}

enum Expired {
    Hover(HoverTarget),
    Scroll(ScrollGeometry),
    Heartbeat,
}

/// Behavioral event tracker bound to one storage context
pub struct Tracker<S: KeyValueStore, C: Clock> {
    config: TrackerConfig,
    store: S,
    clock: C,
    identity: IdentityProvider,
    log: EventLog,
    route: Option<ActiveRoute>,
    hover: DeadlineTimer<HoverTarget>,
    scroll_debounce: DeadlineTimer<ScrollGeometry>,
    heartbeat: DeadlineTimer<()>,
    scroll_depth: ScrollDepthTracker,
    last_timestamp: i64,
}

impl<S: KeyValueStore, C: Clock> Tracker<S, C> {
    /// Create a tracker; no events are emitted until [`Tracker::start`]
    pub fn new(config: TrackerConfig, store: S, clock: C) -> Result<Self, TrackerError> {
        config.validate()?;
        let identity = IdentityProvider::new(config.uid_key());
        let log = EventLog::load(config.log_key(), config.max_events, &store);
        let scroll_depth = ScrollDepthTracker::new(config.milestones.clone());

        Ok(Self {
            config,
            store,
            clock,
            identity,
            log,
            route: None,
            hover: DeadlineTimer::new(),
            scroll_debounce: DeadlineTimer::new(),
            heartbeat: DeadlineTimer::new(),
            scroll_depth,
            last_timestamp: i64::MIN,
        })
    }

    /// Create a tracker with the default configuration
    pub fn with_defaults(store: S, clock: C) -> Result<Self, TrackerError> {
        Self::new(TrackerConfig::default(), store, clock)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Route currently considered active
    pub fn current_path(&self) -> Option<&str> {
        self.route.as_ref().map(|r| r.path.as_str())
    }

    /// Persisted anonymous identity of this storage context
    pub fn user_id(&mut self) -> String {
        self.identity.get_user_id(&mut self.store)
    }

    /// Begin tracking on the initial route.
    ///
    /// A visit left open by a previous lifetime (no clean unload) is closed
    /// first with a recovered `session_exit`.
    pub fn start(&mut self, path: &str) {
        self.recover_unfinished_visit();
        log::info!("tracking enabled on {}", normalize_route(path));
        self.on_route_change(path);
    }

    /// Dispatch a host signal
    pub fn handle(&mut self, signal: &Signal) {
        match signal {
            Signal::Navigate { path } => self.on_route_change(path),
            Signal::Click { chain } => self.on_click(chain),
            Signal::PointerEnter { chain } => self.on_pointer_enter(chain),
            Signal::PointerLeave => self.on_pointer_leave(),
            Signal::Scroll { .. } => {
                if let Some(geometry) = signal.scroll_geometry() {
                    self.on_scroll(geometry);
                }
            }
            Signal::Unload => self.on_unload(),
            Signal::Tick => self.poll(),
        }
    }

    /// The active route changed
    pub fn on_route_change(&mut self, path: &str) {
        self.poll();
        let now = self.clock.now_ms();
        let path = normalize_route(path);

        if let Some(previous) = self.route.take() {
            let dwell_secs = elapsed_secs(previous.started_at, now);
            if dwell_secs > self.config.dwell_noise_threshold_secs {
                let mut meta = Map::new();
                meta.insert("duration".to_string(), Value::from(dwell_secs));
                self.emit(EventKind::DwellTime, DWELL_TARGET, &previous.path, now, meta);
            } else {
                log::debug!("skipping {}s dwell on {}", dwell_secs, previous.path);
            }
        }

        self.hover.cancel();
        self.scroll_debounce.cancel();
        self.scroll_depth.reset();
        self.route = Some(ActiveRoute {
            path: path.clone(),
            started_at: now,
        });

        self.emit(EventKind::PageView, PAGE_VIEW_TARGET, &path, now, Map::new());
        self.write_checkpoint(now);
        if self.config.heartbeat_interval_ms > 0 {
            self.heartbeat
                .arm(now, self.config.heartbeat_interval_ms, ());
        }
    }

    /// A click reached the document
    pub fn on_click(&mut self, chain: &[Element]) {
        self.poll();
        let Some(element) = closest(chain, CLICK_SELECTORS) else {
            return;
        };
        let label = resolve_label(element, self.config.label_max_chars, CLICK_FALLBACK_LABEL);
        let mut meta = Map::new();
        meta.insert("tag".to_string(), Value::from(element.tag_name()));

        let now = self.clock.now_ms();
        let path = self.active_path();
        self.emit(EventKind::Click, &label, &path, now, meta);
    }

    /// The pointer entered an element; starts (or restarts) the intent timer
    pub fn on_pointer_enter(&mut self, chain: &[Element]) {
        self.poll();
        match closest(chain, HOVER_SELECTORS) {
            Some(element) => {
                let target = HoverTarget {
                    label: resolve_label(element, self.config.label_max_chars, HOVER_FALLBACK_LABEL),
                    tag: element.tag_name(),
                };
                let now = self.clock.now_ms();
                self.hover.arm(now, self.config.hover_intent_ms, target);
            }
            None => self.hover.cancel(),
        }
    }

    /// The pointer left the hovered element
    pub fn on_pointer_leave(&mut self) {
        self.poll();
        self.hover.cancel();
    }

    /// The document scrolled; evaluated once scrolling settles
    pub fn on_scroll(&mut self, geometry: ScrollGeometry) {
        self.poll();
        let now = self.clock.now_ms();
        self.scroll_debounce
            .arm(now, self.config.scroll_debounce_ms, geometry);
    }

    /// The page is being unloaded
    pub fn on_unload(&mut self) {
        self.poll();
        self.hover.cancel();
        self.scroll_debounce.cancel();
        self.heartbeat.cancel();

        let Some(route) = self.route.take() else {
            log::debug!("unload without an active route");
            return;
        };
        let now = self.clock.now_ms();
        let mut meta = Map::new();
        meta.insert(
            "duration".to_string(),
            Value::from(elapsed_secs(route.started_at, now)),
        );
        self.emit(EventKind::SessionExit, EXIT_TARGET, &route.path, now, meta);

        if let Err(e) = self.store.remove_item(&self.config.visit_key()) {
            log::warn!("failed to clear visit checkpoint: {}", e);
        }
        log::info!("tracking stopped on {}", route.path);
    }

    /// Fire every timer whose deadline has passed, in deadline order
    pub fn poll(&mut self) {
        let now = self.clock.now_ms();
        let mut expired: Vec<(i64, Expired)> = Vec::new();
        if let Some((deadline, target)) = self.hover.poll(now) {
            expired.push((deadline, Expired::Hover(target)));
        }
        if let Some((deadline, geometry)) = self.scroll_debounce.poll(now) {
            expired.push((deadline, Expired::Scroll(geometry)));
        }
        if let Some((deadline, ())) = self.heartbeat.poll(now) {
            expired.push((deadline, Expired::Heartbeat));
        }
        expired.sort_by_key(|(deadline, _)| *deadline);

        for (deadline, timer) in expired {
            match timer {
                Expired::Hover(target) => {
                    let mut meta = Map::new();
                    meta.insert("tag".to_string(), Value::from(target.tag));
                    let path = self.active_path();
                    self.emit(EventKind::Hover, &target.label, &path, deadline, meta);
                }
                Expired::Scroll(geometry) => self.evaluate_scroll(geometry, deadline),
                Expired::Heartbeat => {
                    self.write_checkpoint(now);
                    self.heartbeat
                        .arm(now, self.config.heartbeat_interval_ms, ());
                }
            }
        }
    }

    /// Full current log, oldest first
    pub fn raw_data(&self) -> Vec<Event> {
        self.log.read_all(&self.store)
    }

    /// Summary statistics recomputed from the log
    pub fn aggregated_data(&self) -> AggregateStats {
        compute_aggregates(&self.raw_data())
    }

    /// Route visits reconstructed from the log
    pub fn page_visits(&self) -> Vec<PageVisit> {
        group_visits(&self.raw_data())
    }

    /// The log as a pretty-printed JSON array, ready for download
    pub fn export_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string_pretty(&self.raw_data())?)
    }

    /// Erase the log and the visit checkpoint; the identity is kept
    pub fn clear(&mut self) -> Result<(), TrackerError> {
        self.log.clear(&mut self.store)?;
        self.store.remove_item(&self.config.visit_key())?;
        Ok(())
    }

    fn evaluate_scroll(&mut self, geometry: ScrollGeometry, at: i64) {
        let Some(percent) = geometry.percent() else {
            return;
        };
        if let Some(milestone) = self.scroll_depth.observe(percent) {
            let mut meta = Map::new();
            meta.insert("percent".to_string(), Value::from(milestone));
            let path = self.active_path();
            self.emit(
                EventKind::ScrollMilestone,
                &format!("{}%", milestone),
                &path,
                at,
                meta,
            );
        }
    }

    fn active_path(&self) -> String {
        self.route
            .as_ref()
            .map(|r| r.path.clone())
            .unwrap_or_else(|| "/".to_string())
    }

    fn emit(
        &mut self,
        kind: EventKind,
        target: &str,
        path: &str,
        timestamp: i64,
        metadata: Map<String, Value>,
    ) {
        let timestamp = timestamp.max(self.last_timestamp);
        self.last_timestamp = timestamp;

        let event = Event {
            user_id: self.user_id(),
            kind,
            target: target.to_string(),
            path: path.to_string(),
            timestamp,
            metadata,
        };
        log::debug!("{} {} on {}", event.kind, event.target, event.path);
        self.log.append(&mut self.store, event);
    }

    fn write_checkpoint(&mut self, now: i64) {
        let Some(route) = &self.route else {
            return;
        };
        let checkpoint = VisitCheckpoint {
            path: route.path.clone(),
            started_at: route.started_at,
            last_seen: now,
        };
        let result = serde_json::to_string(&checkpoint)
            .map_err(TrackerError::from)
            .and_then(|json| {
                self.store
                    .set_item(&self.config.visit_key(), &json)
                    .map_err(TrackerError::from)
            });
        if let Err(e) = result {
            log::warn!("failed to write visit checkpoint: {}", e);
        }
    }

    fn recover_unfinished_visit(&mut self) {
        let key = self.config.visit_key();
        let raw = match self.store.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                log::warn!("visit checkpoint unreadable: {}", e);
                return;
            }
        };

        match serde_json::from_str::<VisitCheckpoint>(&raw) {
            Ok(checkpoint) => {
                let duration = elapsed_secs(checkpoint.started_at, checkpoint.last_seen);
                log::info!(
                    "recovering unfinished visit to {} ({}s)",
                    checkpoint.path,
                    duration
                );
                let mut meta = Map::new();
                meta.insert("duration".to_string(), Value::from(duration));
                meta.insert("recovered".to_string(), Value::from(true));
                let now = self.clock.now_ms();
                self.emit(EventKind::SessionExit, EXIT_TARGET, &checkpoint.path, now, meta);
            }
            Err(e) => log::warn!("discarding corrupt visit checkpoint: {}", e),
        }

        if let Err(e) = self.store.remove_item(&key) {
            log::warn!("failed to clear visit checkpoint: {}", e);
        }
    }
}

/// Whole seconds between two millisecond timestamps, never negative
fn elapsed_secs(from_ms: i64, to_ms: i64) -> i64 {
    to_ms.saturating_sub(from_ms).max(0) / 1000
}
