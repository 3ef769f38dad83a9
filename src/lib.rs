//! Hepple Analytics - On-device behavioral event tracker
//!
//! The tracker turns storefront interaction signals into timestamped events,
//! keeps them in a bounded local log and serves aggregates to a dashboard:
//! identity → event capture → persistent log → aggregation.
//!
//! ## Modules
//!
//! - **Capture**: [`Tracker`] reacts to route changes, clicks, hover intent,
//!   scroll depth and unloads
//! - **Persistence**: [`storage`] backends and the FIFO-bounded [`event_log`]
//! - **Aggregation**: [`aggregate`] derives dashboard statistics and page visits

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod element;
pub mod error;
pub mod event_log;
pub mod identity;
pub mod scroll;
pub mod signal;
pub mod storage;
pub mod timer;
pub mod tracker;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregate::{compute_aggregates, group_visits};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use element::Element;
pub use error::{StorageError, TrackerError};
pub use signal::{Signal, TimedSignal};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tracker::Tracker;
pub use types::{AggregateStats, Event, EventKind, PageVisit};

/// Crate version, reported by the CLI
pub const TRACKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "hepple-analytics";
