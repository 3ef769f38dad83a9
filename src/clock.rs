//! Time sources
//!
//! The tracker never reads the wall clock directly, so timer-driven behavior
//! (hover intent, scroll debounce, heartbeats) can run on virtual time.

use chrono::Utc;
use std::cell::Cell;
use std::rc::Rc;

/// Millisecond time source
pub trait Clock {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Virtual clock moved forward explicitly.
///
/// Clones share the same time, so a test can keep a handle while the tracker
/// owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    /// Jump to an absolute time; earlier times are ignored
    pub fn set(&self, ms: i64) {
        if ms > self.now.get() {
            self.now.set(ms);
        }
    }

    /// Move forward by `ms`
    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms.max(0));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}
