//! Bounded, write-through persistent event log
//!
//! The log is stored as one JSON array under a single key. Every append is a
//! read-modify-write of that array; the newest events sit at the end and the
//! oldest are evicted once the capacity is exceeded.
//!
//! Concurrent writers sharing the same storage (several tabs) are not
//! coordinated: the last write wins.

use crate::error::TrackerError;
use crate::storage::KeyValueStore;
use crate::types::Event;
use std::collections::VecDeque;

/// Persistent FIFO-bounded event log
#[derive(Debug, Clone)]
pub struct EventLog {
    key: String,
    capacity: usize,
    /// Last sequence this instance wrote (or tried to write)
    cache: VecDeque<Event>,
    /// Set while storage rejects writes; the cache is authoritative meanwhile
    degraded: bool,
}

impl EventLog {
    /// Create a log bound to `key` holding at most `capacity` events
    pub fn new(key: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            key: key.into(),
            capacity,
            cache: VecDeque::with_capacity(capacity.min(256)),
            degraded: false,
        }
    }

    /// Create a log and warm its cache from storage
    pub fn load<S: KeyValueStore + ?Sized>(
        key: impl Into<String>,
        capacity: usize,
        store: &S,
    ) -> Self {
        let mut log = Self::new(key, capacity);
        if let Ok(events) = log.read_persisted(store) {
            log.cache = events.into();
            log.trim();
        }
        log
    }

    /// Storage key of the log
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Maximum number of retained events
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the last write to storage failed
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Append one event and write the bounded log back to storage.
    ///
    /// Storage failures are logged and absorbed; the event is kept in memory.
    pub fn append<S: KeyValueStore + ?Sized>(&mut self, store: &mut S, event: Event) {
        let mut events = if self.degraded {
            std::mem::take(&mut self.cache)
        } else {
            match self.read_persisted(store) {
                Ok(events) => VecDeque::from(events),
                Err(e) => {
                    log::warn!("event log unreadable, continuing in memory: {}", e);
                    self.degraded = true;
                    std::mem::take(&mut self.cache)
                }
            }
        };

        events.push_back(event);
        self.cache = events;
        self.trim();

        match self.write(store) {
            Ok(()) => {
                if self.degraded {
                    log::info!("event log storage recovered");
                }
                self.degraded = false;
            }
            Err(e) => {
                log::warn!("failed to persist event log ({} events): {}", self.cache.len(), e);
                self.degraded = true;
            }
        }
    }

    /// Current log contents, oldest first.
    ///
    /// Absent or corrupt storage yields an empty sequence. While storage is
    /// rejecting writes the in-memory copy is returned instead.
    pub fn read_all<S: KeyValueStore + ?Sized>(&self, store: &S) -> Vec<Event> {
        if self.degraded {
            return self.cache.iter().cloned().collect();
        }
        match self.read_persisted(store) {
            Ok(events) => events,
            Err(e) => {
                log::warn!("event log unreadable: {}", e);
                self.cache.iter().cloned().collect()
            }
        }
    }

    /// Remove the persisted log and the in-memory copy
    pub fn clear<S: KeyValueStore + ?Sized>(&mut self, store: &mut S) -> Result<(), TrackerError> {
        self.cache.clear();
        self.degraded = false;
        store.remove_item(&self.key)?;
        Ok(())
    }

    /// Read the persisted array; corrupt JSON reads as empty
    fn read_persisted<S: KeyValueStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Vec<Event>, TrackerError> {
        let Some(raw) = store.get_item(&self.key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Event>>(&raw) {
            Ok(mut events) => {
                if events.len() > self.capacity {
                    events.drain(..events.len() - self.capacity);
                }
                Ok(events)
            }
            Err(e) => {
                log::warn!("discarding corrupt event log under {}: {}", self.key, e);
                Ok(Vec::new())
            }
        }
    }

    fn write<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), TrackerError> {
        let json = serde_json::to_string(&self.cache)?;
        store.set_item(&self.key, &json)?;
        Ok(())
    }

    fn trim(&mut self) {
        while self.cache.len() > self.capacity {
            self.cache.pop_front();
        }
    }
}
