//! Bounded FIFO of human-readable events.

use heapless::Deque;
use serde::Serialize;

/// Number of event slots.
pub const EVENT_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEntry {
    /// Clock reading in milliseconds.
    pub time: u64,
    pub description: String,
}

pub struct EventLog {
    entries: Deque<EventEntry, EVENT_LOG_CAPACITY>,
}

impl EventLog {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    /// Append, evicting the oldest entry first when full.
    pub fn push(&mut self, time: u64, description: impl Into<String>) {
        if self.entries.is_full() {
            self.entries.pop_front();
        }
        let entry = EventEntry {
            time,
            description: description.into(),
        };
        // Cannot fail: a slot was freed above.
        let _ = self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EventEntry> {
        self.entries.iter()
    }

    /// Entries oldest to newest.
    pub fn to_vec(&self) -> Vec<EventEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}
