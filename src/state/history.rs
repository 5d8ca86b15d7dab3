//! Fixed-capacity measurement history.
//!
//! Backed by `heapless::HistoryBuffer`: the write cursor wraps and the
//! oldest entry is overwritten once all [`HISTORY_CAPACITY`] slots are in
//! use. The buffer tracks how many slots have ever been written, so a cold
//! start never reports unwritten slots.

use heapless::HistoryBuffer;
use serde::Serialize;

/// Number of history slots.
pub const HISTORY_CAPACITY: usize = 300;

/// One recorded measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Clock reading in milliseconds.
    pub time: u64,
    pub temperature: f32,
}

pub struct HistoryRing {
    buf: HistoryBuffer<HistoryEntry, HISTORY_CAPACITY>,
}

impl HistoryRing {
    pub const fn new() -> Self {
        Self {
            buf: HistoryBuffer::new(),
        }
    }

    /// Write at the cursor, overwriting the oldest entry when full.
    pub fn push(&mut self, time: u64, temperature: f32) {
        self.buf.write(HistoryEntry { time, temperature });
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.buf.recent()
    }

    /// Entries oldest to newest.
    pub fn chronological(&self) -> Vec<HistoryEntry> {
        self.buf.oldest_ordered().copied().collect()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new()
    }
}
