//! Timeline gap tracking.

use std::collections::HashMap;

/// Remembers the timestamp of the last gap placed on each sink stream.
///
/// Gaps must be placed in strictly increasing timestamp order per stream;
/// a gap at or before the last accepted one is stale and ignored.
#[derive(Debug, Clone, Default)]
pub struct GapTracker {
    last_gap: HashMap<u16, i64>,
}

impl GapTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a gap at `timestamp` on `sink_index`.
    ///
    /// Returns `true` if the gap is newer than the last one accepted for
    /// that stream and must be forwarded to the encoder.
    pub fn advance(&mut self, sink_index: u16, timestamp: i64) -> bool {
        match self.last_gap.get(&sink_index) {
            Some(&last) if timestamp <= last => false,
            _ => {
                self.last_gap.insert(sink_index, timestamp);
                true
            }
        }
    }

    /// Timestamp of the last accepted gap on `sink_index`.
    pub fn last_gap(&self, sink_index: u16) -> Option<i64> {
        self.last_gap.get(&sink_index).copied()
    }
}
