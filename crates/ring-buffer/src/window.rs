//! Trailing Time Window

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A value tagged with the millisecond timestamp it was observed at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct TimedSample<T> {
    timestamp_ms: u64,
    value: T,
}

/// Samples kept only while they are within `window_ms` of "now".
///
/// Timestamps are expected to be pushed in non-decreasing order. A sample is
/// stale once `now - timestamp > window_ms`; callers purge with [`prune`]
/// before reading so every observation only sees in-window samples.
///
/// [`prune`]: TimeWindow::prune
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeWindow<T> {
    samples: VecDeque<TimedSample<T>>,
    window_ms: u64,
}

impl<T> TimeWindow<T> {
    /// Create an empty window spanning `window_ms`
    pub fn new(window_ms: u64) -> Self {
        Self {
            samples: VecDeque::new(),
            window_ms,
        }
    }

    /// Append a sample
    pub fn push(&mut self, timestamp_ms: u64, value: T) {
        self.samples.push_back(TimedSample {
            timestamp_ms,
            value,
        });
    }

    /// Drop every sample older than the window, relative to `now_ms`
    pub fn prune(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.window_ms);
        while let Some(front) = self.samples.front() {
            if front.timestamp_ms >= cutoff {
                break;
            }
            self.samples.pop_front();
        }
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Timestamp of the most recent sample
    pub fn last_timestamp(&self) -> Option<u64> {
        self.samples.back().map(|s| s.timestamp_ms)
    }

    /// Iterate sample timestamps oldest to newest
    pub fn timestamps(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().map(|s| s.timestamp_ms)
    }

    /// Iterate sample values oldest to newest
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.samples.iter().map(|s| &s.value)
    }
}

impl TimeWindow<()> {
    /// Record a bare event at `timestamp_ms`
    pub fn mark(&mut self, timestamp_ms: u64) {
        self.push(timestamp_ms, ());
    }
}
