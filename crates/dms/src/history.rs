//! Periodic fatigue history for trend display

use ring_buffer::BoundedBuffer;
use serde::{Deserialize, Serialize};

use crate::analysis::{AlertLevel, FatigueMetrics};

/// One periodic sample of the fatigue state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueHistory {
    /// Sample time (milliseconds, same clock as the session)
    pub timestamp_ms: u64,
    pub perclos: f64,
    pub alert_level: AlertLevel,
    pub blink_rate: u32,
    pub yawn_count: u32,
}

impl FatigueHistory {
    pub fn sample(timestamp_ms: u64, metrics: &FatigueMetrics, alert_level: AlertLevel) -> Self {
        Self {
            timestamp_ms,
            perclos: metrics.perclos,
            alert_level,
            blink_rate: metrics.blink_rate,
            yawn_count: metrics.yawn_count,
        }
    }
}

/// Bounded history sampled at most once per interval
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: BoundedBuffer<FatigueHistory>,
    interval_ms: u64,
    last_append_ms: Option<u64>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize, interval_ms: u64) -> Self {
        Self {
            entries: BoundedBuffer::new(capacity),
            interval_ms,
            last_append_ms: None,
        }
    }

    /// Append a sample if the interval has elapsed since the last one.
    ///
    /// The first offer of a session is always taken.
    pub fn offer(&mut self, now_ms: u64, metrics: &FatigueMetrics, alert_level: AlertLevel) -> bool {
        let due = self
            .last_append_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= self.interval_ms);
        if !due {
            return false;
        }
        self.entries
            .push(FatigueHistory::sample(now_ms, metrics, alert_level));
        self.last_append_ms = Some(now_ms);
        true
    }

    /// Samples, oldest first
    pub fn snapshot(&self) -> Vec<FatigueHistory> {
        self.entries.to_vec()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_append_ms(&self) -> Option<u64> {
        self.last_append_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_respect_interval() {
        let mut history = HistoryBuffer::new(60, 5_000);
        let metrics = FatigueMetrics::default();

        assert!(history.offer(1_000, &metrics, AlertLevel::Alert));
        assert!(!history.offer(3_000, &metrics, AlertLevel::Alert));
        assert!(!history.offer(5_999, &metrics, AlertLevel::Alert));
        assert!(history.offer(6_000, &metrics, AlertLevel::Drowsy));

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].alert_level, AlertLevel::Drowsy);
        assert_eq!(history.last_append_ms(), Some(6_000));
    }

    #[test]
    fn test_keeps_most_recent_sixty() {
        let mut history = HistoryBuffer::new(60, 5_000);
        let metrics = FatigueMetrics::default();

        for i in 0..75u64 {
            assert!(history.offer(i * 5_000, &metrics, AlertLevel::Alert));
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 60);
        assert_eq!(snapshot[0].timestamp_ms, 15 * 5_000);
        assert_eq!(snapshot[59].timestamp_ms, 74 * 5_000);
    }
}
