//! DMS configuration

use serde::{Deserialize, Serialize};

/// Tracker thresholds and window lengths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// Mean EAR below this value counts as eyes closed
    pub ear_threshold: f64,

    /// Mouth-open ratio above this value counts as a yawn in progress
    pub yawn_ratio_threshold: f64,

    /// Trailing window for blink rate (milliseconds)
    pub blink_window_ms: u64,

    /// Trailing window for yawn frequency (milliseconds)
    pub yawn_window_ms: u64,

    /// Minimum gap between two distinct yawn events (milliseconds)
    pub yawn_debounce_ms: u64,

    /// Trailing window for nod detection (milliseconds)
    pub nod_window_ms: u64,

    /// Nodding needs strictly more samples than this in the window
    pub nod_min_samples: usize,

    /// Pitch swing that counts as a nod (degrees)
    pub nod_pitch_range_degrees: f64,

    /// Minimum spacing between history samples (milliseconds)
    pub history_interval_ms: u64,

    /// Maximum number of history samples retained
    pub history_capacity: usize,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.2,
            yawn_ratio_threshold: 0.5,
            blink_window_ms: 60_000,
            yawn_window_ms: 60_000,
            yawn_debounce_ms: 5_000,
            nod_window_ms: 3_000,
            nod_min_samples: 10,
            nod_pitch_range_degrees: 15.0,
            history_interval_ms: 5_000,
            history_capacity: 60,
        }
    }
}

impl DmsConfig {
    /// Create strict config (eyes flagged closed earlier, smaller nods count)
    pub fn strict() -> Self {
        Self {
            ear_threshold: 0.23,
            yawn_ratio_threshold: 0.45,
            nod_pitch_range_degrees: 12.0,
            ..Default::default()
        }
    }

    /// Create lenient config (for drivers with naturally narrow eyes)
    pub fn lenient() -> Self {
        Self {
            ear_threshold: 0.17,
            yawn_ratio_threshold: 0.6,
            nod_pitch_range_degrees: 20.0,
            ..Default::default()
        }
    }
}
