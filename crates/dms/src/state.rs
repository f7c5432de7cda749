//! Driver state tracking: eye-closure counter and rolling-window trackers

use ring_buffer::TimeWindow;

use crate::config::DmsConfig;

/// Session-cumulative eye closure counter (PERCLOS).
///
/// Not windowed: every processed face frame since the session started counts.
#[derive(Debug, Clone, Default)]
pub struct PerclosCounter {
    closed_frames: u64,
    total_frames: u64,
}

impl PerclosCounter {
    pub fn record(&mut self, eyes_open: bool) {
        self.total_frames += 1;
        if !eyes_open {
            self.closed_frames += 1;
        }
    }

    /// Percentage of frames with eyes closed (0-100)
    pub fn perclos(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.closed_frames as f64 / self.total_frames as f64 * 100.0
    }

    pub fn closed_frames(&self) -> u64 {
        self.closed_frames
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

/// Blink events over a trailing window, edge-triggered on open -> closed
#[derive(Debug, Clone)]
pub struct BlinkTracker {
    blinks: TimeWindow<()>,
    last_eyes_open: bool,
}

impl BlinkTracker {
    pub fn new(window_ms: u64) -> Self {
        Self {
            blinks: TimeWindow::new(window_ms),
            last_eyes_open: true,
        }
    }

    /// Feed the eye state of one frame; returns true when a blink started
    pub fn record(&mut self, eyes_open: bool, now_ms: u64) -> bool {
        let blink = self.last_eyes_open && !eyes_open;
        if blink {
            self.blinks.mark(now_ms);
        }
        self.last_eyes_open = eyes_open;
        blink
    }

    /// Blinks within the window ending at `now_ms`
    pub fn rate(&mut self, now_ms: u64) -> u32 {
        self.blinks.prune(now_ms);
        self.blinks.len() as u32
    }

    /// In-window blink timestamps (call [`rate`](Self::rate) first to purge)
    pub fn timestamps(&self) -> Vec<u64> {
        self.blinks.timestamps().collect()
    }
}

/// Yawn events over a trailing window with a debounce gap
#[derive(Debug, Clone)]
pub struct YawnTracker {
    yawns: TimeWindow<()>,
    ratio_threshold: f64,
    debounce_ms: u64,
}

impl YawnTracker {
    pub fn new(window_ms: u64, ratio_threshold: f64, debounce_ms: u64) -> Self {
        Self {
            yawns: TimeWindow::new(window_ms),
            ratio_threshold,
            debounce_ms,
        }
    }

    /// Feed one frame's mouth-open ratio; returns true when a new yawn was counted.
    ///
    /// A yawn spanning several seconds is counted once: a new event is only
    /// recorded when the previous one is at least `debounce_ms` old.
    pub fn record(&mut self, mouth_open_ratio: f64, now_ms: u64) -> bool {
        if mouth_open_ratio <= self.ratio_threshold {
            return false;
        }
        let debounced = self
            .yawns
            .last_timestamp()
            .is_some_and(|last| now_ms.saturating_sub(last) < self.debounce_ms);
        if debounced {
            return false;
        }
        self.yawns.mark(now_ms);
        true
    }

    /// Yawns within the window ending at `now_ms`
    pub fn count(&mut self, now_ms: u64) -> u32 {
        self.yawns.prune(now_ms);
        self.yawns.len() as u32
    }
}

/// Head-pitch swing detector over a short trailing window
#[derive(Debug, Clone)]
pub struct NodTracker {
    pitches: TimeWindow<f64>,
    min_samples: usize,
    range_degrees: f64,
}

impl NodTracker {
    pub fn new(window_ms: u64, min_samples: usize, range_degrees: f64) -> Self {
        Self {
            pitches: TimeWindow::new(window_ms),
            min_samples,
            range_degrees,
        }
    }

    /// Add a pitch sample and report whether the head is nodding.
    ///
    /// Needs strictly more than `min_samples` samples in the window; below
    /// that there is not enough evidence and the answer is false.
    pub fn record(&mut self, pitch: f64, now_ms: u64) -> bool {
        self.pitches.push(now_ms, pitch);
        self.pitches.prune(now_ms);

        if self.pitches.len() <= self.min_samples {
            return false;
        }

        let (min, max) = self
            .pitches
            .values()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        max - min > self.range_degrees
    }

    pub fn sample_count(&self) -> usize {
        self.pitches.len()
    }
}

/// All per-session tracker state
#[derive(Debug, Clone)]
pub struct DriverState {
    pub perclos: PerclosCounter,
    pub blinks: BlinkTracker,
    pub yawns: YawnTracker,
    pub nods: NodTracker,
}

impl DriverState {
    pub fn new(config: &DmsConfig) -> Self {
        Self {
            perclos: PerclosCounter::default(),
            blinks: BlinkTracker::new(config.blink_window_ms),
            yawns: YawnTracker::new(
                config.yawn_window_ms,
                config.yawn_ratio_threshold,
                config.yawn_debounce_ms,
            ),
            nods: NodTracker::new(
                config.nod_window_ms,
                config.nod_min_samples,
                config.nod_pitch_range_degrees,
            ),
        }
    }
}
