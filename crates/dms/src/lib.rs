//! Driver Monitoring System (DMS)
//!
//! Fatigue analysis from per-frame facial landmarks:
//! - Eye closure (EAR, PERCLOS) and blink rate/pattern
//! - Yawn frequency from mouth opening
//! - Heuristic head pose and nodding
//! - Five-level alert classification
//! - Periodic history for trend display

pub mod analysis;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod history;
pub mod state;
pub mod synthetic;

pub use analysis::{classify, determine_blink_pattern, AlertLevel, BlinkPattern, FatigueMetrics, HeadPose};
pub use config::DmsConfig;
pub use detector::{
    Detection, DetectorService, Expression, FrameSource, LandmarkDetector, LandmarkFrame, ModelStatus,
};
pub use geometry::{GeometryError, HeadAngles, Point};
pub use history::{FatigueHistory, HistoryBuffer};
pub use state::DriverState;

use thiserror::Error;
use tracing::debug;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Landmark detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Outcome of one processed frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub metrics: FatigueMetrics,
    pub alert_level: AlertLevel,
    /// A history sample was appended on this frame
    pub history_updated: bool,
}

/// Fatigue state for one monitoring session.
///
/// Owns every counter and window; dropping or resetting it forgets the
/// session entirely.
pub struct FatigueSession {
    config: DmsConfig,
    state: DriverState,
    history: HistoryBuffer,
    metrics: FatigueMetrics,
    alert_level: AlertLevel,
    face_absent_frames: u64,
}

impl FatigueSession {
    /// Create a new session with configuration
    pub fn new(config: DmsConfig) -> Self {
        Self {
            state: DriverState::new(&config),
            history: HistoryBuffer::new(config.history_capacity, config.history_interval_ms),
            metrics: FatigueMetrics::default(),
            alert_level: AlertLevel::default(),
            face_absent_frames: 0,
            config,
        }
    }

    /// Analyze one frame with a detected face.
    ///
    /// Geometry is evaluated before any state changes, so a frame with
    /// missing or degenerate landmarks is rejected without touching the
    /// session.
    pub fn analyze(&mut self, landmarks: &LandmarkFrame, now_ms: u64) -> Result<FrameReport, DmsError> {
        let left_ear = geometry::eye_aspect_ratio(&landmarks.left_eye)?;
        let right_ear = geometry::eye_aspect_ratio(&landmarks.right_eye)?;
        let mouth_ratio = geometry::mouth_open_ratio(&landmarks.mouth)?;
        let angles = geometry::head_pose(landmarks)?;

        let ear = (left_ear + right_ear) / 2.0;
        let eyes_open = ear >= self.config.ear_threshold;
        let head_pose = HeadPose {
            pitch: angles.pitch.round() as i32,
            yaw: angles.yaw.round() as i32,
            roll: angles.roll.round() as i32,
        };

        self.state.perclos.record(eyes_open);
        if self.state.blinks.record(eyes_open, now_ms) {
            debug!("Blink at {} ms", now_ms);
        }
        if self.state.yawns.record(mouth_ratio, now_ms) {
            debug!("Yawn at {} ms (ratio {:.2})", now_ms, mouth_ratio);
        }
        let nodding_detected = self.state.nods.record(f64::from(head_pose.pitch), now_ms);

        let blink_rate = self.state.blinks.rate(now_ms);
        let yawn_count = self.state.yawns.count(now_ms);
        let blink_pattern = determine_blink_pattern(blink_rate, &self.state.blinks.timestamps());

        let metrics = FatigueMetrics {
            perclos: round_to(self.state.perclos.perclos(), 1),
            blink_rate,
            blink_pattern,
            yawn_count,
            yawn_frequency: yawn_count,
            mouth_open_ratio: round_to(mouth_ratio, 2),
            head_pose,
            nodding_detected,
            eyes_open,
            face_detected: true,
        };
        let alert_level = classify(&metrics);
        let history_updated = self.history.offer(now_ms, &metrics, alert_level);

        self.metrics = metrics;
        self.alert_level = alert_level;

        Ok(self.report(history_updated))
    }

    /// Record a processed frame without a face.
    ///
    /// Republishes the last metrics with `face_detected = false`; no counter
    /// advances, so the frame stays out of the PERCLOS denominator.
    pub fn face_lost(&mut self) -> FrameReport {
        self.face_absent_frames += 1;
        self.metrics = self.metrics.face_lost();
        self.alert_level = classify(&self.metrics);
        self.report(false)
    }

    fn report(&self, history_updated: bool) -> FrameReport {
        FrameReport {
            metrics: self.metrics.clone(),
            alert_level: self.alert_level,
            history_updated,
        }
    }

    pub fn metrics(&self) -> &FatigueMetrics {
        &self.metrics
    }

    pub fn alert_level(&self) -> AlertLevel {
        self.alert_level
    }

    /// History samples, oldest first
    pub fn history(&self) -> Vec<FatigueHistory> {
        self.history.snapshot()
    }

    /// Face frames that advanced the counters
    pub fn frames_processed(&self) -> u64 {
        self.state.perclos.total_frames()
    }

    /// Eyes-closed frames among [`frames_processed`](Self::frames_processed)
    pub fn closed_frames(&self) -> u64 {
        self.state.perclos.closed_frames()
    }

    pub fn face_absent_frames(&self) -> u64 {
        self.face_absent_frames
    }

    /// Forget everything (new driver or new session)
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
