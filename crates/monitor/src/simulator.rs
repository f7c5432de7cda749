//! Simulated camera and landmark detector
//!
//! Stands in for a real camera + face model: the camera stamps each frame
//! with the time since start, and the detector turns that time into a
//! synthetic face following a scripted driver behaviour.

use dms::synthetic::{self, FaceShape};
use dms::{Detection, DmsError, FrameSource, LandmarkDetector, LandmarkFrame};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Scripted driver behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time between blink onsets (default: 4000 ms, i.e. 15 blinks/min)
    pub blink_interval_ms: u64,
    /// Length of a normal blink
    pub blink_duration_ms: u64,
    /// Share of each blink cycle spent with eyes closed (0.0 - 1.0); raises
    /// PERCLOS once it exceeds the normal blink length
    pub eye_closure: f64,
    /// Time between yawn onsets; 0 disables yawning
    pub yawn_interval_ms: u64,
    pub yawn_duration_ms: u64,
    /// Swing the head up and down
    pub nodding: bool,
    /// Period of one nod (down and back up)
    pub nod_period_ms: u64,
    /// Time between spells where the driver looks away; 0 disables
    pub look_away_interval_ms: u64,
    pub look_away_duration_ms: u64,
    /// Simulated inference latency
    pub detection_latency_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            blink_interval_ms: 4_000,
            blink_duration_ms: 150,
            eye_closure: 0.0,
            yawn_interval_ms: 45_000,
            yawn_duration_ms: 3_000,
            nodding: false,
            nod_period_ms: 1_000,
            look_away_interval_ms: 0,
            look_away_duration_ms: 1_500,
            detection_latency_ms: 10,
        }
    }
}

impl SimulationConfig {
    /// A driver falling asleep at the wheel
    pub fn drowsy() -> Self {
        Self {
            eye_closure: 0.6,
            yawn_interval_ms: 10_000,
            nodding: true,
            ..Default::default()
        }
    }
}

/// One simulated camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedFrame {
    /// Time since the camera started
    pub elapsed_ms: u64,
}

/// Frame source producing timestamped frames
#[derive(Debug)]
pub struct SimulatedCamera {
    started: Instant,
    frames: u64,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        info!("Starting simulated camera");
        Self {
            started: Instant::now(),
            frames: 0,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for SimulatedCamera {
    type Frame = SimulatedFrame;

    fn current_frame(&mut self) -> Option<SimulatedFrame> {
        self.frames += 1;
        Some(SimulatedFrame {
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        })
    }
}

/// Detector producing synthetic landmarks from the scripted behaviour
#[derive(Debug, Clone)]
pub struct SimulatedDetector {
    config: SimulationConfig,
}

impl SimulatedDetector {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Landmarks at `elapsed_ms`, or `None` while the driver looks away
    pub fn face_at(&self, elapsed_ms: u64) -> Option<LandmarkFrame> {
        let c = &self.config;

        if in_phase(elapsed_ms, c.look_away_interval_ms, c.look_away_duration_ms) {
            return None;
        }

        let closed_ms = c
            .blink_duration_ms
            .max((c.blink_interval_ms as f64 * c.eye_closure.clamp(0.0, 1.0)) as u64);
        let mut shape = FaceShape::default();
        if in_phase(elapsed_ms, c.blink_interval_ms, closed_ms) {
            shape.eye_opening = synthetic::CLOSED_EYE;
        }
        if in_phase(elapsed_ms, c.yawn_interval_ms, c.yawn_duration_ms) {
            shape.mouth_opening = synthetic::YAWNING_MOUTH;
        }
        if c.nodding && c.nod_period_ms > 0 {
            // Head down for the second half of each period
            let down = elapsed_ms % c.nod_period_ms >= c.nod_period_ms / 2;
            if down {
                shape.nose_drop = 20.0 / synthetic::PITCH_PER_NOSE_DROP;
            }
        }

        Some(synthetic::face(shape))
    }
}

/// True during the first `duration` ms of every `interval`
fn in_phase(elapsed_ms: u64, interval_ms: u64, duration_ms: u64) -> bool {
    interval_ms > 0 && elapsed_ms % interval_ms < duration_ms
}

impl LandmarkDetector for SimulatedDetector {
    type Frame = SimulatedFrame;

    async fn detect(&self, frame: &SimulatedFrame) -> Result<Option<Detection>, DmsError> {
        if self.config.detection_latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.detection_latency_ms)).await;
        }
        Ok(self.face_at(frame.elapsed_ms).map(Detection::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::{AlertLevel, DmsConfig, FatigueSession};

    fn run_session(config: SimulationConfig, seconds: u64) -> FatigueSession {
        let detector = SimulatedDetector::new(config);
        let mut session = FatigueSession::new(DmsConfig::default());
        for t in (0..seconds * 1_000).step_by(33) {
            match detector.face_at(t) {
                Some(face) => {
                    session.analyze(&face, t).unwrap();
                }
                None => {
                    session.face_lost();
                }
            }
        }
        session
    }

    #[test]
    fn test_default_driver_is_alert() {
        let session = run_session(SimulationConfig::default(), 60);
        let metrics = session.metrics();

        assert_eq!(metrics.blink_rate, 15);
        assert!(metrics.perclos < 5.0);
        assert_eq!(metrics.yawn_count, 2);
        assert!(!metrics.nodding_detected);
        assert_eq!(session.alert_level(), AlertLevel::Alert);
    }

    #[test]
    fn test_drowsy_driver_is_critical() {
        let session = run_session(SimulationConfig::drowsy(), 30);
        let metrics = session.metrics();

        assert!(metrics.perclos >= 55.0, "perclos {}", metrics.perclos);
        assert!(metrics.nodding_detected);
        assert_eq!(session.alert_level(), AlertLevel::Critical);
    }

    #[test]
    fn test_look_away_drops_face() {
        let config = SimulationConfig {
            look_away_interval_ms: 10_000,
            look_away_duration_ms: 1_000,
            ..Default::default()
        };
        let detector = SimulatedDetector::new(config);
        assert!(detector.face_at(500).is_none());
        assert!(detector.face_at(1_500).is_some());
        assert!(detector.face_at(10_200).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_stamps_elapsed_time() {
        let mut camera = SimulatedCamera::new();
        tokio::time::advance(Duration::from_millis(250)).await;

        let frame = camera.current_frame().unwrap();
        assert_eq!(frame.elapsed_ms, 250);
        assert_eq!(camera.frames_captured(), 1);

        let detection = SimulatedDetector::new(SimulationConfig::default())
            .detect(&frame)
            .await
            .unwrap();
        assert!(detection.is_some());
    }
}
