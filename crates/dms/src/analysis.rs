//! Fatigue metrics snapshot and alert classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// Head pose (Euler angles, whole degrees)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadPose {
    /// Pitch (up-down tilt) in degrees
    pub pitch: i32,
    /// Yaw (left-right rotation) in degrees
    pub yaw: i32,
    /// Roll (side tilt) in degrees
    pub roll: i32,
}

/// Blink rhythm classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlinkPattern {
    #[default]
    Normal,
    Irregular,
    Slow,
    Rapid,
}

/// Driver alertness level, least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    #[default]
    Alert,
    Drowsy,
    Fatigued,
    Severe,
    Critical,
}

impl AlertLevel {
    /// All levels in ascending severity
    pub const ALL: [AlertLevel; 5] = [
        AlertLevel::Alert,
        AlertLevel::Drowsy,
        AlertLevel::Fatigued,
        AlertLevel::Severe,
        AlertLevel::Critical,
    ];

    /// 1-based position on the 5-level scale
    pub fn number(&self) -> u8 {
        match self {
            AlertLevel::Alert => 1,
            AlertLevel::Drowsy => 2,
            AlertLevel::Fatigued => 3,
            AlertLevel::Severe => 4,
            AlertLevel::Critical => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Alert => "alert",
            AlertLevel::Drowsy => "drowsy",
            AlertLevel::Fatigued => "fatigued",
            AlertLevel::Severe => "severe",
            AlertLevel::Critical => "critical",
        }
    }

    /// Driver-facing message
    pub fn message(&self) -> &'static str {
        match self {
            AlertLevel::Alert => "Driver is alert",
            AlertLevel::Drowsy => "Early signs of drowsiness",
            AlertLevel::Fatigued => "Driver is fatigued, plan a break",
            AlertLevel::Severe => "Severe fatigue, take a break now",
            AlertLevel::Critical => "Critical fatigue, pull over when safe",
        }
    }

    /// Whether the host should raise an audible/visual warning
    pub fn requires_warning(&self) -> bool {
        *self >= AlertLevel::Severe
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Level {}/5)", self.as_str(), self.number())
    }
}

/// Per-frame fatigue snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FatigueMetrics {
    /// Share of processed frames with eyes closed since session start (0-100, 1 decimal)
    pub perclos: f64,
    /// Blinks within the trailing blink window
    pub blink_rate: u32,
    pub blink_pattern: BlinkPattern,
    /// Distinct yawns within the trailing yawn window
    pub yawn_count: u32,
    /// Same windowed count as `yawn_count`, read by the classifier
    pub yawn_frequency: u32,
    /// Inner-lip opening over mouth width (2 decimals)
    pub mouth_open_ratio: f64,
    pub head_pose: HeadPose,
    pub nodding_detected: bool,
    pub eyes_open: bool,
    pub face_detected: bool,
}

impl Default for FatigueMetrics {
    fn default() -> Self {
        Self {
            perclos: 0.0,
            blink_rate: 0,
            blink_pattern: BlinkPattern::Normal,
            yawn_count: 0,
            yawn_frequency: 0,
            mouth_open_ratio: 0.0,
            head_pose: HeadPose::default(),
            nodding_detected: false,
            eyes_open: true,
            face_detected: false,
        }
    }
}

impl FatigueMetrics {
    /// Copy of these metrics flagged as "face lost"; every other field keeps
    /// its last known value
    pub fn face_lost(&self) -> Self {
        Self {
            face_detected: false,
            ..self.clone()
        }
    }

    pub fn alert_level(&self) -> AlertLevel {
        classify(self)
    }
}

/// Map a metrics snapshot to an alert level.
///
/// Ordered cascade, most severe tier first; the first matching tier wins.
pub fn classify(metrics: &FatigueMetrics) -> AlertLevel {
    let perclos = metrics.perclos;

    if perclos >= 70.0 || (metrics.nodding_detected && perclos >= 40.0) {
        AlertLevel::Critical
    } else if perclos >= 50.0 || metrics.yawn_frequency >= 5 {
        AlertLevel::Severe
    } else if perclos >= 35.0 || metrics.yawn_frequency >= 3 {
        AlertLevel::Fatigued
    } else if perclos >= 25.0 || metrics.blink_rate < 8 || metrics.blink_rate > 25 {
        AlertLevel::Drowsy
    } else {
        AlertLevel::Alert
    }
}

/// Interval variance (ms^2) above which blinking counts as irregular
const IRREGULAR_VARIANCE: f64 = 50_000.0;

/// Minimum blinks in the window before the pattern is judged
const MIN_BLINKS_FOR_PATTERN: usize = 5;

/// Classify blink rhythm from the windowed blink timestamps.
///
/// Irregular spacing takes priority over the rate-based labels.
pub fn determine_blink_pattern(blink_rate: u32, timestamps: &[u64]) -> BlinkPattern {
    if timestamps.len() < MIN_BLINKS_FOR_PATTERN {
        return BlinkPattern::Normal;
    }

    let intervals: Vec<f64> = timestamps
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0]) as f64)
        .collect();
    let n = intervals.len() as f64;
    let mean = intervals.iter().sum::<f64>() / n;
    let variance = intervals.iter().map(|i| (i - mean).powi(2)).sum::<f64>() / n;

    if variance > IRREGULAR_VARIANCE {
        BlinkPattern::Irregular
    } else if blink_rate < 8 {
        BlinkPattern::Slow
    } else if blink_rate > 25 {
        BlinkPattern::Rapid
    } else {
        BlinkPattern::Normal
    }
}
