//! Analysis wire types

use dms::{AlertLevel, BlinkPattern, FatigueMetrics, HeadPose};
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Bounds on the number of recommendations in a response
pub const MIN_RECOMMENDATIONS: usize = 3;
pub const MAX_RECOMMENDATIONS: usize = 4;

/// Snapshot sent to the analyst
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub perclos: f64,
    pub blink_rate: u32,
    pub blink_pattern: BlinkPattern,
    pub yawn_count: u32,
    pub yawn_frequency: u32,
    pub head_pose: HeadPose,
    pub nodding_detected: bool,
    pub alert_level: AlertLevel,
}

impl AnalysisRequest {
    pub fn new(metrics: &FatigueMetrics, alert_level: AlertLevel) -> Self {
        Self {
            perclos: metrics.perclos,
            blink_rate: metrics.blink_rate,
            blink_pattern: metrics.blink_pattern,
            yawn_count: metrics.yawn_count,
            yawn_frequency: metrics.yawn_frequency,
            head_pose: metrics.head_pose,
            nodding_detected: metrics.nodding_detected,
            alert_level,
        }
    }
}

/// Analyst's overall risk judgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl From<AlertLevel> for RiskLevel {
    fn from(level: AlertLevel) -> Self {
        match level {
            AlertLevel::Alert => RiskLevel::Low,
            AlertLevel::Drowsy => RiskLevel::Moderate,
            AlertLevel::Fatigued | AlertLevel::Severe => RiskLevel::High,
            AlertLevel::Critical => RiskLevel::Critical,
        }
    }
}

/// Assessment returned by the analyst
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub analysis: String,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub warning_sign: Option<String>,
    pub encouragement: String,
}

impl AnalysisResponse {
    /// Reject responses the host cannot display
    pub fn validate(self) -> Result<Self, AnalysisError> {
        if self.analysis.trim().is_empty() {
            return Err(AnalysisError::InvalidResponse("empty analysis".into()));
        }
        let count = self.recommendations.len();
        if !(MIN_RECOMMENDATIONS..=MAX_RECOMMENDATIONS).contains(&count) {
            return Err(AnalysisError::InvalidResponse(format!(
                "expected {}-{} recommendations, got {}",
                MIN_RECOMMENDATIONS, MAX_RECOMMENDATIONS, count
            )));
        }
        if self.recommendations.iter().any(|r| r.trim().is_empty()) {
            return Err(AnalysisError::InvalidResponse("blank recommendation".into()));
        }
        Ok(self)
    }
}
