//! Rule-based analysis used when no analysis service is configured

use dms::{AlertLevel, BlinkPattern};

use crate::types::{AnalysisRequest, AnalysisResponse, RiskLevel, MAX_RECOMMENDATIONS};
use crate::{AnalysisError, FatigueAnalyst};

/// Local analyst deriving its assessment from the alert level and the
/// strongest individual signal
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAnalyst;

impl OfflineAnalyst {
    pub fn assess(&self, request: &AnalysisRequest) -> AnalysisResponse {
        let level = request.alert_level;

        let mut recommendations: Vec<String> = base_recommendations(level)
            .iter()
            .map(|r| r.to_string())
            .collect();
        if let Some(extra) = signal_recommendation(request) {
            if recommendations.len() < MAX_RECOMMENDATIONS {
                recommendations.push(extra.to_string());
            }
        }

        AnalysisResponse {
            analysis: format!(
                "Eyes were closed {:.1}% of the time, with {} blinks and {} yawns in the last minute. {}.",
                request.perclos,
                request.blink_rate,
                request.yawn_frequency,
                level.message()
            ),
            risk_level: RiskLevel::from(level),
            recommendations,
            warning_sign: warning_sign(request),
            encouragement: encouragement(level).to_string(),
        }
    }
}

impl FatigueAnalyst for OfflineAnalyst {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        Ok(self.assess(request))
    }
}

fn base_recommendations(level: AlertLevel) -> [&'static str; 3] {
    match level {
        AlertLevel::Alert => [
            "Keep taking a short break every two hours",
            "Stay hydrated",
            "Keep the cabin cool and well ventilated",
        ],
        AlertLevel::Drowsy => [
            "Plan a rest stop within the next 30 minutes",
            "Lower the cabin temperature",
            "Have some water or a light snack",
        ],
        AlertLevel::Fatigued => [
            "Stop at the next safe place for a 15 minute break",
            "Walk around and stretch before continuing",
            "Avoid heavy meals before driving on",
        ],
        AlertLevel::Severe => [
            "Take a break now at the nearest safe stop",
            "Consider a 20 minute nap before continuing",
            "Let another driver take over if possible",
        ],
        AlertLevel::Critical => [
            "Pull over as soon as it is safe",
            "Do not continue driving until rested",
            "Call someone to pick you up if needed",
        ],
    }
}

fn signal_recommendation(request: &AnalysisRequest) -> Option<&'static str> {
    if request.nodding_detected {
        Some("Head nodding suggests microsleep risk: do not push through")
    } else if request.yawn_frequency >= 3 {
        Some("Frequent yawning is an early fatigue sign: get fresh air")
    } else if request.blink_pattern == BlinkPattern::Irregular {
        Some("Irregular blinking can signal eye strain: rest your eyes")
    } else {
        None
    }
}

fn warning_sign(request: &AnalysisRequest) -> Option<String> {
    if request.nodding_detected {
        Some("Head nodding detected".to_string())
    } else if request.alert_level.requires_warning() {
        Some(format!("Eye closure at {:.1}%", request.perclos))
    } else {
        None
    }
}

fn encouragement(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Alert => "You're driving alert. Keep it up!",
        AlertLevel::Drowsy | AlertLevel::Fatigued => {
            "A short break now keeps the rest of the trip safe."
        }
        AlertLevel::Severe | AlertLevel::Critical => {
            "Stopping to rest is the right call. Your safety comes first."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::{FatigueMetrics, HeadPose};

    fn request(level: AlertLevel, nodding: bool, yawns: u32) -> AnalysisRequest {
        AnalysisRequest {
            perclos: 12.0,
            blink_rate: 15,
            blink_pattern: BlinkPattern::Normal,
            yawn_count: yawns,
            yawn_frequency: yawns,
            head_pose: HeadPose::default(),
            nodding_detected: nodding,
            alert_level: level,
        }
    }

    #[test]
    fn test_every_level_yields_valid_response() {
        for level in AlertLevel::ALL {
            for nodding in [false, true] {
                let response = OfflineAnalyst.assess(&request(level, nodding, 4));
                assert_eq!(response.risk_level, RiskLevel::from(level));
                assert!(response.clone().validate().is_ok(), "{:?}", level);
            }
        }
    }

    #[test]
    fn test_signal_adds_fourth_recommendation() {
        let calm = OfflineAnalyst.assess(&request(AlertLevel::Alert, false, 0));
        assert_eq!(calm.recommendations.len(), 3);
        assert!(calm.warning_sign.is_none());

        let yawning = OfflineAnalyst.assess(&request(AlertLevel::Fatigued, false, 3));
        assert_eq!(yawning.recommendations.len(), 4);
        assert!(yawning.recommendations[3].contains("yawning"));
    }

    #[test]
    fn test_warning_sign() {
        let nodding = OfflineAnalyst.assess(&request(AlertLevel::Drowsy, true, 0));
        assert_eq!(nodding.warning_sign.as_deref(), Some("Head nodding detected"));

        let mut severe = request(AlertLevel::Severe, false, 0);
        severe.perclos = 52.3;
        let response = OfflineAnalyst.assess(&severe);
        assert_eq!(response.warning_sign.as_deref(), Some("Eye closure at 52.3%"));
    }

    #[tokio::test]
    async fn test_analyze_from_metrics() {
        let metrics = FatigueMetrics {
            perclos: 75.0,
            face_detected: true,
            ..Default::default()
        };
        let request = AnalysisRequest::new(&metrics, metrics.alert_level());
        let response = OfflineAnalyst.analyze(&request).await.unwrap();

        assert_eq!(response.risk_level, RiskLevel::Critical);
        assert!(response.analysis.contains("75.0%"));
        assert_eq!(response.recommendations[0], "Pull over as soon as it is safe");
    }
}
