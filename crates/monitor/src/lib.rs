//! Driver Fatigue Monitor
//!
//! Host process wiring the detection loop to a camera and detector, plus a
//! REST API exposing the live metrics, the history and on-demand analysis.

use analysis::{AnalysisGate, Analyst};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use dms::{AlertLevel, FatigueHistory, FatigueMetrics, ModelStatus};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub mod routes;
pub mod settings;
pub mod simulator;

pub use settings::{ServerConfig, Settings};

/// Application state shared across handlers
pub struct AppState {
    pub metrics: watch::Receiver<FatigueMetrics>,
    pub alert_level: watch::Receiver<AlertLevel>,
    pub history: watch::Receiver<Vec<FatigueHistory>>,
    pub model_status: watch::Receiver<ModelStatus>,
    pub analyst: Analyst,
    pub gate: Mutex<AnalysisGate>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        metrics: watch::Receiver<FatigueMetrics>,
        alert_level: watch::Receiver<AlertLevel>,
        history: watch::Receiver<Vec<FatigueHistory>>,
        model_status: watch::Receiver<ModelStatus>,
        analyst: Analyst,
        gate: AnalysisGate,
    ) -> Self {
        Self {
            metrics,
            alert_level,
            history,
            model_status,
            analyst,
            gate: Mutex::new(gate),
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub detector: ComponentHealth,
    pub analysis: ComponentHealth,
}

/// Individual component health
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/fatigue/live", get(routes::fatigue::get_live))
        .route("/api/v1/fatigue/history", get(routes::fatigue::get_history))
        .route("/api/v1/fatigue/analysis", post(routes::fatigue::post_analysis))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let model_status = state.model_status.borrow().clone();
    let (status, detector) = match model_status {
        ModelStatus::Ready => ("healthy", ComponentHealth { status: "ok".into(), detail: None }),
        ModelStatus::Loading => (
            "starting",
            ComponentHealth { status: "loading".into(), detail: None },
        ),
        ModelStatus::Failed(reason) => (
            "degraded",
            ComponentHealth { status: "failed".into(), detail: Some(reason) },
        ),
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            detector,
            analysis: ComponentHealth {
                status: "ok".into(),
                detail: Some(state.analyst.kind().to_string()),
            },
        },
    })
}

/// Initialize logging.
///
/// `RUST_LOG` takes precedence over `default_level`. Calling this twice is
/// harmless; the first subscriber stays installed.
pub fn init_logging(default_level: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = Registry::default().with(env_filter);

    let result = if json {
        registry.with(fmt::layer().with_target(true).json()).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };
    if let Err(e) = result {
        tracing::debug!("Tracing subscriber already installed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis::OfflineAnalyst;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use dms::HeadPose;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Harness {
        metrics: watch::Sender<FatigueMetrics>,
        alert_level: watch::Sender<AlertLevel>,
        history: watch::Sender<Vec<FatigueHistory>>,
        model_status: watch::Sender<ModelStatus>,
        router: Router,
    }

    fn harness() -> Harness {
        let (metrics, metrics_rx) = watch::channel(FatigueMetrics::default());
        let (alert_level, alert_rx) = watch::channel(AlertLevel::Alert);
        let (history, history_rx) = watch::channel(Vec::new());
        let (model_status, status_rx) = watch::channel(ModelStatus::Ready);
        let state = AppState::new(
            metrics_rx,
            alert_rx,
            history_rx,
            status_rx,
            Analyst::Offline(OfflineAnalyst),
            AnalysisGate::new(Duration::from_secs(30)),
        );
        Harness {
            metrics,
            alert_level,
            history,
            model_status,
            router: create_router(Arc::new(state)),
        }
    }

    async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn sample(timestamp_ms: u64, perclos: f64) -> FatigueHistory {
        FatigueHistory {
            timestamp_ms,
            perclos,
            alert_level: AlertLevel::Alert,
            blink_rate: 15,
            yawn_count: 0,
        }
    }

    #[tokio::test]
    async fn test_health_reflects_model_status() {
        let h = harness();
        let (status, body) = send(&h.router, "GET", "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["analysis"]["detail"], "offline");

        h.model_status
            .send_replace(ModelStatus::Failed("weights missing".into()));
        let (_, body) = send(&h.router, "GET", "/api/v1/health").await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["components"]["detector"]["detail"], "weights missing");
    }

    #[tokio::test]
    async fn test_live_returns_latest_snapshot() {
        let h = harness();
        h.metrics.send_replace(FatigueMetrics {
            perclos: 72.4,
            blink_rate: 6,
            head_pose: HeadPose { pitch: 14, yaw: 0, roll: -2 },
            face_detected: true,
            ..Default::default()
        });
        h.alert_level.send_replace(AlertLevel::Critical);

        let (status, body) = send(&h.router, "GET", "/api/v1/fatigue/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["perclos"], 72.4);
        assert_eq!(body["metrics"]["head_pose"]["pitch"], 14);
        assert_eq!(body["alert_level"], "critical");
        assert_eq!(body["level_number"], 5);
        assert_eq!(body["requires_warning"], true);
    }

    #[tokio::test]
    async fn test_history_limit_keeps_most_recent() {
        let h = harness();
        h.history
            .send_replace((0..10).map(|i| sample(i * 5_000, i as f64)).collect());

        let (_, body) = send(&h.router, "GET", "/api/v1/fatigue/history").await;
        assert_eq!(body["meta"]["count"], 10);

        let (_, body) = send(&h.router, "GET", "/api/v1/fatigue/history?limit=3").await;
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["timestamp_ms"], 35_000);
        assert_eq!(data[2]["timestamp_ms"], 45_000);
    }

    #[tokio::test]
    async fn test_analysis_then_cooldown() {
        let h = harness();
        h.metrics.send_replace(FatigueMetrics {
            perclos: 55.0,
            face_detected: true,
            ..Default::default()
        });
        h.alert_level.send_replace(AlertLevel::Severe);

        let (status, body) = send(&h.router, "POST", "/api/v1/fatigue/analysis").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["riskLevel"], "high");
        let recommendations = body["recommendations"].as_array().unwrap();
        assert!((3..=4).contains(&recommendations.len()));

        let (status, body) = send(&h.router, "POST", "/api/v1/fatigue/analysis").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().unwrap().starts_with("Please wait"));
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging("debug", false);
        init_logging("info", true);
    }
}
