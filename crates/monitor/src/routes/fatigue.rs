//! Fatigue Routes

use analysis::{AnalysisError, AnalysisRequest, AnalysisResponse, FatigueAnalyst};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dms::{AlertLevel, FatigueHistory, FatigueMetrics};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::AppState;

/// Latest fatigue snapshot
#[derive(Debug, Serialize)]
pub struct LiveResponse {
    pub metrics: FatigueMetrics,
    pub alert_level: AlertLevel,
    /// 1-5
    pub level_number: u8,
    pub message: &'static str,
    pub requires_warning: bool,
}

/// Get the latest metrics and alert level
pub async fn get_live(State(state): State<Arc<AppState>>) -> Json<LiveResponse> {
    let metrics = state.metrics.borrow().clone();
    let alert_level = *state.alert_level.borrow();

    Json(LiveResponse {
        metrics,
        alert_level,
        level_number: alert_level.number(),
        message: alert_level.message(),
        requires_warning: alert_level.requires_warning(),
    })
}

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Return at most this many of the most recent samples
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    60
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub data: Vec<FatigueHistory>,
    pub meta: HistoryMeta,
}

#[derive(Debug, Serialize)]
pub struct HistoryMeta {
    pub count: usize,
    pub limit: usize,
}

/// Get the fatigue history, oldest first
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let history = state.history.borrow().clone();
    let limit = params.limit;
    let skip = history.len().saturating_sub(limit);
    let data: Vec<FatigueHistory> = history.into_iter().skip(skip).collect();

    Json(HistoryResponse {
        meta: HistoryMeta {
            count: data.len(),
            limit,
        },
        data,
    })
}

/// Analysis failure as an HTTP response
pub struct AnalysisFailure(pub AnalysisError);

impl IntoResponse for AnalysisFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AnalysisError::CoolingDown { .. } | AnalysisError::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AnalysisError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AnalysisError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_GATEWAY,
        };
        let body = json!({
            "error": self.0.user_message(),
            "detail": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Run the analyst on the latest snapshot.
///
/// The cooldown starts when the request is made, whether or not it succeeds.
pub async fn post_analysis(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AnalysisResponse>, AnalysisFailure> {
    state.gate.lock().await.try_acquire().map_err(AnalysisFailure)?;

    let request = {
        let metrics = state.metrics.borrow();
        AnalysisRequest::new(&metrics, *state.alert_level.borrow())
    };

    match state.analyst.analyze(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            warn!("Analysis failed: {}", e);
            Err(AnalysisFailure(e))
        }
    }
}
