//! Driver Fatigue Monitor - Main Entry Point

use analysis::{AnalysisGate, Analyst};
use anyhow::Context;
use detection_loop::DetectionLoop;
use dms::DetectorService;
use fatigue_monitor::simulator::{SimulatedCamera, SimulatedDetector};
use fatigue_monitor::{create_router, init_logging, AppState, Settings};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_logging(&settings.log_level, settings.log_json);

    info!("=== Driver Fatigue Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(DetectorService::new());
    let simulation = settings.simulation.clone();
    service
        .load(|| async move { Ok(SimulatedDetector::new(simulation)) })
        .await
        .context("failed to load landmark detector")?;

    let mut detection_loop = DetectionLoop::new(
        Arc::clone(&service),
        settings.detection.clone(),
        settings.dms.clone(),
    );
    detection_loop
        .start(SimulatedCamera::new())
        .context("failed to start detection loop")?;

    let analyst = Analyst::from_config(&settings.analysis).context("failed to create analyst")?;
    info!("Analysis mode: {}", analyst.kind());

    let state = AppState::new(
        detection_loop.subscribe_metrics(),
        detection_loop.subscribe_alert_level(),
        detection_loop.subscribe_history(),
        service.subscribe(),
        analyst,
        AnalysisGate::new(settings.analysis.cooldown()),
    );
    let app = create_router(Arc::new(state));

    let addr = settings.server.addr();
    info!("Starting API server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("server error")?;

    info!("Shutting down, processed stats: {:?}", detection_loop.stats());
    detection_loop.stop();
    Ok(())
}
