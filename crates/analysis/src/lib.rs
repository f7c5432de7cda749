//! Fatigue Analysis
//!
//! Natural-language assessment of a fatigue snapshot. The analyst is a
//! stateless request/response collaborator: an HTTP service when one is
//! configured, local rules otherwise. Request pacing is owned by the caller
//! through [`AnalysisGate`].

mod client;
mod gate;
mod offline;
mod types;

pub use client::{AnalysisConfig, HttpAnalyst};
pub use gate::AnalysisGate;
pub use offline::OfflineAnalyst;
pub use types::{AnalysisRequest, AnalysisResponse, RiskLevel};

use std::future::Future;
use thiserror::Error;

/// Analysis error types
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("No analysis endpoint configured")]
    NotConfigured,

    #[error("Analysis request timed out")]
    Timeout,

    #[error("Analysis transport error: {0}")]
    Transport(String),

    #[error("Analysis service is rate limited")]
    RateLimited,

    #[error("Analysis service returned HTTP {status}")]
    Http { status: u16 },

    #[error("Invalid analysis response: {0}")]
    InvalidResponse(String),

    #[error("Analysis cooling down, retry in {remaining_secs}s")]
    CoolingDown { remaining_secs: u64 },
}

impl AnalysisError {
    /// Message suitable for showing to the driver
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::NotConfigured
            | AnalysisError::Timeout
            | AnalysisError::Transport(_) => {
                "Analysis is unavailable right now. Monitoring continues.".to_string()
            }
            AnalysisError::RateLimited => {
                "Too many analysis requests. Please wait a moment and try again.".to_string()
            }
            AnalysisError::Http { .. } | AnalysisError::InvalidResponse(_) => {
                "Analysis failed. Please try again later.".to_string()
            }
            AnalysisError::CoolingDown { remaining_secs } => {
                format!("Please wait {}s before requesting another analysis.", remaining_secs)
            }
        }
    }
}

/// Produces a fatigue assessment from a metrics snapshot
pub trait FatigueAnalyst: Send + Sync + 'static {
    fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> impl Future<Output = Result<AnalysisResponse, AnalysisError>> + Send;
}

/// Analyst selected at startup from configuration
#[derive(Debug, Clone)]
pub enum Analyst {
    Http(HttpAnalyst),
    Offline(OfflineAnalyst),
}

impl Analyst {
    /// HTTP analyst when an endpoint is configured, offline rules otherwise
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        match config.endpoint {
            Some(_) => Ok(Analyst::Http(HttpAnalyst::new(config)?)),
            None => Ok(Analyst::Offline(OfflineAnalyst)),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Analyst::Http(_) => "http",
            Analyst::Offline(_) => "offline",
        }
    }
}

impl FatigueAnalyst for Analyst {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        match self {
            Analyst::Http(analyst) => analyst.analyze(request).await,
            Analyst::Offline(analyst) => analyst.analyze(request).await,
        }
    }
}
