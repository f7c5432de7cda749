//! HTTP analysis client

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::types::{AnalysisRequest, AnalysisResponse};
use crate::{AnalysisError, FatigueAnalyst};

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analysis service URL; offline rules are used when unset
    pub endpoint: Option<String>,
    /// Bearer token sent with each request
    pub api_key: Option<String>,
    /// Request timeout (default: 20s)
    pub timeout_secs: u64,
    /// Minimum gap between two requests (default: 30s)
    pub cooldown_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 20,
            cooldown_secs: 30,
        }
    }
}

impl AnalysisConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Analyst backed by a remote JSON endpoint
#[derive(Debug, Clone)]
pub struct HttpAnalyst {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpAnalyst {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let endpoint = config.endpoint.clone().ok_or(AnalysisError::NotConfigured)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        info!("Using analysis endpoint {}", endpoint);
        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl FatigueAnalyst for HttpAnalyst {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AnalysisError::Timeout
            } else {
                AnalysisError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Analysis service rate limited the request");
            return Err(AnalysisError::RateLimited);
        }
        if !status.is_success() {
            warn!("Analysis service returned {}", status);
            return Err(AnalysisError::Http {
                status: status.as_u16(),
            });
        }

        let parsed: AnalysisResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;
        debug!("Analysis received (risk {:?})", parsed.risk_level);
        parsed.validate()
    }
}
