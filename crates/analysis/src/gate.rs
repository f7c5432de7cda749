//! Caller-side cooldown between analysis requests

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::AnalysisError;

/// Tracks when the last analysis was requested and suppresses new requests
/// until the cooldown has passed
#[derive(Debug, Clone)]
pub struct AnalysisGate {
    cooldown: Duration,
    last_request: Option<Instant>,
    request_count: usize,
}

impl AnalysisGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_request: None,
            request_count: 0,
        }
    }

    /// Time left before another request is allowed
    pub fn remaining(&self) -> Duration {
        self.last_request
            .map(|last| self.cooldown.saturating_sub(last.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    pub fn should_request(&self) -> bool {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            debug!("Analysis suppressed: {:?} of cooldown left", remaining);
            return false;
        }
        true
    }

    pub fn record_request(&mut self) {
        self.last_request = Some(Instant::now());
        self.request_count += 1;
        info!("Analysis requested (count: {})", self.request_count);
    }

    /// Check and record in one step
    pub fn try_acquire(&mut self) -> Result<(), AnalysisError> {
        if !self.should_request() {
            let remaining = self.remaining();
            // Round up so "0s" is never reported while still blocked
            let remaining_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            return Err(AnalysisError::CoolingDown { remaining_secs });
        }
        self.record_request();
        Ok(())
    }

    pub fn request_count(&self) -> usize {
        self.request_count
    }

    pub fn reset(&mut self) {
        self.last_request = None;
        self.request_count = 0;
    }
}

impl Default for AnalysisGate {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
