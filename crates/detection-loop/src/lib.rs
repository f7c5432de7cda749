//! Detection Loop Driver
//!
//! Pulls frames from a [`FrameSource`](dms::FrameSource), runs them through
//! the landmark detector and the fatigue pipeline, and publishes the
//! resulting metrics, alert level and history on watch channels.

mod driver;

pub use driver::{
    Clock, DetectionLoop, LoopConfig, LoopState, LoopStats, SystemClock, MIN_TICK_INTERVAL,
};

use dms::DmsError;
use thiserror::Error;

/// Detection loop error types
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Detection loop is already running")]
    AlreadyRunning,

    #[error("Invalid detection loop configuration: {0}")]
    InvalidConfig(String),

    #[error("Detection loop must be started inside a Tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Dms(#[from] DmsError),
}
