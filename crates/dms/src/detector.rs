//! Landmark detector boundary and the shared detector service

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, OnceCell};
use tracing::{error, info};

use crate::geometry::Point;
use crate::DmsError;

/// Facial landmarks for one detected face
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// 6-point left eye contour
    pub left_eye: Vec<Point>,
    /// 6-point right eye contour
    pub right_eye: Vec<Point>,
    /// 20-point mouth contour (12 outer, 8 inner)
    pub mouth: Vec<Point>,
    /// Nose bridge and base (index 0 = bridge top, index 6 = tip)
    pub nose: Vec<Point>,
    /// Jaw line (index 8 = chin)
    pub jaw_outline: Vec<Point>,
}

/// Facial expression reported by some detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

/// A successful detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub landmarks: LandmarkFrame,
    /// Not used by the fatigue pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
}

impl From<LandmarkFrame> for Detection {
    fn from(landmarks: LandmarkFrame) -> Self {
        Self {
            landmarks,
            expression: None,
        }
    }
}

/// External face/landmark detector.
///
/// `Ok(None)` means the frame was processed and contained no face; `Err` is a
/// failure of this particular call.
pub trait LandmarkDetector: Send + Sync + 'static {
    /// Frame type the detector consumes
    type Frame: Send + 'static;

    fn detect(
        &self,
        frame: &Self::Frame,
    ) -> impl Future<Output = Result<Option<Detection>, DmsError>> + Send;
}

/// Supplies the frame to analyze on each loop iteration
pub trait FrameSource: Send + 'static {
    type Frame: Send + 'static;

    /// Current frame, or `None` when the source has nothing ready yet
    fn current_frame(&mut self) -> Option<Self::Frame>;
}

/// Detector model load status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelStatus {
    Loading,
    Ready,
    Failed(String),
}

/// Loads the detector once and shares it with every consumer.
///
/// The host constructs one service and hands an `Arc` of it to each detection
/// loop. Readiness is observable through [`subscribe`](Self::subscribe).
pub struct DetectorService<D> {
    detector: OnceCell<Arc<D>>,
    status: watch::Sender<ModelStatus>,
}

impl<D: LandmarkDetector> DetectorService<D> {
    /// Create a service whose detector has not been loaded yet
    pub fn new() -> Self {
        let (status, _) = watch::channel(ModelStatus::Loading);
        Self {
            detector: OnceCell::new(),
            status,
        }
    }

    /// Create a service around an already constructed detector
    pub fn ready(detector: D) -> Self {
        let (status, _) = watch::channel(ModelStatus::Ready);
        Self {
            detector: OnceCell::new_with(Some(Arc::new(detector))),
            status,
        }
    }

    /// Run `loader` unless a detector is already loaded.
    ///
    /// Concurrent callers share one load. A failed load leaves the service
    /// empty so a later call can retry.
    pub async fn load<F, Fut>(&self, loader: F) -> Result<Arc<D>, DmsError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<D, DmsError>>,
    {
        let result = self
            .detector
            .get_or_try_init(|| async move {
                self.status.send_replace(ModelStatus::Loading);
                info!("Loading landmark detector");
                loader().await.map(Arc::new)
            })
            .await;

        match result {
            Ok(detector) => {
                self.status.send_replace(ModelStatus::Ready);
                info!("Landmark detector ready");
                Ok(Arc::clone(detector))
            }
            Err(e) => {
                error!("Failed to load landmark detector: {}", e);
                self.status.send_replace(ModelStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Loaded detector, or `DetectorUnavailable` when not ready
    pub fn detector(&self) -> Result<Arc<D>, DmsError> {
        self.detector
            .get()
            .cloned()
            .ok_or_else(|| DmsError::DetectorUnavailable(self.describe_status()))
    }

    /// Wait until the load settles one way or the other
    pub async fn wait_ready(&self) -> Result<Arc<D>, DmsError> {
        let mut rx = self.status.subscribe();
        let settled = rx
            .wait_for(|status| *status != ModelStatus::Loading)
            .await
            .map(|status| status.clone());
        match settled {
            Ok(ModelStatus::Ready) => self.detector(),
            Ok(status) => Err(DmsError::DetectorUnavailable(format!("{:?}", status))),
            Err(_) => Err(DmsError::DetectorUnavailable("service dropped".into())),
        }
    }

    pub fn status(&self) -> ModelStatus {
        self.status.borrow().clone()
    }

    /// Receive every status change
    pub fn subscribe(&self) -> watch::Receiver<ModelStatus> {
        self.status.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.detector.initialized()
    }

    fn describe_status(&self) -> String {
        match &*self.status.borrow() {
            ModelStatus::Loading => "model not loaded".to_string(),
            ModelStatus::Ready => "model ready".to_string(),
            ModelStatus::Failed(reason) => format!("model load failed: {}", reason),
        }
    }
}

impl<D: LandmarkDetector> Default for DetectorService<D> {
    fn default() -> Self {
        Self::new()
    }
}
