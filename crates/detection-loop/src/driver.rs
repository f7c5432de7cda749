//! Detection Loop Implementation

use dms::{
    AlertLevel, DetectorService, DmsConfig, FatigueHistory, FatigueMetrics, FatigueSession,
    FrameReport, FrameSource, LandmarkDetector,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::LoopError;

/// Configuration for the detection loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Tick rate of the loop, matching the display refresh (default: 60.0)
    pub refresh_rate_hz: f64,
    /// Process one tick out of this many; the others do nothing (default: 2)
    pub process_every: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: 60.0,
            process_every: 2,
        }
    }
}

/// Shortest tick period accepted
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

impl LoopConfig {
    /// Interval between ticks; rejects rates that give no usable period
    pub fn tick_interval(&self) -> Result<Duration, LoopError> {
        let hz = self.refresh_rate_hz;
        if !hz.is_finite() || hz <= 0.0 {
            return Err(LoopError::InvalidConfig(format!(
                "refresh_rate_hz must be a positive finite number, got {}",
                hz
            )));
        }
        let period = Duration::try_from_secs_f64(1.0 / hz)
            .map_err(|e| LoopError::InvalidConfig(format!("refresh_rate_hz {}: {}", hz, e)))?;
        if period < MIN_TICK_INTERVAL {
            return Err(LoopError::InvalidConfig(format!(
                "refresh_rate_hz {} gives a tick period below {:?}",
                hz, MIN_TICK_INTERVAL
            )));
        }
        Ok(period)
    }
}

/// Millisecond time source for the fatigue windows
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// Wall clock (milliseconds since the Unix epoch)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Loop lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    Running,
}

/// Frame counters for the current session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    /// Ticks skipped by throttling
    pub skipped_ticks: u64,
    /// Frames analyzed with a face
    pub face_frames: u64,
    /// Frames analyzed without a face
    pub face_lost_frames: u64,
    /// Frames dropped because the detector failed
    pub detection_errors: u64,
    /// Frames dropped because the landmarks were unusable
    pub rejected_frames: u64,
}

#[derive(Default)]
struct StatCounters {
    skipped_ticks: AtomicU64,
    face_frames: AtomicU64,
    face_lost_frames: AtomicU64,
    detection_errors: AtomicU64,
    rejected_frames: AtomicU64,
}

impl StatCounters {
    fn snapshot(&self) -> LoopStats {
        LoopStats {
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            face_frames: self.face_frames.load(Ordering::Relaxed),
            face_lost_frames: self.face_lost_frames.load(Ordering::Relaxed),
            detection_errors: self.detection_errors.load(Ordering::Relaxed),
            rejected_frames: self.rejected_frames.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.skipped_ticks,
            &self.face_frames,
            &self.face_lost_frames,
            &self.detection_errors,
            &self.rejected_frames,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Published streams shared between the loop handle and its task
struct Streams {
    metrics: watch::Sender<FatigueMetrics>,
    alert_level: watch::Sender<AlertLevel>,
    history: watch::Sender<Vec<FatigueHistory>>,
    stats: StatCounters,
}

impl Streams {
    fn new() -> Self {
        Self {
            metrics: watch::channel(FatigueMetrics::default()).0,
            alert_level: watch::channel(AlertLevel::default()).0,
            history: watch::channel(Vec::new()).0,
            stats: StatCounters::default(),
        }
    }

    fn reset(&self) {
        self.metrics.send_replace(FatigueMetrics::default());
        self.alert_level.send_replace(AlertLevel::default());
        self.history.send_replace(Vec::new());
        self.stats.reset();
    }

    fn publish(&self, report: &FrameReport, session: &FatigueSession) {
        let previous = self.alert_level.send_replace(report.alert_level);
        if previous != report.alert_level {
            info!(
                "Alert level changed: {} -> {} (perclos {:.1})",
                previous, report.alert_level, report.metrics.perclos
            );
        }
        self.metrics.send_replace(report.metrics.clone());
        if report.history_updated {
            self.history.send_replace(session.history());
        }
    }
}

struct RunningTask {
    alive: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Drives the fatigue pipeline from a frame source.
///
/// Each `start()`/`stop()` cycle owns a fresh [`FatigueSession`] inside the
/// spawned task; stopping drops it, so nothing carries over between cycles.
pub struct DetectionLoop<D: LandmarkDetector> {
    service: Arc<DetectorService<D>>,
    config: LoopConfig,
    dms_config: DmsConfig,
    clock: Arc<dyn Clock>,
    streams: Arc<Streams>,
    task: Option<RunningTask>,
}

impl<D: LandmarkDetector> DetectionLoop<D> {
    /// Create an idle loop bound to a detector service
    pub fn new(service: Arc<DetectorService<D>>, config: LoopConfig, dms_config: DmsConfig) -> Self {
        info!(
            "Creating detection loop ({:.0} Hz, processing 1 of {} ticks)",
            config.refresh_rate_hz, config.process_every
        );
        Self {
            service,
            config,
            dms_config,
            clock: Arc::new(SystemClock),
            streams: Arc::new(Streams::new()),
            task: None,
        }
    }

    /// Replace the time source used for the fatigue windows
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start a new monitoring session reading frames from `source`.
    ///
    /// Fails without starting when the detector is not loaded.
    pub fn start<S>(&mut self, source: S) -> Result<(), LoopError>
    where
        S: FrameSource<Frame = D::Frame>,
    {
        if self.is_running() {
            return Err(LoopError::AlreadyRunning);
        }
        let tick_interval = self.config.tick_interval()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| LoopError::NoRuntime)?;
        let detector = self.service.detector()?;

        self.streams.reset();
        let alive = Arc::new(AtomicBool::new(true));
        let worker = Worker {
            detector,
            session: FatigueSession::new(self.dms_config.clone()),
            tick_interval,
            process_every: u64::from(self.config.process_every.max(1)),
            clock: Arc::clone(&self.clock),
            streams: Arc::clone(&self.streams),
            alive: Arc::clone(&alive),
        };
        let handle = runtime.spawn(worker.run(source));

        info!("Detection loop started");
        self.task = Some(RunningTask { alive, handle });
        Ok(())
    }

    /// Stop the session. Safe to call repeatedly and while a detection is
    /// still in flight; its result is discarded.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.alive.store(false, Ordering::Release);
            task.handle.abort();
            info!("Detection loop stopped");
        }
    }

    pub fn state(&self) -> LoopState {
        if self.is_running() {
            LoopState::Running
        } else {
            LoopState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Latest metrics, updated on every processed frame
    pub fn subscribe_metrics(&self) -> watch::Receiver<FatigueMetrics> {
        self.streams.metrics.subscribe()
    }

    /// Latest alert level, updated on every processed frame
    pub fn subscribe_alert_level(&self) -> watch::Receiver<AlertLevel> {
        self.streams.alert_level.subscribe()
    }

    /// History snapshot, updated on every append
    pub fn subscribe_history(&self) -> watch::Receiver<Vec<FatigueHistory>> {
        self.streams.history.subscribe()
    }

    /// Frame counters for the current (or last) session
    pub fn stats(&self) -> LoopStats {
        self.streams.stats.snapshot()
    }
}

impl<D: LandmarkDetector> Drop for DetectionLoop<D> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved into the spawned loop task
struct Worker<D> {
    detector: Arc<D>,
    session: FatigueSession,
    tick_interval: Duration,
    process_every: u64,
    clock: Arc<dyn Clock>,
    streams: Arc<Streams>,
    alive: Arc<AtomicBool>,
}

impl<D: LandmarkDetector> Worker<D> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn run<S>(mut self, mut source: S)
    where
        S: FrameSource<Frame = D::Frame>,
    {
        let mut ticker = tokio::time::interval(self.tick_interval);
        // A slow detection delays the following ticks instead of bursting
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let process_every = self.process_every;
        let mut frame_skip: u64 = 0;

        while self.is_alive() {
            ticker.tick().await;
            if !self.is_alive() {
                break;
            }

            frame_skip = frame_skip.wrapping_add(1);
            if frame_skip % process_every != 0 {
                StatCounters::bump(&self.streams.stats.skipped_ticks);
                continue;
            }

            let Some(frame) = source.current_frame() else {
                trace!("No frame available");
                continue;
            };

            let detection = self.detector.detect(&frame).await;
            if !self.is_alive() {
                debug!("Discarding detection that resolved after stop");
                break;
            }

            let now_ms = self.clock.now_ms();
            let stats = &self.streams.stats;
            match detection {
                Ok(Some(detection)) => match self.session.analyze(&detection.landmarks, now_ms) {
                    Ok(report) => {
                        StatCounters::bump(&stats.face_frames);
                        self.streams.publish(&report, &self.session);
                    }
                    Err(e) => {
                        StatCounters::bump(&stats.rejected_frames);
                        debug!("Skipping frame with unusable landmarks: {}", e);
                    }
                },
                Ok(None) => {
                    StatCounters::bump(&stats.face_lost_frames);
                    let report = self.session.face_lost();
                    self.streams.publish(&report, &self.session);
                }
                Err(e) => {
                    StatCounters::bump(&stats.detection_errors);
                    warn!("Detection failed, skipping frame: {}", e);
                }
            }
        }

        debug!("Detection loop task exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dms::synthetic::{self, FaceShape};
    use dms::{Detection, DmsError, LandmarkFrame};
    use std::sync::atomic::AtomicUsize;
    use tokio::time::{sleep, Instant};

    /// Clock following Tokio's (pausable) time
    struct TokioClock(Instant);

    impl Clock for TokioClock {
        fn now_ms(&self) -> u64 {
            self.0.elapsed().as_millis() as u64
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Script {
        OpenEyes,
        ClosedEyes,
        NoFace,
        FailOddCalls,
        Slow,
    }

    struct ScriptedDetector {
        calls: AtomicUsize,
        closed: AtomicBool,
        script: Script,
    }

    impl ScriptedDetector {
        fn new(script: Script) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                closed: AtomicBool::new(script == Script::ClosedEyes),
                script,
            }
        }

        fn face(&self) -> LandmarkFrame {
            if self.closed.load(Ordering::SeqCst) {
                synthetic::face(FaceShape::eyes_closed())
            } else {
                synthetic::face(FaceShape::default())
            }
        }
    }

    impl LandmarkDetector for ScriptedDetector {
        type Frame = u64;

        async fn detect(&self, _frame: &u64) -> Result<Option<Detection>, DmsError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.script {
                Script::OpenEyes | Script::ClosedEyes => Ok(Some(self.face().into())),
                Script::NoFace => Ok(None),
                Script::FailOddCalls if call % 2 == 1 => {
                    Err(DmsError::Detection("inference backend hiccup".into()))
                }
                Script::FailOddCalls => Ok(Some(self.face().into())),
                Script::Slow => {
                    sleep(Duration::from_secs(1)).await;
                    Ok(Some(synthetic::face(FaceShape::eyes_closed()).into()))
                }
            }
        }
    }

    struct CountingSource(u64);

    impl FrameSource for CountingSource {
        type Frame = u64;

        fn current_frame(&mut self) -> Option<u64> {
            self.0 += 1;
            Some(self.0)
        }
    }

    fn make_loop(script: Script) -> (DetectionLoop<ScriptedDetector>, Arc<DetectorService<ScriptedDetector>>) {
        let service = Arc::new(DetectorService::ready(ScriptedDetector::new(script)));
        let detection_loop = DetectionLoop::new(
            Arc::clone(&service),
            LoopConfig::default(),
            DmsConfig::default(),
        )
        .with_clock(Arc::new(TokioClock(Instant::now())));
        (detection_loop, service)
    }

    fn calls(service: &DetectorService<ScriptedDetector>) -> usize {
        service.detector().unwrap().calls.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_processes_every_other_tick() {
        let (mut detection_loop, service) = make_loop(Script::ClosedEyes);
        detection_loop.start(CountingSource(0)).unwrap();

        sleep(Duration::from_secs(2)).await;

        let processed = calls(&service);
        let stats = detection_loop.stats();
        assert!((55..=65).contains(&processed), "processed {}", processed);
        assert_eq!(stats.face_frames as usize, processed);
        assert!(stats.skipped_ticks.abs_diff(processed as u64) <= 1);

        let metrics = detection_loop.subscribe_metrics().borrow().clone();
        assert_eq!(metrics.perclos, 100.0);
        assert!(metrics.face_detected);
        assert_eq!(*detection_loop.subscribe_alert_level().borrow(), AlertLevel::Critical);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detector_errors_do_not_stop_loop() {
        let (mut detection_loop, _service) = make_loop(Script::FailOddCalls);
        detection_loop.start(CountingSource(0)).unwrap();

        sleep(Duration::from_secs(1)).await;

        let stats = detection_loop.stats();
        assert!(detection_loop.is_running());
        assert!(stats.detection_errors > 10);
        assert!(stats.face_frames > 10);
        assert!(detection_loop.subscribe_metrics().borrow().face_detected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_face_publishes_face_lost() {
        let (mut detection_loop, _service) = make_loop(Script::NoFace);
        let mut metrics_rx = detection_loop.subscribe_metrics();
        detection_loop.start(CountingSource(0)).unwrap();

        sleep(Duration::from_millis(500)).await;

        assert!(metrics_rx.has_changed().unwrap());
        let metrics = metrics_rx.borrow_and_update().clone();
        assert!(!metrics.face_detected);
        assert_eq!(metrics.perclos, 0.0);
        assert_eq!(detection_loop.stats().face_frames, 0);
        assert!(detection_loop.stats().face_lost_frames > 0);
        assert!(detection_loop.subscribe_history().borrow().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_loaded_detector() {
        let service = Arc::new(DetectorService::<ScriptedDetector>::new());
        let mut detection_loop =
            DetectionLoop::new(service, LoopConfig::default(), DmsConfig::default());

        let result = detection_loop.start(CountingSource(0));

        assert!(matches!(
            result,
            Err(LoopError::Dms(DmsError::DetectorUnavailable(_)))
        ));
        assert_eq!(detection_loop.state(), LoopState::Idle);
    }

    #[test]
    fn test_tick_interval_bounds() {
        let default = LoopConfig::default().tick_interval().unwrap();
        assert_eq!(default.as_micros(), 16_666);
        let max_rate = LoopConfig { refresh_rate_hz: 1_000.0, ..Default::default() };
        assert_eq!(max_rate.tick_interval().unwrap(), MIN_TICK_INTERVAL);

        for hz in [f64::INFINITY, f64::NAN, 0.0, -60.0, 1e9, 1e-300] {
            let config = LoopConfig { refresh_rate_hz: hz, ..Default::default() };
            assert!(
                matches!(config.tick_interval(), Err(LoopError::InvalidConfig(_))),
                "{} Hz accepted",
                hz
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_unusable_refresh_rate() {
        let service = Arc::new(DetectorService::ready(ScriptedDetector::new(Script::OpenEyes)));
        let config = LoopConfig { refresh_rate_hz: f64::INFINITY, ..Default::default() };
        let mut detection_loop = DetectionLoop::new(Arc::clone(&service), config, DmsConfig::default());

        let result = detection_loop.start(CountingSource(0));

        assert!(matches!(result, Err(LoopError::InvalidConfig(_))));
        assert_eq!(detection_loop.state(), LoopState::Idle);
        sleep(Duration::from_millis(100)).await;
        assert_eq!(calls(&service), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_rejected() {
        let (mut detection_loop, _service) = make_loop(Script::OpenEyes);
        detection_loop.start(CountingSource(0)).unwrap();
        assert!(matches!(
            detection_loop.start(CountingSource(0)),
            Err(LoopError::AlreadyRunning)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_halts_detection() {
        let (mut detection_loop, service) = make_loop(Script::OpenEyes);
        detection_loop.start(CountingSource(0)).unwrap();
        sleep(Duration::from_millis(500)).await;

        detection_loop.stop();
        assert_eq!(detection_loop.state(), LoopState::Idle);
        let after_stop = calls(&service);

        detection_loop.stop();
        assert_eq!(detection_loop.state(), LoopState::Idle);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(calls(&service), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_begins_fresh_session() {
        let (mut detection_loop, service) = make_loop(Script::ClosedEyes);
        detection_loop.start(CountingSource(0)).unwrap();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(detection_loop.subscribe_metrics().borrow().perclos, 100.0);

        detection_loop.stop();
        service.detector().unwrap().closed.store(false, Ordering::SeqCst);

        detection_loop.start(CountingSource(0)).unwrap();
        assert_eq!(*detection_loop.subscribe_metrics().borrow(), FatigueMetrics::default());
        assert!(detection_loop.subscribe_history().borrow().is_empty());

        sleep(Duration::from_secs(1)).await;
        let metrics = detection_loop.subscribe_metrics().borrow().clone();
        assert_eq!(metrics.perclos, 0.0);
        assert!(metrics.eyes_open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_detection_discarded_after_stop() {
        let (mut detection_loop, service) = make_loop(Script::Slow);
        detection_loop.start(CountingSource(0)).unwrap();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(calls(&service), 1);
        detection_loop.stop();

        sleep(Duration::from_secs(3)).await;
        assert_eq!(*detection_loop.subscribe_metrics().borrow(), FatigueMetrics::default());
        assert_eq!(detection_loop.stats().face_frames, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_detector_lowers_frame_rate() {
        let (mut detection_loop, service) = make_loop(Script::Slow);
        detection_loop.start(CountingSource(0)).unwrap();

        sleep(Duration::from_millis(3_500)).await;

        // One detection in flight at a time: roughly one frame per second
        let processed = calls(&service);
        assert!((3..=4).contains(&processed), "processed {}", processed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_published_on_append() {
        let (mut detection_loop, _service) = make_loop(Script::OpenEyes);
        let mut history_rx = detection_loop.subscribe_history();
        detection_loop.start(CountingSource(0)).unwrap();

        sleep(Duration::from_secs(6)).await;

        assert!(history_rx.has_changed().unwrap());
        let history = history_rx.borrow_and_update().clone();
        assert_eq!(history.len(), 2);
        assert!(history[1].timestamp_ms - history[0].timestamp_ms >= 5_000);
    }
}
