/// Monitoring loop
///
/// One background thread owns the `CameraSession`:
/// capture -> detect -> publish, at a fixed cadence, until stopped or failed.
/// Readers (web handlers) only ever touch the published cells.
pub mod latest;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossbeam_channel::{RecvTimeoutError, Sender};
use serde::Serialize;

use crate::config::ThresholdConfig;
use crate::detection::{detect, DetectionResult, Detector, Frame};
use crate::error::{Error, Result};
use crate::input::{Acquirer, CameraSession};
pub use latest::{History, Latest};

/// Loop tuning
#[derive(Clone, Debug)]
pub struct MonitorOptions {
    /// Pause between detections
    pub interval: Duration,
    /// Consecutive capture timeouts that end the session
    pub max_consecutive_timeouts: u32,
    /// Results kept for debugging (memory only)
    pub history_len: usize,
    /// Log every detection at info level
    pub verbose: Arc<AtomicBool>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_consecutive_timeouts: 3,
            history_len: 10,
            verbose: Arc::new(AtomicBool::new(true)),
        }
    }
}

/// Loop lifecycle as seen by readers
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MonitorState {
    Running,
    Stopped,
    Failed { error_code: String, message: String },
}

impl MonitorState {
    fn failed(e: &Error) -> Self {
        MonitorState::Failed {
            error_code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

/// Loop counters
#[derive(Clone, Debug, Serialize)]
pub struct MonitorStats {
    pub device_id: String,
    pub started_at: DateTime<Local>,
    pub frames_processed: u64,
    pub capture_timeouts: u64,
    pub last_analysis_ms: f64,
}

/// Everything the loop publishes
struct Shared {
    result: Latest<DetectionResult>,
    frame: Latest<Frame>,
    state: Latest<MonitorState>,
    history: History<DetectionResult>,
    frames_processed: AtomicU64,
    capture_timeouts: AtomicU64,
    last_analysis_us: AtomicU64,
}

impl Shared {
    fn new(history_len: usize) -> Self {
        let shared = Self {
            result: Latest::new(),
            frame: Latest::new(),
            state: Latest::new(),
            history: History::new(history_len),
            frames_processed: AtomicU64::new(0),
            capture_timeouts: AtomicU64::new(0),
            last_analysis_us: AtomicU64::new(0),
        };
        shared.state.publish(MonitorState::Running);
        shared
    }

    fn state(&self) -> MonitorState {
        self.state
            .load()
            .map(|s| (*s).clone())
            .unwrap_or(MonitorState::Stopped)
    }
}

/// Read-only view of a monitor's published cells; cheap to clone
#[derive(Clone)]
pub struct MonitorView {
    device_id: String,
    started_at: DateTime<Local>,
    shared: Arc<Shared>,
}

impl MonitorView {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn latest(&self) -> Option<Arc<DetectionResult>> {
        self.shared.result.load()
    }

    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.shared.frame.load()
    }

    pub fn history(&self) -> Vec<Arc<DetectionResult>> {
        self.shared.history.snapshot()
    }

    pub fn state(&self) -> MonitorState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            device_id: self.device_id.clone(),
            started_at: self.started_at,
            frames_processed: self.shared.frames_processed.load(Ordering::Relaxed),
            capture_timeouts: self.shared.capture_timeouts.load(Ordering::Relaxed),
            last_analysis_ms: self.shared.last_analysis_us.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

/// Handle to a running monitor; dropping it stops the loop
pub struct MonitorHandle {
    view: MonitorView,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

/// Open `device_id` and start the capture/detect loop.
/// `DeviceUnavailable` is returned here, before any thread is spawned.
pub fn start_monitoring(
    acquirer: &Acquirer,
    device_id: &str,
    config: Arc<ThresholdConfig>,
    options: MonitorOptions,
) -> Result<MonitorHandle> {
    let session = acquirer.open(device_id)?;
    let device_id = session.device_id().to_string();
    let shared = Arc::new(Shared::new(options.history_len));
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    let worker = {
        let shared = shared.clone();
        let detector = Detector::new(config);
        thread::Builder::new()
            .name(format!("monitor-{}", device_id))
            .spawn(move || run_loop(session, detector, stop_rx, shared, options))
            .map_err(|e| Error::Internal(format!("spawn monitor thread: {}", e)))?
    };

    tracing::info!(device_id = %device_id, "🔍 Monitoring started");

    Ok(MonitorHandle {
        view: MonitorView {
            device_id,
            started_at: Local::now(),
            shared,
        },
        stop_tx: Some(stop_tx),
        worker: Some(worker),
    })
}

/// Non-blocking read of the most recent result
pub fn get_latest_result(handle: &MonitorHandle) -> Option<Arc<DetectionResult>> {
    handle.latest()
}

/// Stop the loop; the session is closed when this returns
pub fn stop_monitoring(handle: MonitorHandle) -> MonitorState {
    handle.stop()
}

/// Open, capture, detect, close
pub fn detect_once(
    acquirer: &Acquirer,
    device_id: &str,
    config: &ThresholdConfig,
) -> Result<DetectionResult> {
    acquirer.with_session(device_id, |session| {
        let frame = session.capture()?;
        Ok(detect(&frame, config))
    })
}

impl std::ops::Deref for MonitorHandle {
    type Target = MonitorView;

    fn deref(&self) -> &MonitorView {
        &self.view
    }
}

impl MonitorHandle {
    pub fn view(&self) -> MonitorView {
        self.view.clone()
    }

    /// Running and the worker thread still alive
    pub fn is_running(&self) -> bool {
        self.view.is_running()
            && self.worker.as_ref().map_or(false, |w| !w.is_finished())
    }

    /// Signal the loop and wait for it to close the session
    pub fn stop(mut self) -> MonitorState {
        self.shutdown();
        self.state()
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.try_send(());
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(device_id = %self.view.device_id, "❌ Monitor thread panicked");
                self.view.shared.state.publish(MonitorState::Failed {
                    error_code: "INTERNAL_ERROR".into(),
                    message: "monitor thread panicked".into(),
                });
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop(
    mut session: CameraSession,
    detector: Detector,
    stop_rx: crossbeam_channel::Receiver<()>,
    shared: Arc<Shared>,
    options: MonitorOptions,
) {
    let mut consecutive_timeouts = 0u32;
    let mut failure = None;

    loop {
        match stop_rx.try_recv() {
            Ok(()) | Err(crossbeam_channel::TryRecvError::Disconnected) => break,
            Err(crossbeam_channel::TryRecvError::Empty) => {}
        }

        match session.capture() {
            Ok(frame) => {
                consecutive_timeouts = 0;
                let start = Instant::now();
                let result = detector.detect(&frame);
                let analysis_us = start.elapsed().as_micros() as u64;

                if options.verbose.load(Ordering::Relaxed) {
                    tracing::info!(
                        signal = %result.signal(),
                        bulbs = result.bulb_count(),
                        brightness = format!("{:.1}", result.average_brightness()),
                        analysis_ms = analysis_us as f64 / 1000.0,
                        "💡 Detection"
                    );
                }

                shared.frame.publish(frame);
                let result = shared.result.publish(result);
                shared.history.push(result);
                shared.frames_processed.fetch_add(1, Ordering::Relaxed);
                shared.last_analysis_us.store(analysis_us, Ordering::Relaxed);
            }
            Err(e) if e.is_transient() => {
                consecutive_timeouts += 1;
                shared.capture_timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    error = %e,
                    attempt = consecutive_timeouts,
                    limit = options.max_consecutive_timeouts,
                    "⚠️ Capture timeout"
                );
                if consecutive_timeouts >= options.max_consecutive_timeouts {
                    tracing::error!(error = %e, "❌ Too many capture timeouts, ending session");
                    failure = Some(MonitorState::failed(&e));
                    break;
                }
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "❌ Capture failed, ending session");
                failure = Some(MonitorState::failed(&e));
                break;
            }
        }

        match stop_rx.recv_timeout(options.interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // released before the final state becomes visible
    session.close();
    shared
        .state
        .publish(failure.unwrap_or(MonitorState::Stopped));
    tracing::info!(
        frames = shared.frames_processed.load(Ordering::Relaxed),
        "🛑 Monitoring loop exited"
    );
}
