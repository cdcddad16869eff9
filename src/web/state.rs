//! Application state
//!
//! Holds the acquirer, the shared detector config and the (at most one)
//! running monitor. Start/stop serialize on a mutex; readers only load the
//! published view and never wait on a device open.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::Mutex;

use crate::config::ThresholdConfig;
use crate::error::{Error, Result};
use crate::input::Acquirer;
use crate::monitor::{self, Latest, MonitorHandle, MonitorOptions, MonitorState, MonitorView};

/// Server options
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Camera to monitor
    pub device_id: String,
    /// Pause between detections
    pub interval: Duration,
    /// Consecutive capture timeouts that end a session
    pub max_consecutive_timeouts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_id: "0".to_string(),
            interval: Duration::from_secs(1),
            max_consecutive_timeouts: 3,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub acquirer: Acquirer,
    pub threshold: Arc<ThresholdConfig>,
    pub config: Arc<AppConfig>,
    pub debug_mode: Arc<AtomicBool>,
    pub started_at: DateTime<Local>,
    monitor: Arc<Mutex<Option<MonitorHandle>>>,
    current: Arc<Latest<Option<MonitorView>>>,
}

impl AppState {
    pub fn new(acquirer: Acquirer, threshold: ThresholdConfig, config: AppConfig) -> Self {
        Self {
            acquirer,
            threshold: Arc::new(threshold),
            config: Arc::new(config),
            debug_mode: Arc::new(AtomicBool::new(true)),
            started_at: Local::now(),
            monitor: Arc::new(Mutex::new(None)),
            current: Arc::new(Latest::new()),
        }
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode.load(Ordering::Relaxed)
    }

    /// Flip verbose per-frame logging; returns the new value
    pub fn toggle_debug(&self) -> bool {
        !self.debug_mode.fetch_xor(true, Ordering::Relaxed)
    }

    fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            interval: self.config.interval,
            max_consecutive_timeouts: self.config.max_consecutive_timeouts,
            verbose: self.debug_mode.clone(),
            ..Default::default()
        }
    }

    /// Start monitoring the configured device.
    /// A monitor that already failed or stopped is replaced.
    pub async fn start_monitor(&self) -> Result<MonitorView> {
        let mut slot = self.monitor.lock().await;
        if let Some(handle) = slot.as_ref() {
            if handle.is_running() {
                return Err(Error::AlreadyRunning(handle.device_id().to_string()));
            }
        }
        if let Some(stale) = slot.take() {
            self.current.publish(None);
            run_blocking(move || Ok(stale.stop())).await?;
        }

        let acquirer = self.acquirer.clone();
        let device_id = self.config.device_id.clone();
        let threshold = self.threshold.clone();
        let options = self.monitor_options();
        let handle = run_blocking(move || {
            monitor::start_monitoring(&acquirer, &device_id, threshold, options)
        })
        .await?;

        let view = handle.view();
        *slot = Some(handle);
        self.current.publish(Some(view.clone()));
        Ok(view)
    }

    /// Stop monitoring; the device is released when this returns
    pub async fn stop_monitor(&self) -> Result<MonitorState> {
        let handle = self.monitor.lock().await.take().ok_or(Error::NotRunning)?;
        let final_state = run_blocking(move || Ok(monitor::stop_monitoring(handle))).await;
        self.current.publish(None);
        final_state
    }

    /// View of the current monitor, running or failed
    pub fn monitor_view(&self) -> Option<MonitorView> {
        self.current.load().and_then(|view| (*view).clone())
    }

    pub fn is_running(&self) -> bool {
        self.monitor_view().map_or(false, |view| view.is_running())
    }
}

/// Run a blocking camera call off the async workers
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("blocking task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_state() -> AppState {
        AppState::new(
            Acquirer::system(),
            ThresholdConfig::default(),
            AppConfig {
                device_id: "synthetic:on".into(),
                interval: Duration::from_millis(10),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_start_twice_reports_already_running() {
        let state = synthetic_state();
        state.start_monitor().await.unwrap();
        assert!(state.is_running());
        assert!(matches!(
            state.start_monitor().await,
            Err(Error::AlreadyRunning(_))
        ));
        assert_eq!(state.stop_monitor().await.unwrap(), MonitorState::Stopped);
        assert!(!state.acquirer.is_reserved("synthetic:on"));
    }

    #[tokio::test]
    async fn test_stop_without_monitor() {
        let state = synthetic_state();
        assert!(matches!(state.stop_monitor().await, Err(Error::NotRunning)));
    }

    #[test]
    fn test_toggle_debug() {
        let state = synthetic_state();
        assert!(state.debug_mode());
        assert!(!state.toggle_debug());
        assert!(!state.debug_mode());
        assert!(state.toggle_debug());
    }
}
