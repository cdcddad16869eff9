//! Acquirer and scoped camera sessions
//!
//! Every successful `open` is paired with exactly one backend release:
//! `close` is idempotent and `Drop` calls it, so an error between open and
//! close cannot leave the device reserved.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{CameraBackend, FrameSource, SystemBackend};
use crate::detection::Frame;
use crate::error::{Error, Result};

/// Bounded wait for one frame
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_millis(2000);

type Reservations = Arc<Mutex<HashSet<String>>>;

fn lock(reserved: &Reservations) -> std::sync::MutexGuard<'_, HashSet<String>> {
    // the set stays consistent even if a holder panicked
    reserved.lock().unwrap_or_else(|e| e.into_inner())
}

/// Frame acquirer
#[derive(Clone)]
pub struct Acquirer {
    backend: Arc<dyn CameraBackend>,
    reserved: Reservations,
    capture_timeout: Duration,
}

impl Acquirer {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            backend,
            reserved: Arc::new(Mutex::new(HashSet::new())),
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    /// Synthetic scenes plus real webcams when built with `ffmpeg`
    pub fn system() -> Self {
        Self::new(Arc::new(SystemBackend::new()))
    }

    pub fn with_capture_timeout(mut self, capture_timeout: Duration) -> Self {
        self.capture_timeout = capture_timeout;
        self
    }

    pub fn capture_timeout(&self) -> Duration {
        self.capture_timeout
    }

    /// Open a device, reserving it exclusively
    pub fn open(&self, device_id: &str) -> Result<CameraSession> {
        let key = self.backend.canonical_id(device_id);
        if !lock(&self.reserved).insert(key.clone()) {
            return Err(Error::device_unavailable(device_id, "already in use by another session"));
        }

        match self.backend.open(device_id) {
            Ok(source) => {
                tracing::info!(device_id = %key, "📷 Camera session opened");
                Ok(CameraSession {
                    device_id: key,
                    source: Some(source),
                    reserved: self.reserved.clone(),
                    capture_timeout: self.capture_timeout,
                    frames_captured: 0,
                })
            }
            Err(e) => {
                lock(&self.reserved).remove(&key);
                tracing::warn!(device_id = %key, error = %e, "❌ Camera open failed");
                Err(e)
            }
        }
    }

    /// Open, run `f`, close. The session is closed whatever `f` returns.
    pub fn with_session<T>(
        &self,
        device_id: &str,
        f: impl FnOnce(&mut CameraSession) -> Result<T>,
    ) -> Result<T> {
        let mut session = self.open(device_id)?;
        let out = f(&mut session);
        session.close();
        out
    }

    pub fn is_reserved(&self, device_id: &str) -> bool {
        lock(&self.reserved).contains(&self.backend.canonical_id(device_id))
    }

    pub fn list_devices(&self) -> Vec<String> {
        self.backend.list_devices()
    }
}

/// Open device handle
pub struct CameraSession {
    device_id: String,
    source: Option<Box<dyn FrameSource>>,
    reserved: Reservations,
    capture_timeout: Duration,
    frames_captured: u64,
}

impl CameraSession {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Most recent frame, waiting at most the capture timeout
    pub fn capture(&mut self) -> Result<Frame> {
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| Error::SessionClosed(self.device_id.clone()))?;

        match source.next_frame(self.capture_timeout)? {
            Some(frame) => {
                self.frames_captured += 1;
                Ok(frame)
            }
            None => Err(Error::CaptureTimeout {
                device_id: self.device_id.clone(),
                waited_ms: self.capture_timeout.as_millis() as u64,
            }),
        }
    }

    /// Release the device. A second call is a no-op.
    pub fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
            lock(&self.reserved).remove(&self.device_id);
            tracing::info!(
                device_id = %self.device_id,
                frames = self.frames_captured,
                "📷 Camera session closed"
            );
        }
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CameraSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSession")
            .field("device_id", &self.device_id)
            .field("open", &self.is_open())
            .field("frames_captured", &self.frames_captured)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails or times out on demand, counts releases
    struct ScriptedSource {
        mode: Mode,
        releases: Arc<AtomicUsize>,
    }

    #[derive(Clone, Copy)]
    enum Mode {
        Frames,
        Timeout,
        Broken,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self, _timeout: Duration) -> Result<Option<Frame>> {
            match self.mode {
                Mode::Frames => Ok(Some(Frame::new(RgbImage::new(4, 4)))),
                Mode::Timeout => Ok(None),
                Mode::Broken => Err(Error::Capture("stream ended".into())),
            }
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedBackend {
        mode: Mode,
        opens: AtomicUsize,
        releases: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                opens: AtomicUsize::new(0),
                releases: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    impl CameraBackend for ScriptedBackend {
        fn open(&self, device_id: &str) -> Result<Box<dyn FrameSource>> {
            if device_id == "missing" {
                return Err(Error::device_unavailable(device_id, "no such device"));
            }
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedSource {
                mode: self.mode,
                releases: self.releases.clone(),
            }))
        }
    }

    #[test]
    fn test_capture_failure_still_releases_once() {
        let backend = ScriptedBackend::new(Mode::Broken);
        let acquirer = Acquirer::new(backend.clone());

        let out = acquirer.with_session("cam", |session| session.capture());
        assert!(matches!(out, Err(Error::Capture(_))));
        assert_eq!(backend.opens.load(Ordering::SeqCst), 1);
        assert_eq!(backend.releases.load(Ordering::SeqCst), 1);
        assert!(!acquirer.is_reserved("cam"));
    }

    #[test]
    fn test_close_is_idempotent_and_drop_does_not_double_release() {
        let backend = ScriptedBackend::new(Mode::Frames);
        let acquirer = Acquirer::new(backend.clone());

        let mut session = acquirer.open("cam").unwrap();
        assert!(session.capture().is_ok());
        session.close();
        session.close();
        drop(session);
        assert_eq!(backend.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_capture_after_close_is_session_closed() {
        let acquirer = Acquirer::new(ScriptedBackend::new(Mode::Frames));
        let mut session = acquirer.open("cam").unwrap();
        session.close();
        assert!(matches!(session.capture(), Err(Error::SessionClosed(_))));
    }

    #[test]
    fn test_timeout_reports_bounded_wait() {
        let acquirer = Acquirer::new(ScriptedBackend::new(Mode::Timeout))
            .with_capture_timeout(Duration::from_millis(250));
        let mut session = acquirer.open("cam").unwrap();
        match session.capture() {
            Err(Error::CaptureTimeout { waited_ms, .. }) => assert_eq!(waited_ms, 250),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_one_session_per_device() {
        let acquirer = Acquirer::new(ScriptedBackend::new(Mode::Frames));
        let first = acquirer.open("cam").unwrap();
        assert!(matches!(
            acquirer.open(" cam "),
            Err(Error::DeviceUnavailable { .. })
        ));
        // other devices are independent
        let other = acquirer.open("cam2").unwrap();
        drop(first);
        assert!(acquirer.open("cam").is_ok());
        drop(other);
    }

    #[test]
    fn test_failed_open_does_not_reserve() {
        let backend = ScriptedBackend::new(Mode::Frames);
        let acquirer = Acquirer::new(backend.clone());
        assert!(matches!(
            acquirer.open("missing"),
            Err(Error::DeviceUnavailable { .. })
        ));
        assert!(!acquirer.is_reserved("missing"));
        assert_eq!(backend.releases.load(Ordering::SeqCst), 0);
    }
}
