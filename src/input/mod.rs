/// Video input system (Frame Acquirer)
///
/// Owns camera handles and their acquire/release lifecycle
/// - Acquirer:       opens sessions, one per device id at a time
/// - CameraSession:  scoped device handle, released on close or drop
/// - SyntheticCamera: generated scenes for hosts without a webcam
/// - FfmpegCamera:   local webcam via DirectShow/AVFoundation/V4L2 (feature `ffmpeg`)
pub mod backend;
pub mod session;
pub mod synthetic;

#[cfg(feature = "ffmpeg")]
pub mod camera;
#[cfg(feature = "ffmpeg")]
pub mod decode_filter;

use std::time::Duration;

use crate::detection::Frame;
use crate::error::Result;

pub use backend::SystemBackend;
pub use session::{Acquirer, CameraSession, DEFAULT_CAPTURE_TIMEOUT};
pub use synthetic::{Scene, SyntheticCamera};

#[cfg(feature = "ffmpeg")]
pub use camera::FfmpegCamera;

/// An opened device delivering frames
pub trait FrameSource: Send {
    /// Wait up to `timeout` for the most recent frame; `Ok(None)` when none arrived
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>>;

    /// Give the device back. Called exactly once by the owning session.
    fn release(&mut self);
}

/// Something that can open devices by id
pub trait CameraBackend: Send + Sync {
    fn open(&self, device_id: &str) -> Result<Box<dyn FrameSource>>;

    /// Key used for exclusive reservation; aliases of one device must agree
    fn canonical_id(&self, device_id: &str) -> String {
        device_id.trim().to_string()
    }

    fn list_devices(&self) -> Vec<String> {
        Vec::new()
    }
}
