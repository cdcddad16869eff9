pub mod config; // detector thresholds
pub mod detection; // frame -> signal
pub mod error;
pub mod input; // camera acquisition
pub mod monitor; // capture/detect loop
pub mod renderer; // annotated JPEG frames
pub mod web; // HTTP API

pub use crate::config::{AmbientPolicy, ThresholdConfig};
pub use crate::detection::{
    detect, detect_encoded, DetectionResult, Detector, Frame, FrameStats, LightType, Region,
    Signal,
};
pub use crate::error::{Error, Result};
pub use crate::input::{Acquirer, CameraBackend, CameraSession, FrameSource};
pub use crate::monitor::{
    detect_once, get_latest_result, start_monitoring, stop_monitoring, MonitorHandle,
    MonitorOptions, MonitorState, MonitorView,
};

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%3f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
