/// Detection system
///
/// Stateless per-frame classification
/// - Detector: V-channel threshold + opening + connected regions
/// - Types:    frames, regions and results
pub mod detector;
pub mod types;

pub use detector::{detect, detect_encoded, rgb_to_hsv, Detector};
pub use types::{DetectionResult, Frame, FrameStats, LightType, Region, Signal};
