/// Detection data structures
use chrono::{DateTime, Local};
use image::RgbImage;
use serde::Serialize;
use std::fmt;

use crate::error::Result;

// ========== Frame ==========

/// Captured frame (acquirer -> detector)
///
/// Immutable once produced. A zero-sized frame is representable and is
/// reported as `Signal::Unknown` by the detector.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self::with_timestamp(image, Local::now())
    }

    pub fn with_timestamp(image: RgbImage, captured_at: DateTime<Local>) -> Self {
        Self { image, captured_at }
    }

    /// Packed RGB24 buffer; `None` when the length does not match the dimensions
    pub fn from_raw(width: u32, height: u32, rgb_data: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, rgb_data).map(Self::new)
    }

    /// Decode an encoded still (JPEG, PNG, ...)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        Ok(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }
}

// ========== Signal ==========

/// Light state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Signal {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::On => "ON",
            Signal::Off => "OFF",
            Signal::Unknown => "UNKNOWN",
        }
    }

    /// Room status wording shown by the web page
    pub fn room_status(&self) -> &'static str {
        match self {
            Signal::On => "LIGHTS_ON",
            Signal::Off => "LIGHTS_OFF",
            Signal::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== Regions ==========

/// Colour family of a bright region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightType {
    /// high value, low saturation
    White,
    /// orange-yellow hue
    Warm,
    /// blue hue
    Cool,
    Colored,
}

/// Bright blob kept as a bulb
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub area: u32, // pixel count of the cleaned component
    pub mean_brightness: f32,
    pub aspect_ratio: f32, // width / height
    pub fill_ratio: f32,   // area / bbox area
    pub light_type: LightType,
}

impl Region {
    pub fn xmax(&self) -> u32 {
        self.x + self.width - 1
    }

    pub fn ymax(&self) -> u32 {
        self.y + self.height - 1
    }
}

// ========== Result ==========

/// Whole-frame brightness statistics (V channel)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameStats {
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
    pub brightness_std: f32,
    pub min_brightness: u8,
    pub max_brightness: u8,
    pub bright_pixel_percentage: f32, // raw threshold mask, before cleanup
    pub bulb_coverage_percentage: f32,
}

/// Per-frame detection result (detector -> monitor -> web)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionResult {
    signal: Signal,
    bulb_count: usize,
    average_brightness: f32,
    regions: Vec<Region>,
    timestamp: DateTime<Local>,
    frame_stats: Option<FrameStats>,
}

impl DetectionResult {
    pub fn new(
        signal: Signal,
        average_brightness: f32,
        regions: Vec<Region>,
        timestamp: DateTime<Local>,
        frame_stats: Option<FrameStats>,
    ) -> Self {
        Self {
            signal,
            bulb_count: regions.len(),
            average_brightness,
            regions,
            timestamp,
            frame_stats,
        }
    }

    /// Absent, undecodable or zero-sized frame
    pub fn unknown(timestamp: DateTime<Local>) -> Self {
        Self::new(Signal::Unknown, 0.0, Vec::new(), timestamp, None)
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn bulb_count(&self) -> usize {
        self.bulb_count
    }

    pub fn average_brightness(&self) -> f32 {
        self.average_brightness
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn frame_stats(&self) -> Option<&FrameStats> {
        self.frame_stats.as_ref()
    }
}
