//! Detection thresholds - tuned through a flat JSON file
//!
//! ```json
//! { "threshold": 200, "min_area": 100, "max_bulbs": 10 }
//! ```
//! Every other key is optional and falls back to its default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Signal reported when no bulb is found but the frame is not dark
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AmbientPolicy {
    /// No discrete source means no bulb evidence
    #[default]
    Off,
    /// Treat a well-lit room as lights on
    On,
}

/// Detector parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    // === Thresholding ===
    pub threshold: u8, // V channel cutoff, pixel is bright iff V >= threshold

    // === Region filter ===
    pub min_area: u32,          // smaller components are sensor noise
    pub max_bulbs: u32,         // largest N regions are kept
    pub min_aspect_ratio: f32,  // bbox width / height
    pub max_aspect_ratio: f32,  // rejects long thin specular streaks
    pub max_area_fraction: f32, // larger components are floods, not bulbs
    pub min_fill_ratio: f32,    // area / bbox area, 0 disables the shape check

    // === Signal ===
    pub darkness_threshold: f32, // mean V below this is a dark room
    pub ambient_policy: AmbientPolicy,

    // === Morphology ===
    pub kernel_size: u8, // square structuring element edge, odd
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            threshold: 200,

            min_area: 100,
            max_bulbs: 10,
            min_aspect_ratio: 0.5,
            max_aspect_ratio: 2.0,
            max_area_fraction: 0.5,
            min_fill_ratio: 0.0,

            darkness_threshold: 60.0,
            ambient_policy: AmbientPolicy::Off,

            kernel_size: 5,
        }
    }
}

impl ThresholdConfig {
    /// Check value ranges serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.max_bulbs == 0 {
            return Err(Error::Config("max_bulbs must be at least 1".into()));
        }
        if !(self.min_aspect_ratio > 0.0) {
            return Err(Error::Config("min_aspect_ratio must be positive".into()));
        }
        if self.min_aspect_ratio > self.max_aspect_ratio {
            return Err(Error::Config(format!(
                "min_aspect_ratio {} exceeds max_aspect_ratio {}",
                self.min_aspect_ratio, self.max_aspect_ratio
            )));
        }
        if !(self.max_area_fraction > 0.0 && self.max_area_fraction <= 1.0) {
            return Err(Error::Config(format!(
                "max_area_fraction {} outside (0, 1]",
                self.max_area_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.min_fill_ratio) {
            return Err(Error::Config(format!(
                "min_fill_ratio {} outside [0, 1]",
                self.min_fill_ratio
            )));
        }
        if !(self.darkness_threshold >= 0.0) {
            return Err(Error::Config("darkness_threshold must not be negative".into()));
        }
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(Error::Config(format!(
                "kernel_size {} must be odd",
                self.kernel_size
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; a missing file is created with defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => {
                let config = Self::from_json(&json)?;
                tracing::info!(path = %path.display(), "✅ Thresholds loaded");
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "📝 Config file missing, writing defaults");
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        tracing::info!(path = %path.display(), "💾 Thresholds saved");
        Ok(())
    }

    /// Log the active thresholds
    pub fn log_summary(&self) {
        tracing::info!(
            threshold = self.threshold,
            min_area = self.min_area,
            max_bulbs = self.max_bulbs,
            aspect = %format!("{:.2}..={:.2}", self.min_aspect_ratio, self.max_aspect_ratio),
            max_area_fraction = self.max_area_fraction,
            min_fill_ratio = self.min_fill_ratio,
            darkness_threshold = self.darkness_threshold,
            ambient_policy = ?self.ambient_policy,
            kernel_size = self.kernel_size,
            "🎛️  Detector thresholds"
        );
    }
}
