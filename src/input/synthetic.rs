//! Synthetic camera - generated scenes for hosts without a webcam
//!
//! Device ids: `synthetic` (alias of `synthetic:on`), `synthetic:on`,
//! `synthetic:off`, `synthetic:ambient`, `synthetic:cycle`.
//! Frames carry random single-pixel speckles, the kind of sensor noise the
//! detector's opening pass removes.

use std::time::Duration;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{CameraBackend, FrameSource};
use crate::detection::Frame;
use crate::error::{Error, Result};

pub const SYNTHETIC_PREFIX: &str = "synthetic";

/// Frames per half period of `Scene::Cycle`
const CYCLE_FRAMES: u64 = 5;

/// What the synthetic camera looks at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scene {
    /// dark room, one warm and one white bulb lit
    LightsOn,
    /// dark room, bulbs visible but unlit
    LightsOff,
    /// evenly lit room, no discrete source
    Ambient,
    /// alternates LightsOn / LightsOff
    Cycle,
}

impl Scene {
    pub fn from_device_id(device_id: &str) -> Option<Self> {
        let rest = device_id.trim().strip_prefix(SYNTHETIC_PREFIX)?;
        match rest {
            "" | ":on" => Some(Scene::LightsOn),
            ":off" => Some(Scene::LightsOff),
            ":ambient" => Some(Scene::Ambient),
            ":cycle" => Some(Scene::Cycle),
            _ => None,
        }
    }

    pub fn device_id(&self) -> &'static str {
        match self {
            Scene::LightsOn => "synthetic:on",
            Scene::LightsOff => "synthetic:off",
            Scene::Ambient => "synthetic:ambient",
            Scene::Cycle => "synthetic:cycle",
        }
    }
}

/// Synthetic camera backend
#[derive(Clone, Debug)]
pub struct SyntheticCamera {
    pub width: u32,
    pub height: u32,
    pub noise_pixels: u32,
    pub seed: u64,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            noise_pixels: 200,
            seed: 0x5eed,
        }
    }
}

impl SyntheticCamera {
    pub fn handles(device_id: &str) -> bool {
        device_id.trim().starts_with(SYNTHETIC_PREFIX)
    }

    /// Render one frame of `scene`; `frame_no` drives `Scene::Cycle`
    pub fn render(&self, scene: Scene, frame_no: u64, rng: &mut StdRng) -> RgbImage {
        let (w, h) = (self.width, self.height);
        let scene = match scene {
            Scene::Cycle if (frame_no / CYCLE_FRAMES) % 2 == 0 => Scene::LightsOn,
            Scene::Cycle => Scene::LightsOff,
            other => other,
        };

        let background = match scene {
            Scene::Ambient => Rgb([150, 146, 138]),
            _ => Rgb([22, 20, 26]),
        };
        let mut img = RgbImage::from_pixel(w, h, background);

        // ceiling fixture
        if scene != Scene::Ambient && w >= 40 && h >= 40 {
            draw_filled_rect_mut(
                &mut img,
                Rect::at(0, (h / 12) as i32).of_size(w, (h / 48).max(1)),
                Rgb([45, 42, 40]),
            );
        }

        let radius = (w.min(h) / 16).max(2) as i32;
        let bulbs = [
            ((w / 3) as i32, (h / 3) as i32, Rgb([255, 176, 60])),  // warm
            ((2 * w / 3) as i32, (h / 2) as i32, Rgb([250, 250, 248])), // white
        ];
        for (cx, cy, lit) in bulbs {
            let colour = match scene {
                Scene::LightsOn => lit,
                Scene::LightsOff => Rgb([70, 68, 66]),
                _ => continue,
            };
            draw_filled_circle_mut(&mut img, (cx, cy), radius, colour);
        }

        for _ in 0..self.noise_pixels {
            let x = rng.gen_range(0..w.max(1));
            let y = rng.gen_range(0..h.max(1));
            if w > 0 && h > 0 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        img
    }
}

impl CameraBackend for SyntheticCamera {
    fn open(&self, device_id: &str) -> Result<Box<dyn FrameSource>> {
        let scene = Scene::from_device_id(device_id)
            .ok_or_else(|| Error::device_unavailable(device_id, "unknown synthetic scene"))?;
        Ok(Box::new(SyntheticSource {
            camera: self.clone(),
            scene,
            rng: StdRng::seed_from_u64(self.seed),
            frame_no: 0,
        }))
    }

    fn canonical_id(&self, device_id: &str) -> String {
        Scene::from_device_id(device_id)
            .map(|s| s.device_id().to_string())
            .unwrap_or_else(|| device_id.trim().to_string())
    }

    fn list_devices(&self) -> Vec<String> {
        [Scene::LightsOn, Scene::LightsOff, Scene::Ambient, Scene::Cycle]
            .iter()
            .map(|s| s.device_id().to_string())
            .collect()
    }
}

struct SyntheticSource {
    camera: SyntheticCamera,
    scene: Scene,
    rng: StdRng,
    frame_no: u64,
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self, _timeout: Duration) -> Result<Option<Frame>> {
        let img = self.camera.render(self.scene, self.frame_no, &mut self.rng);
        self.frame_no += 1;
        Ok(Some(Frame::new(img)))
    }

    fn release(&mut self) {
        tracing::debug!(scene = ?self.scene, frames = self.frame_no, "Synthetic camera released");
    }
}
