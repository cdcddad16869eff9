//! Detector
//! Pipeline: RGB -> HSV -> V threshold -> opening -> 8-connected regions -> bulb filter -> signal

use std::sync::Arc;

use chrono::Local;
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::types::{DetectionResult, Frame, FrameStats, LightType, Region, Signal};
use crate::config::{AmbientPolicy, ThresholdConfig};

/// Detector bound to a shared, read-only configuration
#[derive(Clone, Debug)]
pub struct Detector {
    config: Arc<ThresholdConfig>,
}

impl Detector {
    pub fn new(config: Arc<ThresholdConfig>) -> Self {
        Self { config }
    }

    pub fn detect(&self, frame: &Frame) -> DetectionResult {
        detect(frame, &self.config)
    }
}

/// Classify one frame. Never fails: a zero-sized frame yields `Signal::Unknown`.
pub fn detect(frame: &Frame, config: &ThresholdConfig) -> DetectionResult {
    if frame.is_empty() {
        return DetectionResult::unknown(frame.captured_at());
    }
    let rgb = frame.image();

    // 1. colour transform, only V is thresholded
    let value = value_channel(rgb);

    // 2. per-pixel threshold
    let mask = threshold_mask(&value, config.threshold);

    // 3. erosion then dilation with the same square element
    let cleaned = open(&mask, config.kernel_size);

    // 4. 8-connected components
    let candidates = extract_regions(&cleaned, &value, rgb);

    // 5. area / aspect / flood / shape filter, capped at max_bulbs
    let regions = select_bulbs(candidates, config, frame.pixel_count());

    // 6-7. whole-frame brightness and signal
    let mut stats = measure(&value, &mask);
    let average_brightness = mean(&value);
    let covered: u64 = regions.iter().map(|r| r.area as u64).sum();
    stats.bulb_coverage_percentage = percentage(covered, frame.pixel_count());

    let signal = derive_signal(regions.len(), average_brightness, config);

    DetectionResult::new(
        signal,
        average_brightness,
        regions,
        frame.captured_at(),
        Some(stats),
    )
}

/// Decode then classify; undecodable bytes yield `Signal::Unknown`
pub fn detect_encoded(bytes: &[u8], config: &ThresholdConfig) -> DetectionResult {
    match Frame::decode(bytes) {
        Ok(frame) => detect(&frame, config),
        Err(e) => {
            tracing::debug!(error = %e, "⚠️ Frame failed to decode");
            DetectionResult::unknown(Local::now())
        }
    }
}

// ========== Colour ==========

/// RGB -> HSV on the 8-bit scale used by most vision libraries:
/// H in 0..180 (degrees / 2), S and V in 0..=255
pub fn rgb_to_hsv(p: &Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = p.0;
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (v - min) as f32;
    if v == 0 || delta == 0.0 {
        return [0, 0, v];
    }
    let s = (delta * 255.0 / v as f32).round() as u8;

    let (r, g, b) = (r as f32, g as f32, b as f32);
    let mut h = if v as f32 == r {
        60.0 * (g - b) / delta
    } else if v as f32 == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }
    [((h / 2.0).round() as u8) % 180, s, v]
}

fn value_channel(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([r.max(g).max(b)])
    })
}

fn tone_of(p: &Rgb<u8>) -> LightType {
    let [h, s, _] = rgb_to_hsv(p);
    if s <= 30 {
        LightType::White
    } else if s >= 50 && (10..=25).contains(&h) {
        LightType::Warm
    } else if s >= 50 && (100..=130).contains(&h) {
        LightType::Cool
    } else {
        LightType::Colored
    }
}

// ========== Mask ==========

fn threshold_mask(value: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(value.width(), value.height(), |x, y| {
        if value.get_pixel(x, y)[0] >= threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Morphological opening with a `kernel_size` x `kernel_size` square
fn open(mask: &GrayImage, kernel_size: u8) -> GrayImage {
    // LInf ball of radius k is a (2k+1) square
    let k = kernel_size / 2;
    if k == 0 {
        return mask.clone();
    }
    dilate(&erode(mask, Norm::LInf, k), Norm::LInf, k)
}

// ========== Regions ==========

#[derive(Clone, Debug)]
struct Blob {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    area: u32,
    sum_v: u64,
    tones: [u32; 4], // White, Warm, Cool, Colored
}

impl Blob {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            area: 0,
            sum_v: 0,
            tones: [0; 4],
        }
    }

    fn add(&mut self, x: u32, y: u32, v: u8, tone: LightType) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.area += 1;
        self.sum_v += v as u64;
        self.tones[tone as usize] += 1;
    }

    fn into_region(self) -> Region {
        let width = self.max_x - self.min_x + 1;
        let height = self.max_y - self.min_y + 1;
        let tones = [
            LightType::White,
            LightType::Warm,
            LightType::Cool,
            LightType::Colored,
        ];
        // first maximum wins, so ties prefer White
        let mut light_type = LightType::White;
        let mut best = 0;
        for (tone, &count) in tones.iter().zip(self.tones.iter()) {
            if count > best {
                best = count;
                light_type = *tone;
            }
        }
        Region {
            x: self.min_x,
            y: self.min_y,
            width,
            height,
            area: self.area,
            mean_brightness: self.sum_v as f32 / self.area.max(1) as f32,
            aspect_ratio: width as f32 / height as f32,
            fill_ratio: self.area as f32 / (width * height) as f32,
            light_type,
        }
    }
}

fn extract_regions(cleaned: &GrayImage, value: &GrayImage, rgb: &RgbImage) -> Vec<Region> {
    let labels = connected_components(cleaned, Connectivity::Eight, Luma([0u8]));

    let mut blobs: Vec<Option<Blob>> = Vec::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        if blobs.len() <= label {
            blobs.resize(label + 1, None);
        }
        let blob = blobs[label].get_or_insert_with(|| Blob::new(x, y));
        blob.add(x, y, value.get_pixel(x, y)[0], tone_of(rgb.get_pixel(x, y)));
    }

    blobs.into_iter().flatten().map(Blob::into_region).collect()
}

fn select_bulbs(candidates: Vec<Region>, config: &ThresholdConfig, frame_pixels: u64) -> Vec<Region> {
    let max_area = config.max_area_fraction as f64 * frame_pixels as f64;

    let mut bulbs: Vec<Region> = candidates
        .into_iter()
        .filter(|r| r.area >= config.min_area)
        .filter(|r| {
            r.aspect_ratio >= config.min_aspect_ratio && r.aspect_ratio <= config.max_aspect_ratio
        })
        .filter(|r| (r.area as f64) <= max_area)
        .filter(|r| r.fill_ratio >= config.min_fill_ratio)
        .collect();

    if bulbs.len() > config.max_bulbs as usize {
        bulbs.sort_by(|a, b| b.area.cmp(&a.area).then(a.y.cmp(&b.y)).then(a.x.cmp(&b.x)));
        bulbs.truncate(config.max_bulbs as usize);
    }
    bulbs.sort_by(|a, b| a.y.cmp(&b.y).then(a.x.cmp(&b.x)));
    bulbs
}

// ========== Signal ==========

fn derive_signal(bulb_count: usize, average_brightness: f32, config: &ThresholdConfig) -> Signal {
    if bulb_count > 0 {
        Signal::On
    } else if average_brightness < config.darkness_threshold {
        Signal::Off
    } else {
        match config.ambient_policy {
            AmbientPolicy::Off => Signal::Off,
            AmbientPolicy::On => Signal::On,
        }
    }
}

fn mean(value: &GrayImage) -> f32 {
    let n = value.as_raw().len();
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = value.as_raw().iter().map(|&v| v as u64).sum();
    (sum as f64 / n as f64) as f32
}

fn measure(value: &GrayImage, mask: &GrayImage) -> FrameStats {
    let raw = value.as_raw();
    let n = raw.len() as u64;
    let avg = mean(value) as f64;
    let var = raw
        .iter()
        .map(|&v| {
            let d = v as f64 - avg;
            d * d
        })
        .sum::<f64>()
        / n.max(1) as f64;
    let bright = mask.as_raw().iter().filter(|&&m| m > 0).count() as u64;

    FrameStats {
        width: value.width(),
        height: value.height(),
        total_pixels: n,
        brightness_std: var.sqrt() as f32,
        min_brightness: raw.iter().copied().min().unwrap_or(0),
        max_brightness: raw.iter().copied().max().unwrap_or(0),
        bright_pixel_percentage: percentage(bright, n),
        bulb_coverage_percentage: 0.0,
    }
}

fn percentage(part: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (part as f64 * 100.0 / total as f64) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    fn black(width: u32, height: u32) -> RgbImage {
        RgbImage::new(width, height)
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv(&Rgb([255, 0, 0])), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(&Rgb([0, 255, 0])), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(&Rgb([0, 0, 255])), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(&Rgb([255, 255, 255])), [0, 0, 255]);
        assert_eq!(rgb_to_hsv(&Rgb([0, 0, 0])), [0, 0, 0]);
    }

    #[test]
    fn test_tones() {
        assert_eq!(tone_of(&Rgb([250, 250, 245])), LightType::White);
        assert_eq!(tone_of(&Rgb([255, 170, 40])), LightType::Warm);
        assert_eq!(tone_of(&Rgb([60, 120, 255])), LightType::Cool);
        assert_eq!(tone_of(&Rgb([255, 0, 255])), LightType::Colored);
    }

    #[test]
    fn test_opening_removes_isolated_pixels() {
        let mut mask = GrayImage::new(40, 40);
        mask.put_pixel(5, 5, Luma([255]));
        mask.put_pixel(30, 8, Luma([255]));
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(12, 12), Luma([255]));

        let cleaned = open(&mask, 5);
        assert_eq!(cleaned.get_pixel(5, 5)[0], 0);
        assert_eq!(cleaned.get_pixel(30, 8)[0], 0);
        // a square larger than the element survives unchanged
        assert_eq!(cleaned.get_pixel(10, 10)[0], 255);
        assert_eq!(cleaned.get_pixel(21, 21)[0], 255);
        assert_eq!(cleaned.get_pixel(22, 22)[0], 0);
    }

    #[test]
    fn test_empty_frame_is_unknown() {
        let frame = Frame::new(black(0, 0));
        let result = detect(&frame, &ThresholdConfig::default());
        assert_eq!(result.signal(), Signal::Unknown);
        assert_eq!(result.bulb_count(), 0);
        assert!(result.frame_stats().is_none());

        let frame = Frame::new(black(640, 0));
        assert_eq!(detect(&frame, &ThresholdConfig::default()).signal(), Signal::Unknown);
    }

    #[test]
    fn test_undecodable_bytes_are_unknown() {
        let result = detect_encoded(&[0xff, 0xd8, 0x00], &ThresholdConfig::default());
        assert_eq!(result.signal(), Signal::Unknown);
    }

    #[test]
    fn test_small_blob_is_noise() {
        // 8x8 = 64 px survives the 5x5 opening but stays under min_area
        let mut img = black(100, 100);
        draw_filled_rect_mut(&mut img, Rect::at(40, 40).of_size(8, 8), Rgb([255, 255, 255]));
        let result = detect(&Frame::new(img), &ThresholdConfig::default());
        assert_eq!(result.bulb_count(), 0);
        assert_eq!(result.signal(), Signal::Off);
    }

    #[test]
    fn test_streak_rejected_by_aspect_ratio() {
        let mut img = black(200, 100);
        draw_filled_rect_mut(&mut img, Rect::at(10, 40).of_size(150, 8), Rgb([255, 255, 255]));
        let result = detect(&Frame::new(img), &ThresholdConfig::default());
        assert_eq!(result.bulb_count(), 0);
    }

    #[test]
    fn test_max_bulbs_keeps_largest_in_reading_order() {
        let mut img = black(300, 100);
        draw_filled_circle_mut(&mut img, (40, 50), 12, Rgb([255, 255, 255]));
        draw_filled_circle_mut(&mut img, (150, 50), 25, Rgb([255, 255, 255]));
        draw_filled_circle_mut(&mut img, (250, 50), 18, Rgb([255, 255, 255]));
        let config = ThresholdConfig {
            max_bulbs: 2,
            ..Default::default()
        };
        let result = detect(&Frame::new(img), &config);
        assert_eq!(result.bulb_count(), 2);
        // largest two, left to right
        assert!(result.regions()[0].x < result.regions()[1].x);
        assert!(result.regions()[0].x > 100);
    }

    #[test]
    fn test_ambient_policy() {
        // uniform mid-grey room, no discrete source
        let img = RgbImage::from_pixel(120, 90, Rgb([150, 150, 150]));
        let frame = Frame::new(img);

        let off = detect(&frame, &ThresholdConfig::default());
        assert_eq!(off.signal(), Signal::Off);
        assert_eq!(off.bulb_count(), 0);

        let config = ThresholdConfig {
            ambient_policy: AmbientPolicy::On,
            ..Default::default()
        };
        let on = detect(&frame, &config);
        assert_eq!(on.signal(), Signal::On);
        assert_eq!(on.bulb_count(), 0);
    }

    #[test]
    fn test_warm_bulb_tone() {
        let mut img = black(120, 120);
        draw_filled_circle_mut(&mut img, (60, 60), 20, Rgb([255, 170, 40]));
        let result = detect(&Frame::new(img), &ThresholdConfig::default());
        assert_eq!(result.bulb_count(), 1);
        assert_eq!(result.regions()[0].light_type, LightType::Warm);
        assert!(result.regions()[0].mean_brightness > 250.0);
    }

    #[test]
    fn test_stats() {
        let mut img = black(10, 10);
        draw_filled_rect_mut(&mut img, Rect::at(0, 0).of_size(10, 5), Rgb([200, 0, 0]));
        let result = detect(&Frame::new(img), &ThresholdConfig::default());
        let stats = result.frame_stats().unwrap();
        assert_eq!(stats.total_pixels, 100);
        assert_eq!(stats.max_brightness, 200);
        assert_eq!(stats.min_brightness, 0);
        assert!((result.average_brightness() - 100.0).abs() < 1e-3);
        assert!((stats.brightness_std - 100.0).abs() < 1e-3);
        assert!((stats.bright_pixel_percentage - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_min_fill_ratio_rejects_hollow_shapes() {
        // L shape: 60x60 bbox, fill ~0.36
        let mut img = black(200, 200);
        draw_filled_rect_mut(&mut img, Rect::at(50, 50).of_size(60, 12), Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut img, Rect::at(50, 50).of_size(12, 60), Rgb([255, 255, 255]));
        draw_filled_circle_mut(&mut img, (160, 160), 15, Rgb([255, 255, 255]));
        let frame = Frame::new(img);

        let lenient = detect(&frame, &ThresholdConfig::default());
        assert_eq!(lenient.bulb_count(), 2);
        assert!(lenient.regions()[0].fill_ratio < 0.5);

        let strict = ThresholdConfig {
            min_fill_ratio: 0.5,
            ..Default::default()
        };
        let result = detect(&frame, &strict);
        assert_eq!(result.bulb_count(), 1);
        assert!(result.regions()[0].fill_ratio > 0.7);
    }
}
