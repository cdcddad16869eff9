mod common;

use bulb_sentinel::{
    detect, detect_encoded, AmbientPolicy, DetectionResult, Frame, Signal, ThresholdConfig,
};
use common::synthetic_image::{self, WHITE};
use image::Rgb;

fn within(actual: u32, expected: u32, tolerance: u32) -> bool {
    actual.abs_diff(expected) <= tolerance
}

fn assert_consistent(result: &DetectionResult) {
    assert_eq!(result.bulb_count(), result.regions().len());
}

#[test]
fn single_white_circle_is_one_bulb() {
    let frame = synthetic_image::circle(640, 480, (320, 240), 30, WHITE);
    let result = detect(&frame, &ThresholdConfig::default());

    assert_consistent(&result);
    assert_eq!(result.bulb_count(), 1);
    assert_eq!(result.signal(), Signal::On);

    let region = &result.regions()[0];
    assert!(within(region.x, 290, 3), "x = {}", region.x);
    assert!(within(region.y, 210, 3), "y = {}", region.y);
    assert!(within(region.xmax(), 350, 3), "xmax = {}", region.xmax());
    assert!(within(region.ymax(), 270, 3), "ymax = {}", region.ymax());
    assert!((region.mean_brightness - 255.0).abs() < f32::EPSILON);
}

#[test]
fn bright_rectangles_within_bounds_are_bulbs() {
    let config = ThresholdConfig::default();
    let cases: &[&[(i32, i32, u32, u32)]] = &[
        &[(100, 100, 20, 20)],
        &[(10, 10, 40, 30), (400, 300, 25, 40)],
        &[(0, 0, 15, 12)],
    ];
    for patches in cases {
        let frame = synthetic_image::rects(640, 480, patches, Rgb([240, 240, 235]));
        let result = detect(&frame, &config);
        assert_consistent(&result);
        assert_eq!(result.bulb_count(), patches.len(), "patches {:?}", patches);
        assert_eq!(result.signal(), Signal::On);
    }
}

#[test]
fn all_dark_frame_is_off() {
    let frame = synthetic_image::uniform(640, 480, 0);
    let result = detect(&frame, &ThresholdConfig::default());
    assert_consistent(&result);
    assert_eq!(result.bulb_count(), 0);
    assert_eq!(result.signal(), Signal::Off);
    assert!(result.average_brightness().abs() < 1e-3);
}

#[test]
fn uniform_bright_frame_follows_ambient_policy() {
    let frame = synthetic_image::uniform(640, 480, 255);

    let result = detect(&frame, &ThresholdConfig::default());
    assert_consistent(&result);
    assert_eq!(result.bulb_count(), 0);
    assert_eq!(result.signal(), Signal::Off);
    assert!((result.average_brightness() - 255.0).abs() < 1e-3);

    let lit_room = ThresholdConfig {
        ambient_policy: AmbientPolicy::On,
        ..Default::default()
    };
    let result = detect(&frame, &lit_room);
    assert_eq!(result.bulb_count(), 0);
    assert_eq!(result.signal(), Signal::On);
}

#[test]
fn detect_is_idempotent() {
    let frame = synthetic_image::circle(320, 240, (100, 80), 18, Rgb([255, 200, 120]));
    let config = ThresholdConfig::default();
    assert_eq!(detect(&frame, &config), detect(&frame, &config));
}

#[test]
fn malformed_input_is_unknown() {
    let config = ThresholdConfig::default();

    let empty = Frame::new(image::RgbImage::new(0, 0));
    let result = detect(&empty, &config);
    assert_eq!(result.signal(), Signal::Unknown);
    assert_consistent(&result);

    let result = detect_encoded(b"definitely not an image", &config);
    assert_eq!(result.signal(), Signal::Unknown);
    assert_eq!(result.bulb_count(), 0);
}

#[test]
fn encoded_png_matches_raw_frame() {
    let frame = synthetic_image::circle(320, 240, (160, 120), 25, WHITE);
    let mut png = Vec::new();
    frame
        .image()
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let config = ThresholdConfig::default();
    let from_bytes = detect_encoded(&png, &config);
    let from_frame = detect(&frame, &config);
    assert_eq!(from_bytes.signal(), Signal::On);
    assert_eq!(from_bytes.regions(), from_frame.regions());
}
