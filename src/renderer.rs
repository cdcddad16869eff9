/// Frame rendering for the video feed and the CLI: bulb boxes, status badge,
/// downscale, JPEG.
use fast_image_resize as fr;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detection::{DetectionResult, Frame, LightType, Signal};
use crate::error::{Error, Result};

/// Feed size
pub const STREAM_WIDTH: u32 = 640;
pub const STREAM_HEIGHT: u32 = 480;
pub const JPEG_QUALITY: u8 = 80;

const BADGE_SIZE: u32 = 24;

fn box_colour(light_type: LightType) -> Rgb<u8> {
    match light_type {
        LightType::White => Rgb([0, 255, 0]),
        LightType::Warm => Rgb([255, 165, 0]),
        LightType::Cool => Rgb([0, 160, 255]),
        LightType::Colored => Rgb([255, 0, 255]),
    }
}

fn badge_colour(signal: Signal) -> Rgb<u8> {
    match signal {
        Signal::On => Rgb([0, 200, 0]),
        Signal::Off => Rgb([200, 0, 0]),
        Signal::Unknown => Rgb([128, 128, 128]),
    }
}

/// Copy of the frame with a 2px box around each bulb and a status badge
/// in the top-left corner
pub fn annotate(frame: &Frame, result: &DetectionResult) -> RgbImage {
    let mut img = frame.image().clone();
    if img.width() == 0 || img.height() == 0 {
        return img;
    }

    for region in result.regions() {
        let colour = box_colour(region.light_type);
        for inset in 0..2u32 {
            let (w, h) = (
                region.width.saturating_sub(2 * inset),
                region.height.saturating_sub(2 * inset),
            );
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut img, rect, colour);
        }
    }

    let badge = BADGE_SIZE.min(img.width()).min(img.height());
    draw_filled_rect_mut(
        &mut img,
        Rect::at(0, 0).of_size(badge, badge),
        badge_colour(result.signal()),
    );
    img
}

/// Nearest-neighbour resize to `width` x `height`; no-op when already that size
pub fn resize(img: &RgbImage, width: u32, height: u32) -> Result<RgbImage> {
    if img.width() == width && img.height() == height {
        return Ok(img.clone());
    }
    if img.width() == 0 || img.height() == 0 || width == 0 || height == 0 {
        return Err(Error::Internal("cannot resize an empty image".into()));
    }

    let src = fr::images::Image::from_vec_u8(
        img.width(),
        img.height(),
        img.as_raw().clone(),
        fr::PixelType::U8x3,
    )
    .map_err(|e| Error::Internal(format!("resize source: {}", e)))?;
    let mut dst = fr::images::Image::new(width, height, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src,
            &mut dst,
            &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Nearest),
        )
        .map_err(|e| Error::Internal(format!("resize: {}", e)))?;

    RgbImage::from_raw(width, height, dst.buffer().to_vec())
        .ok_or_else(|| Error::Internal("resize produced a short buffer".into()))
}

/// Feed-sized copy
pub fn resize_for_stream(img: &RgbImage) -> Result<RgbImage> {
    resize(img, STREAM_WIDTH, STREAM_HEIGHT)
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity((img.width() * img.height() / 4) as usize);
    JpegEncoder::new_with_quality(&mut buf, quality).encode_image(img)?;
    Ok(buf)
}

/// One feed frame: annotate when a result is given, downscale, encode
pub fn render_feed_frame(frame: &Frame, result: Option<&DetectionResult>) -> Result<Vec<u8>> {
    let img = match result {
        Some(result) => annotate(frame, result),
        None => frame.image().clone(),
    };
    let img = resize_for_stream(&img)?;
    encode_jpeg(&img, JPEG_QUALITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;
    use crate::detection::detect;
    use imageproc::drawing::draw_filled_circle_mut;

    fn bulb_frame() -> Frame {
        let mut img = RgbImage::new(320, 240);
        draw_filled_circle_mut(&mut img, (160, 120), 20, Rgb([255, 255, 255]));
        Frame::new(img)
    }

    #[test]
    fn test_annotate_draws_box_and_badge() {
        let frame = bulb_frame();
        let result = detect(&frame, &ThresholdConfig::default());
        assert_eq!(result.bulb_count(), 1);

        let img = annotate(&frame, &result);
        let region = &result.regions()[0];
        assert_eq!(*img.get_pixel(region.x, region.y), box_colour(region.light_type));
        assert_eq!(*img.get_pixel(2, 2), badge_colour(Signal::On));
        // source frame untouched
        assert_eq!(*frame.image().get_pixel(2, 2), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_resize_for_stream() {
        let img = RgbImage::from_pixel(1280, 720, Rgb([10, 20, 30]));
        let out = resize_for_stream(&img).unwrap();
        assert_eq!(out.dimensions(), (STREAM_WIDTH, STREAM_HEIGHT));
        assert_eq!(*out.get_pixel(100, 100), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_feed_frame_is_jpeg() {
        let bytes = render_feed_frame(&bulb_frame(), None).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), STREAM_WIDTH);
    }
}
