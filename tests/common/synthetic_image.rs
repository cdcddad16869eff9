//! Hand-built frames with known content

use bulb_sentinel::Frame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

pub fn black(width: u32, height: u32) -> RgbImage {
    RgbImage::new(width, height)
}

pub fn uniform(width: u32, height: u32, value: u8) -> Frame {
    Frame::new(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
}

/// Black frame with one filled circle
pub fn circle(width: u32, height: u32, center: (i32, i32), radius: i32, colour: Rgb<u8>) -> Frame {
    let mut img = black(width, height);
    draw_filled_circle_mut(&mut img, center, radius, colour);
    Frame::new(img)
}

/// Black frame with filled rectangles `(x, y, w, h)`
pub fn rects(width: u32, height: u32, patches: &[(i32, i32, u32, u32)], colour: Rgb<u8>) -> Frame {
    let mut img = black(width, height);
    for &(x, y, w, h) in patches {
        draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(w, h), colour);
    }
    Frame::new(img)
}
