/// FFmpeg frame tap: decoded YUV420P video -> RGB `Frame`s
use crossbeam_channel::{Receiver, Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame as AvFrame};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detection::Frame;

/// AV_PIX_FMT_YUV420P
const PIX_FMT_YUV420P: i32 = 0;

/// Keeps only the newest frame in a one-slot channel
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<Frame>,
    stale: Receiver<Frame>, // drains the slot so the newest frame wins
    stop: Arc<AtomicBool>,
    pub total_frames: usize,
    pub dropped_frames: usize,
}

impl DecodeFilter {
    pub fn new(tx: Sender<Frame>, stale: Receiver<Frame>, stop: Arc<AtomicBool>) -> Self {
        Self {
            tx,
            stale,
            stop,
            total_frames: 0,
            dropped_frames: 0,
        }
    }

    fn drop_frame(&mut self, why: &str) -> Result<Option<AvFrame>, String> {
        self.dropped_frames += 1;
        if self.total_frames <= 10 {
            tracing::warn!(frame = self.total_frames, reason = why, "⚠️ Dropping frame");
        }
        Ok(None)
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        tracing::debug!("✅ Decode thread started");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: AvFrame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<AvFrame>, String> {
        // session released: end the pipeline
        if self.stop.load(Ordering::Relaxed) {
            return Err("Camera released".to_string());
        }
        self.total_frames += 1;

        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                return self.drop_frame("empty or corrupt");
            }

            let raw = &*frame.as_ptr();
            let w = raw.width as usize;
            let h = raw.height as usize;
            if w == 0 || h == 0 || w > 4096 || h > 4096 {
                return self.drop_frame("illegal resolution");
            }
            if raw.format != PIX_FMT_YUV420P {
                return self.drop_frame("unexpected pixel format");
            }

            let y_plane = raw.data[0];
            let u_plane = raw.data[1];
            let v_plane = raw.data[2];
            let y_stride = raw.linesize[0] as usize;
            let uv_stride = raw.linesize[1] as usize;
            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                return self.drop_frame("null plane");
            }
            if y_stride < w || uv_stride < w / 2 {
                return self.drop_frame("bad stride");
            }

            let mut rgb = vec![0u8; w * h * 3];
            yuv420p_to_rgb(y_plane, u_plane, v_plane, y_stride, uv_stride, &mut rgb, w, h);

            if let Some(image) = RgbImage::from_raw(w as u32, h as u32, rgb) {
                let _ = self.stale.try_recv();
                match self.tx.try_send(Frame::new(image)) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => {
                        return Err("Frame receiver dropped".to_string());
                    }
                }
            }
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        tracing::debug!(
            total = self.total_frames,
            dropped = self.dropped_frames,
            "✅ Decode thread exited"
        );
    }
}

/// BT.601 integer YUV420P -> packed RGB24
#[inline]
#[allow(clippy::too_many_arguments)]
unsafe fn yuv420p_to_rgb(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] =
                (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
}
