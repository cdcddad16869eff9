//! Webcam input - FFmpeg-backed frame source
//!
//! Local cameras through DirectShow (Windows) / AVFoundation (macOS) / V4L2 (Linux).
//! The device is opened once; failure is reported as `DeviceUnavailable`, never retried.

use super::decode_filter::DecodeFilter;
use super::FrameSource;
use crate::detection::Frame;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::core::scheduler::ffmpeg_scheduler::{FfmpegScheduler, Running};
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Open webcam
pub struct FfmpegCamera {
    device_index: usize,
    device_name: String,
    frames: Receiver<Frame>,
    stop: Arc<AtomicBool>,
    scheduler: Option<FfmpegScheduler<Running>>,
}

impl FfmpegCamera {
    /// Open webcam `index` and start decoding
    pub fn open(index: usize) -> Result<Box<dyn FrameSource>> {
        let device_name = get_camera_devices()
            .into_iter()
            .find(|(i, _)| *i == index)
            .map(|(_, name)| name)
            .unwrap_or_default();
        let camera_url = Self::format_camera_url(index, &device_name);
        let format = Self::input_format();
        let device_id = format!("video{}", index);

        tracing::info!(index, name = %device_name, url = %camera_url, format, "🎥 Opening webcam");

        let (tx, rx) = crossbeam_channel::bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx, rx.clone(), stop.clone());

        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        // leave resolution and frame rate to the driver; many webcams reject forced modes
        let input = Input::new(camera_url.as_str()).set_format(format);

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_descs(["format=yuv420p"].into())
            .output(out)
            .build()
            .map_err(|e| Error::device_unavailable(&device_id, e.to_string()))?;

        let scheduler = ctx
            .start()
            .map_err(|e| Error::device_unavailable(&device_id, e.to_string()))?;

        tracing::info!(index, "✅ Webcam connected, decoding");

        Ok(Box::new(Self {
            device_index: index,
            device_name,
            frames: rx,
            stop,
            scheduler: Some(scheduler),
        }))
    }

    /// Platform-specific input URL
    #[allow(unused_variables)]
    fn format_camera_url(index: usize, name: &str) -> String {
        #[cfg(target_os = "windows")]
        {
            format!("video={}", name)
        }
        #[cfg(target_os = "macos")]
        {
            format!("{}", index)
        }
        #[cfg(target_os = "linux")]
        {
            format!("/dev/video{}", index)
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            format!("{}", index)
        }
    }

    fn input_format() -> &'static str {
        #[cfg(target_os = "windows")]
        let format = "dshow"; // DirectShow

        #[cfg(target_os = "macos")]
        let format = "avfoundation"; // AVFoundation

        #[cfg(target_os = "linux")]
        let format = "v4l2"; // Video4Linux2

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        let format = "video4linux2";

        format
    }
}

impl FrameSource for FfmpegCamera {
    fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        match self.frames.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Capture(format!(
                "webcam {} ({}) stopped delivering frames",
                self.device_index, self.device_name
            ))),
        }
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.abort();
            let _ = scheduler.wait();
        }
        tracing::info!(index = self.device_index, "📹 Webcam decode loop ended");
    }
}

/// Available webcams as (index, name)
pub fn get_camera_devices() -> Vec<(usize, String)> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => devices.into_iter().enumerate().collect(),
        Err(e) => {
            tracing::warn!(error = %e, "⚠️ Listing webcams failed");
            vec![]
        }
    }
}
