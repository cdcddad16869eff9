/// Device dispatch: synthetic scenes first, then real webcams
use super::synthetic::SyntheticCamera;
use super::{CameraBackend, FrameSource};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct SystemBackend {
    synthetic: SyntheticCamera,
}

impl SystemBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// `0`, `video0` and `/dev/video0` all name the same webcam
pub fn parse_camera_index(device_id: &str) -> Option<usize> {
    let id = device_id.trim();
    let digits = id
        .strip_prefix("/dev/video")
        .or_else(|| id.strip_prefix("video"))
        .unwrap_or(id);
    digits.parse().ok()
}

impl CameraBackend for SystemBackend {
    fn open(&self, device_id: &str) -> Result<Box<dyn FrameSource>> {
        if SyntheticCamera::handles(device_id) {
            return self.synthetic.open(device_id);
        }
        let index = parse_camera_index(device_id)
            .ok_or_else(|| Error::device_unavailable(device_id, "unrecognised device id"))?;

        #[cfg(feature = "ffmpeg")]
        {
            super::camera::FfmpegCamera::open(index)
        }
        #[cfg(not(feature = "ffmpeg"))]
        {
            let _ = index;
            Err(Error::device_unavailable(
                device_id,
                "built without webcam support (enable the `ffmpeg` feature), try `synthetic`",
            ))
        }
    }

    fn canonical_id(&self, device_id: &str) -> String {
        if SyntheticCamera::handles(device_id) {
            return self.synthetic.canonical_id(device_id);
        }
        match parse_camera_index(device_id) {
            Some(index) => format!("video{}", index),
            None => device_id.trim().to_string(),
        }
    }

    fn list_devices(&self) -> Vec<String> {
        #[allow(unused_mut)]
        let mut devices = Vec::new();
        #[cfg(feature = "ffmpeg")]
        devices.extend(
            super::camera::get_camera_devices()
                .into_iter()
                .map(|(index, _name)| format!("video{}", index)),
        );
        devices.extend(self.synthetic.list_devices());
        devices
    }
}
