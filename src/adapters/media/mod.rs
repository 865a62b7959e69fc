pub mod ffmpeg;
pub mod youtube;

use std::path::Path;

use crate::adapters::v4l2::capture::V4l2Capture;
use crate::application::ports::{FrameSource, MediaPort};
use crate::domain::camera::{CameraMode, FrameSize};
use crate::domain::errors::{DomainError, DomainResult};
use ffmpeg::FfmpegReader;

/// Abre ficheros y streams con ffmpeg y webcams con V4L2.
pub struct MediaAdapter {
    ffmpeg_bin: String,
    display: FrameSize,
}

impl MediaAdapter {
    pub fn new(ffmpeg_bin: impl Into<String>, display: FrameSize) -> Self {
        Self { ffmpeg_bin: ffmpeg_bin.into(), display }
    }
}

impl MediaPort for MediaAdapter {
    fn open_file(&self, path: &Path) -> DomainResult<Box<dyn FrameSource>> {
        if !path.is_file() {
            return Err(DomainError::SourceUnavailable(format!(
                "video file not found: {}",
                path.display()
            )));
        }
        let input = path.to_string_lossy();
        Ok(Box::new(FfmpegReader::spawn(&self.ffmpeg_bin, &input, self.display)?))
    }

    fn open_stream(&self, url: &str) -> DomainResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegReader::spawn(&self.ffmpeg_bin, url, self.display)?))
    }

    fn open_camera(&self, device: &str, mode: &CameraMode) -> DomainResult<Box<dyn FrameSource>> {
        let capture = V4l2Capture::open(device, mode)
            .map_err(|e| DomainError::SourceUnavailable(format!("webcam {device}: {e}")))?;
        Ok(Box::new(capture))
    }
}
