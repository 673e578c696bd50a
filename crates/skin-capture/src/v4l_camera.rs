//! Video4Linux camera backend.

use image::{ImageFormat, RgbaImage};
use std::io::ErrorKind;
use tracing::{debug, info};
use ::v4l::buffer::Type;
use ::v4l::io::traits::CaptureStream;
use ::v4l::prelude::*;
use ::v4l::video::Capture;
use ::v4l::FourCC;

use crate::{CameraDevice, CaptureError, MediaStream};

/// Kernel buffers mapped for the preview stream
const STREAM_BUFFERS: u32 = 4;

/// `/dev/video<index>`, read as MJPEG
pub struct V4lCamera {
    index: usize,
}

impl V4lCamera {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl Default for V4lCamera {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CameraDevice for V4lCamera {
    fn name(&self) -> String {
        format!("/dev/video{}", self.index)
    }

    fn acquire(&self) -> Result<Box<dyn MediaStream>, CaptureError> {
        let device = Device::new(self.index).map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => CaptureError::PermissionDenied(e.to_string()),
            _ => CaptureError::Unsupported(format!("{}: {}", self.name(), e)),
        })?;

        let mut fmt = device
            .format()
            .map_err(|e| CaptureError::Unsupported(e.to_string()))?;
        fmt.fourcc = FourCC::new(b"MJPG");
        let fmt = device
            .set_format(&fmt)
            .map_err(|e| CaptureError::Unsupported(e.to_string()))?;
        info!(
            "Opened {} at {}x{} ({})",
            self.name(),
            fmt.width,
            fmt.height,
            fmt.fourcc
        );

        // The stream keeps its own handle to the device, so it is not tied
        // to the borrow and lives as long as `V4lStream`
        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| CaptureError::Unsupported(format!("{}: {}", self.name(), e)))?;

        Ok(Box::new(V4lStream {
            stream: Some(stream),
            device: Some(device),
        }))
    }
}

struct V4lStream {
    stream: Option<MmapStream<'static>>,
    device: Option<Device>,
}

impl MediaStream for V4lStream {
    fn next_frame(&mut self) -> anyhow::Result<RgbaImage> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("camera stream stopped"))?;
        let (data, meta) = stream.next()?;
        debug!("Frame {} ({} bytes)", meta.sequence, data.len());
        let frame = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgba8();
        Ok(frame)
    }

    fn stop(&mut self) {
        // Stream off and unmap before the file descriptor closes
        self.stream.take();
        self.device.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_unsupported() {
        let camera = V4lCamera::new(255);
        assert_eq!(camera.name(), "/dev/video255");
        match camera.acquire() {
            Err(CaptureError::Unsupported(message)) => {
                assert!(message.starts_with("/dev/video255"))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opened a camera that should not exist"),
        }
    }
}
