pub mod camera;
pub mod file;
#[cfg(feature = "v4l")]
pub mod v4l_camera;

use base64::Engine;
use image::{codecs::jpeg::JpegEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use camera::{
    wait_until_ready, CameraDevice, CameraSession, CameraState, CameraStatus, MediaStream,
};
#[cfg(feature = "v4l")]
pub use v4l_camera::V4lCamera;
pub use file::FilePicker;

/// Snapshot size used when the camera reports no frame dimensions
pub const FALLBACK_WIDTH: u32 = 1280;
pub const FALLBACK_HEIGHT: u32 = 720;

const JPEG_QUALITY: u8 = 92;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Unable to access camera: {0}")]
    PermissionDenied(String),
    #[error("Camera is not supported: {0}")]
    Unsupported(String),
    #[error("Camera is not ready yet")]
    NotReady,
    #[error("Camera session already released")]
    Released,
    #[error("Not an image file: {0}")]
    NotAnImage(String),
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode or decode image: {0}")]
    Image(#[from] image::ImageError),
}

impl CaptureError {
    /// Errors that should block the capture screen and send the user back
    pub fn is_capability_denial(&self) -> bool {
        matches!(
            self,
            CaptureError::PermissionDenied(_) | CaptureError::Unsupported(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    LiveCamera,
    FilePicker,
}

/// What the view shows for a capture. Never sent over the network.
#[derive(Debug, Clone)]
pub enum PreviewHandle {
    Frame(Arc<RgbaImage>),
    File(PathBuf),
}

/// One encoded still image, ready for submission
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub source: SourceKind,
    pub mime: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Arc<Vec<u8>>,
    pub preview: PreviewHandle,
}

impl CapturedImage {
    /// Bare base64, as the analysis endpoint expects it
    pub fn base64_payload(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.bytes.as_slice())
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64_payload())
    }
}

/// Serializable description of a capture for the view layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSummary {
    pub source: SourceKind,
    pub width: u32,
    pub height: u32,
    pub preview_path: Option<String>,
    pub data_url: String,
}

impl From<&CapturedImage> for CaptureSummary {
    fn from(image: &CapturedImage) -> Self {
        let preview_path = match &image.preview {
            PreviewHandle::File(p) => Some(p.to_string_lossy().to_string()),
            PreviewHandle::Frame(_) => None,
        };
        Self {
            source: image.source,
            width: image.width,
            height: image.height,
            preview_path,
            data_url: image.data_url(),
        }
    }
}

/// Either way of getting a photo. Both produce the same `CapturedImage`.
pub enum ImageSource {
    LiveCamera(CameraSession),
    FilePicker(FilePicker),
}

impl ImageSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ImageSource::LiveCamera(_) => SourceKind::LiveCamera,
            ImageSource::FilePicker(_) => SourceKind::FilePicker,
        }
    }

    pub fn capture(&mut self) -> Result<CapturedImage, CaptureError> {
        match self {
            ImageSource::LiveCamera(session) => session.capture(),
            ImageSource::FilePicker(picker) => picker.load(),
        }
    }
}

/// Copy a frame into a still. Frames without dimensions become a blank
/// fallback-sized canvas.
pub fn snapshot_frame(frame: &RgbaImage) -> RgbaImage {
    if frame.width() == 0 || frame.height() == 0 {
        RgbaImage::new(FALLBACK_WIDTH, FALLBACK_HEIGHT)
    } else {
        frame.clone()
    }
}

/// Encode an RGBA frame as JPEG (alpha dropped)
pub fn encode_jpeg(frame: &RgbaImage) -> Result<Vec<u8>, CaptureError> {
    let rgb = image::DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(&rgb)?;
    Ok(buf)
}
