use image::ImageFormat;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{CaptureError, CapturedImage, PreviewHandle, SourceKind};

/// Extensions offered by the native picker
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp"];

/// A photo chosen from disk
#[derive(Debug, Clone)]
pub struct FilePicker {
    path: PathBuf,
}

impl FilePicker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file and package it for submission. The payload is the
    /// original file bytes; the preview is the local path.
    pub fn load(&self) -> Result<CapturedImage, CaptureError> {
        let format = accepted_format(&self.path)?;

        let bytes = std::fs::read(&self.path)?;
        let decoded = image::load_from_memory_with_format(&bytes, format)?;
        debug!(
            "Decoded {} as {:?} ({}x{})",
            self.path.display(),
            format,
            decoded.width(),
            decoded.height()
        );

        let image = CapturedImage {
            source: SourceKind::FilePicker,
            mime: format.to_mime_type().to_string(),
            width: decoded.width(),
            height: decoded.height(),
            bytes: Arc::new(bytes),
            preview: PreviewHandle::File(self.path.clone()),
        };
        info!("Loaded photo {} ({} bytes)", self.path.display(), image.bytes.len());
        Ok(image)
    }
}

fn accepted_format(path: &Path) -> Result<ImageFormat, CaptureError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CaptureError::NotAnImage(path.display().to_string()));
    }
    ImageFormat::from_extension(&ext).ok_or_else(|| CaptureError::NotAnImage(path.display().to_string()))
}
