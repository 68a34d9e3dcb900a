//! Vision/OCR Layer
//!
//! Loads photographs of instrument displays and turns them into text. Both
//! steps are external capabilities behind the [`ImageLoader`] and
//! [`OcrEngine`] traits:
//! - [`FsImageLoader`] decodes files with the `image` crate
//! - [`TesseractOcr`] runs the Tesseract command-line engine

pub mod ocr_preprocess;
pub mod tesseract;

pub use ocr_preprocess::apply_preprocessing;
pub use tesseract::TesseractOcr;

use async_trait::async_trait;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Decoded image ready for OCR
#[derive(Debug, Clone)]
pub struct ImageHandle {
    /// Where the image was loaded from
    pub path: PathBuf,
    /// Decoded pixels
    pub image: DynamicImage,
}

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>, image: DynamicImage) -> Self {
        Self {
            path: path.into(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("image file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image loading interrupted: {0}")]
    Interrupted(String),
}

/// Loads an image from disk
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<ImageHandle, ImageLoadError>;
}

/// `image`-crate loader for PNG, JPEG and TIFF photographs
#[derive(Debug, Clone, Copy, Default)]
pub struct FsImageLoader;

impl ImageLoader for FsImageLoader {
    fn load(&self, path: &Path) -> Result<ImageHandle, ImageLoadError> {
        if !path.is_file() {
            return Err(ImageLoadError::NotFound(path.to_path_buf()));
        }

        let image = image::open(path).map_err(|source| ImageLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            "Loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );

        Ok(ImageHandle::new(path, image))
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to launch OCR engine `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("failed to prepare image for OCR: {0}")]
    Prepare(String),
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),
    #[error("OCR produced no text")]
    NoText { raw_text: String },
}

impl OcrError {
    /// Text the engine produced before the failure, if any
    pub fn recovered_text(&self) -> Option<&str> {
        match self {
            OcrError::NoText { raw_text } => Some(raw_text),
            _ => None,
        }
    }
}

/// Text recognition engine
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Recognize the text of an image, optionally with a language hint
    async fn recognize(
        &self,
        image: &ImageHandle,
        language: Option<&str>,
    ) -> Result<String, OcrError>;
}
