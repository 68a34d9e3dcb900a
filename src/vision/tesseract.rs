//! Tesseract OCR backend
//!
//! Runs the `tesseract` command-line engine on a temporary PNG of the
//! (optionally preprocessed) image and reads the recognized text from stdout.

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::process::Output;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::ocr_preprocess::apply_preprocessing;
use super::{ImageHandle, OcrEngine, OcrError};
use crate::config::{OcrPreprocessing, OcrSettings};
use crate::shared::CapabilityState;

/// Tesseract engine wrapper
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    page_segmentation: Option<u32>,
    timeout: Duration,
    preprocessing: OcrPreprocessing,
}

impl TesseractOcr {
    pub fn new(settings: &OcrSettings, preprocessing: OcrPreprocessing) -> Self {
        Self {
            command: settings.tesseract_cmd.clone(),
            page_segmentation: settings.page_segmentation,
            timeout: settings.timeout(),
            preprocessing,
        }
    }

    /// Executable this engine launches
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Check that the executable can be launched
    pub async fn probe(&self) -> CapabilityState {
        match self.run(&["--version"]).await {
            Ok(output) => {
                // Older releases print the version on stderr
                let banner = first_line(&output.stdout)
                    .or_else(|| first_line(&output.stderr))
                    .unwrap_or_else(|| "tesseract".to_string());
                info!("OCR engine ready: {}", banner);
                CapabilityState::Ready
            }
            Err(e) => {
                warn!("OCR engine unavailable: {}", e);
                CapabilityState::Failed(e.to_string())
            }
        }
    }

    /// Languages with installed trained data
    pub async fn available_languages(&self) -> Result<Vec<String>, OcrError> {
        let output = self.run(&["--list-langs"]).await?;
        Ok(parse_language_list(&String::from_utf8_lossy(&output.stdout)))
    }

    /// Components of a `-l` value such as `fra+eng` without installed trained data
    pub async fn missing_languages(&self, language: &str) -> Result<Vec<String>, OcrError> {
        let installed = self.available_languages().await?;
        Ok(uninstalled(&installed, language))
    }

    async fn run(&self, args: &[&str]) -> Result<Output, OcrError> {
        let mut command = Command::new(&self.command);
        command.args(args).kill_on_drop(true);
        self.execute(command).await
    }

    async fn execute(&self, mut command: Command) -> Result<Output, OcrError> {
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| OcrError::Timeout(self.timeout))?
            .map_err(|source| OcrError::Launch {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(
        &self,
        image: &ImageHandle,
        language: Option<&str>,
    ) -> Result<String, OcrError> {
        debug!(
            "Tesseract: processing {} ({}x{}), language {:?}",
            image.path.display(),
            image.width(),
            image.height(),
            language
        );

        let pixels = image.image.clone();
        let preprocessing = self.preprocessing.clone();
        let file = tokio::task::spawn_blocking(move || write_temp_png(&pixels, &preprocessing))
            .await
            .map_err(|e| OcrError::Prepare(e.to_string()))??;

        let mut command = Command::new(&self.command);
        command.arg(file.path()).arg("stdout").kill_on_drop(true);
        if let Some(language) = language {
            command.arg("-l").arg(language);
        }
        if let Some(psm) = self.page_segmentation {
            command.arg("--psm").arg(psm.to_string());
        }

        let output = self.execute(command).await?;
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(OcrError::NoText { raw_text: text });
        }

        debug!("Tesseract: recognized {} characters", text.len());
        Ok(text)
    }
}

fn write_temp_png(
    image: &DynamicImage,
    preprocessing: &OcrPreprocessing,
) -> Result<NamedTempFile, OcrError> {
    let processed = apply_preprocessing(image, preprocessing);
    let mut file = tempfile::Builder::new()
        .prefix("geodelta-ocr-")
        .suffix(".png")
        .tempfile()
        .map_err(|e| OcrError::Prepare(e.to_string()))?;
    processed
        .write_to(&mut file, ImageFormat::Png)
        .map_err(|e| OcrError::Prepare(e.to_string()))?;
    Ok(file)
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// `--list-langs` prints a header line followed by one language per line
fn parse_language_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn uninstalled(installed: &[String], language: &str) -> Vec<String> {
    language
        .split('+')
        .map(str::trim)
        .filter(|code| !code.is_empty() && !installed.iter().any(|known| known == code))
        .map(str::to_string)
        .collect()
}
