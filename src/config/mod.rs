//! Application Configuration
//!
//! User settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// OCR engine settings
    pub ocr: OcrSettings,
    /// Image preprocessing applied before OCR
    pub preprocessing: OcrPreprocessing,
    /// Result presentation
    pub output: OutputSettings,
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Tesseract executable (name on PATH or absolute path)
    pub tesseract_cmd: String,
    /// Language hint for the first OCR attempt (e.g. "fra"); retried without it on failure
    pub language: Option<String>,
    /// Tesseract page segmentation mode
    pub page_segmentation: Option<u32>,
    /// Upper bound for one OCR call, in seconds
    pub timeout_secs: u64,
}

impl OcrSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            tesseract_cmd: default_tesseract_cmd(),
            language: Some("fra".to_string()),
            page_segmentation: None,
            timeout_secs: 60,
        }
    }
}

fn default_tesseract_cmd() -> String {
    if cfg!(windows) {
        r"C:\Program Files\Tesseract-OCR\tesseract.exe".to_string()
    } else {
        "tesseract".to_string()
    }
}

/// Preprocessing filters to help OCR on photographed displays
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrPreprocessing {
    /// Master switch
    pub enabled: bool,
    /// Convert to grayscale
    pub grayscale: bool,
    /// Contrast factor (1.0 = unchanged, 2.0 = double)
    pub contrast: f32,
    /// Sharpening strength (0.0 = none)
    pub sharpen: f32,
    /// Invert colors (light text on dark screens)
    pub invert: bool,
    /// Integer upscale factor (1 = unchanged)
    pub scale: u32,
}

impl Default for OcrPreprocessing {
    fn default() -> Self {
        Self {
            enabled: false,
            grayscale: true,
            contrast: 1.0,
            sharpen: 0.0,
            invert: false,
            scale: 1,
        }
    }
}

/// Output format of the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Result presentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub format: OutputFormat,
    /// Decimal places for distances and heights
    pub precision: usize,
    /// Print raw OCR text with every result
    pub show_raw_text: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            precision: 3,
            show_raw_text: false,
        }
    }
}

/// Get the configuration directory
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "geodelta", "geodelta")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Default location of `config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check OCR defaults
        assert_eq!(config.ocr.language.as_deref(), Some("fra"));
        assert!(config.ocr.page_segmentation.is_none());
        assert_eq!(config.ocr.timeout(), Duration::from_secs(60));
        assert!(!config.ocr.tesseract_cmd.is_empty());

        // Check preprocessing defaults
        assert!(!config.preprocessing.enabled);
        assert!((config.preprocessing.contrast - 1.0).abs() < 0.01);
        assert_eq!(config.preprocessing.scale, 1);

        // Check output defaults
        assert_eq!(config.output.format, OutputFormat::Text);
        assert_eq!(config.output.precision, 3);
        assert!(!config.output.show_raw_text);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.ocr.language, parsed.ocr.language);
        assert_eq!(config.ocr.timeout_secs, parsed.ocr.timeout_secs);
        assert_eq!(config.preprocessing.enabled, parsed.preprocessing.enabled);
        assert_eq!(config.output.precision, parsed.output.precision);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [ocr]
            language = "eng"

            [output]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.ocr.language.as_deref(), Some("eng"));
        assert_eq!(parsed.ocr.timeout_secs, 60);
        assert_eq!(parsed.output.format, OutputFormat::Json);
        assert_eq!(parsed.output.precision, 3);
        assert!(!parsed.preprocessing.enabled);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.ocr.tesseract_cmd = "/opt/tesseract/bin/tesseract".to_string();
        config.preprocessing.enabled = true;
        config.preprocessing.scale = 2;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.ocr.tesseract_cmd, "/opt/tesseract/bin/tesseract");
        assert!(loaded.preprocessing.enabled);
        assert_eq!(loaded.preprocessing.scale, 2);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
