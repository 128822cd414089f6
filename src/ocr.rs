//! Optical character recognition engines.
//!
//! The image extractor receives an [`OcrEngine`] at construction time. The
//! default engine shells out to the `tesseract` command line tool.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;

use crate::error::{Error, Result};

/// Default language packs: simplified Chinese plus English.
pub const DEFAULT_LANGUAGE: &str = "chi_sim+eng";

/// OCR engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    /// Language-pack identifier (e.g., `"chi_sim+eng"`)
    pub language: String,
    /// Directory holding the trained language data
    pub data_path: Option<PathBuf>,
    /// Engine executable
    pub binary: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            data_path: None,
            binary: PathBuf::from("tesseract"),
        }
    }
}

impl OcrConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language packs.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the language data directory.
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    /// Set the engine executable.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

/// Recognizes text in a decoded bitmap.
pub trait OcrEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Return the raw recognized text.
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Tesseract invoked through its command line interface.
#[derive(Debug, Clone, Default)]
pub struct TesseractCli {
    config: OcrConfig,
}

impl TesseractCli {
    /// Create an engine with the given configuration.
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Engine configuration.
    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Check whether the executable can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run(&self, image_path: &Path) -> Result<String> {
        let mut cmd = Command::new(&self.config.binary);
        cmd.arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language]);
        if let Some(ref data_path) = self.config.data_path {
            cmd.arg("--tessdata-dir").arg(data_path);
        }

        log::debug!("Running OCR: {:?}", cmd);
        let output = cmd.output().map_err(|e| {
            Error::Ocr(format!(
                "failed to start {}: {}",
                self.config.binary.display(),
                e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr(format!(
                "{} exited with {}: {}",
                self.config.binary.display(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let scratch = tempfile::Builder::new()
            .prefix("undoc-ocr-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(scratch.path(), image::ImageFormat::Png)
            .map_err(|e| Error::Ocr(format!("cannot stage bitmap: {}", e)))?;
        self.run(scratch.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OcrConfig::default();
        assert_eq!(config.language, "chi_sim+eng");
        assert_eq!(config.data_path, None);
        assert_eq!(config.binary, PathBuf::from("tesseract"));
    }

    #[test]
    fn test_config_builder() {
        let config = OcrConfig::new()
            .with_language("eng")
            .with_data_path("/opt/tessdata")
            .with_binary("/usr/local/bin/tesseract");
        assert_eq!(config.language, "eng");
        assert_eq!(config.data_path, Some(PathBuf::from("/opt/tessdata")));
        assert_eq!(TesseractCli::new(config).config().language, "eng");
    }

    #[test]
    fn test_missing_binary_is_ocr_error() {
        let engine = TesseractCli::new(
            OcrConfig::new().with_binary("/nonexistent/undoc-tesseract-binary"),
        );
        assert!(!engine.is_available());

        let image = DynamicImage::new_rgb8(4, 4);
        let err = engine.recognize(&image).unwrap_err();
        assert!(matches!(err, Error::Ocr(_)));
    }
}
