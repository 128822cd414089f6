//! Error types for undoc library.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias for undoc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while converting a document.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when writing output or media files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file extension has no registered extractor.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The input is missing, unreadable or structurally corrupt.
    #[error("Cannot read source: {0}")]
    SourceRead(String),

    /// One element of a document (page, image, table, sheet) failed.
    ///
    /// Never returned from a conversion; recorded as a warning instead.
    #[error("Partial extraction failure: {0}")]
    PartialExtraction(String),

    /// The OCR engine could not be invoked or reported failure.
    #[error("OCR engine error: {0}")]
    Ocr(String),

    /// Error while serializing the node sequence.
    #[error("Rendering error: {0}")]
    Render(String),
}

impl Error {
    /// Build a [`Error::SourceRead`] for a path and an underlying cause.
    pub fn source_read(path: &Path, cause: impl std::fmt::Display) -> Self {
        Error::SourceRead(format!("{}: {}", path.display(), cause))
    }

    /// Whether this error aborts the conversion of a whole file.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::PartialExtraction(_) | Error::UnsupportedFormat(_)
        )
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::SourceRead(e.to_string()),
            _ => Error::SourceRead(format!("PDF: {}", err)),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::SourceRead(format!("container: {}", err))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::SourceRead(format!("XML: {}", err))
    }
}

impl From<calamine::Error> for Error {
    fn from(err: calamine::Error) -> Self {
        Error::SourceRead(format!("workbook: {}", err))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::SourceRead(format!("image: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Render(format!("JSON serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedFormat("rtf".to_string());
        assert_eq!(err.to_string(), "Unsupported format: rtf");

        let err = Error::source_read(Path::new("a.pdf"), "missing");
        assert_eq!(err.to_string(), "Cannot read source: a.pdf: missing");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_fatality() {
        assert!(Error::Ocr("crashed".into()).is_fatal());
        assert!(Error::SourceRead("x".into()).is_fatal());
        assert!(!Error::PartialExtraction("page 2".into()).is_fatal());
        assert!(!Error::UnsupportedFormat("bin".into()).is_fatal());
    }
}
