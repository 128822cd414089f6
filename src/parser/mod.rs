//! Per-format extractors.
//!
//! Every extractor implements [`Extractor`]: read one source file and return
//! the ordered structural nodes it contains. Media files are written through
//! the [`ExtractContext`] handed in by the dispatcher.

pub mod html;
pub mod image;
pub mod office;
pub mod pdf;
pub mod sheet;
pub mod text;

pub use html::HtmlExtractor;
pub use image::ImageExtractor;
pub use office::{DocExtractor, DocxExtractor};
pub use pdf::PdfExtractor;
pub use sheet::SheetExtractor;
pub use text::TextExtractor;

use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::media::{MediaStore, NamingContext, DRAWING_DIR, EQUATION_DIR, IMAGE_DIR};
use crate::model::StructuralNode;

/// One source format's extraction capability.
pub trait Extractor: Send + Sync {
    /// Extractor name for logging.
    fn name(&self) -> &str;

    /// Extract the structural nodes of the file at `path`.
    fn extract(&self, path: &Path, ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>>;
}

/// Per-call state threaded through one extraction.
#[derive(Debug)]
pub struct ExtractContext {
    /// Media file name counters
    pub naming: NamingContext,
    media: MediaStore,
    written: Vec<PathBuf>,
    warnings: Vec<String>,
}

impl ExtractContext {
    /// Create a context writing media into `media`.
    pub fn new(media: MediaStore) -> Self {
        Self {
            naming: NamingContext::new(),
            media,
            written: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// The media store.
    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Write an image and return its Markdown link.
    pub fn save_image(&mut self, ext: &str, bytes: &[u8]) -> Result<String> {
        let name = self.naming.next_image_name(ext);
        self.save(IMAGE_DIR, &name, bytes)
    }

    /// Write a drawing and return its Markdown link.
    pub fn save_drawing(&mut self, ext: &str, bytes: &[u8]) -> Result<String> {
        let name = self.naming.next_drawing_name(ext);
        self.save(DRAWING_DIR, &name, bytes)
    }

    /// Write an equation and return its Markdown link.
    pub fn save_equation(&mut self, ext: &str, bytes: &[u8]) -> Result<String> {
        let name = self.naming.next_equation_name(ext);
        self.save(EQUATION_DIR, &name, bytes)
    }

    fn save(&mut self, dir: &str, name: &str, bytes: &[u8]) -> Result<String> {
        let (path, link) = self.media.write(dir, name, bytes)?;
        self.written.push(path);
        Ok(link)
    }

    /// Record a failed sub-element; the rest of the document still converts.
    pub fn partial(&mut self, what: impl Display, cause: impl Display) {
        let err = Error::PartialExtraction(format!("{}: {}", what, cause));
        log::warn!("{}", err);
        self.warnings.push(err.to_string());
    }

    /// Media files written so far.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Partial failures recorded so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Split into written files and warnings.
    pub fn into_parts(self) -> (Vec<PathBuf>, Vec<String>) {
        (self.written, self.warnings)
    }
}

impl Default for ExtractContext {
    fn default() -> Self {
        Self::new(MediaStore::default())
    }
}

/// Read a whole source file, mapping failures to [`Error::SourceRead`].
pub(crate) fn read_source(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::source_read(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_is_recorded_not_raised() {
        let mut ctx = ExtractContext::default();
        ctx.partial("page 3", "bad content stream");
        assert_eq!(ctx.warnings().len(), 1);
        assert!(ctx.warnings()[0].contains("page 3: bad content stream"));
    }

    #[test]
    fn test_save_image_uses_counter() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ExtractContext::new(MediaStore::new(dir.path()));
        assert_eq!(ctx.save_image("png", b"a").unwrap(), "images/image_0.png");
        assert_eq!(ctx.save_image("gif", b"b").unwrap(), "images/image_1.gif");
        assert_eq!(ctx.save_equation("txt", b"x").unwrap(), "equations/equation_0.txt");
        assert_eq!(ctx.written().len(), 3);
        assert!(dir.path().join("images/image_1.gif").exists());
    }

    #[test]
    fn test_read_source_missing() {
        let err = read_source(Path::new("/nonexistent/undoc/input.txt")).unwrap_err();
        assert!(matches!(err, Error::SourceRead(_)));
    }
}
