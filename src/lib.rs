//! # undoc
//!
//! Normalize heterogeneous documents into Markdown.
//!
//! PDF, Word (DOC, DOCX), Excel (XLS, XLSX), HTML, plain text and raster
//! images are read into one ordered sequence of structural nodes, which is
//! then serialized as Markdown (or JSON). Embedded images, drawings and
//! equations are written to a media directory and linked from the output.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! fn main() -> undoc::Result<()> {
//!     let outcome = undoc::convert(Path::new("report.pdf"), Path::new("report.md"))?;
//!     if let Some(report) = outcome.report() {
//!         println!("{} nodes, {} warnings", report.node_count, report.warnings.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Many inputs**: PDF, DOC, DOCX, XLS, XLSX, HTML, TXT, JPG/PNG/GIF
//! - **Structure preservation**: headings, paragraphs, tables, lists, code
//! - **Media extraction**: images, drawings and equations beside the output
//! - **Partial failure tolerance**: a broken page or sheet becomes a warning
//! - **Parallel batches**: uses Rayon to convert many files at once

pub mod convert;
pub mod error;
pub mod heading;
pub mod media;
pub mod model;
pub mod ocr;
pub mod parser;
pub mod render;
pub mod style;

// Re-export commonly used types
pub use convert::{
    sidecar_path, ConvertOptions, ConvertOutcome, ConvertReport, Converter, OutputFormat,
    SourceFormat,
};
pub use error::{Error, Result};
pub use media::{MediaStore, NamingContext};
pub use model::{Inline, ListItem, PlaceholderKind, StructuralNode, StyleFlags, TableGrid};
pub use ocr::{OcrConfig, OcrEngine, TesseractCli};
pub use parser::{ExtractContext, Extractor};
pub use render::{JsonFormat, RenderOptions};

use std::path::Path;

/// Convert one file with default options.
///
/// Media files are written relative to the working directory. Inputs with
/// an unsupported extension yield [`ConvertOutcome::Skipped`].
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// let outcome = undoc::convert(Path::new("table.xlsx"), Path::new("table.md")).unwrap();
/// assert!(!outcome.is_skipped());
/// ```
pub fn convert(input: &Path, output: &Path) -> Result<ConvertOutcome> {
    Converter::default().convert(input, output)
}

/// Convert one file to a Markdown string.
///
/// Media files are written under `media_root`.
pub fn to_markdown_string(input: &Path, media_root: &Path) -> Result<String> {
    let converter = Converter::new(ConvertOptions::new().with_media_root(media_root));
    let format = SourceFormat::from_path(input)
        .ok_or_else(|| Error::UnsupportedFormat(input.display().to_string()))?;
    let mut ctx = ExtractContext::new(MediaStore::new(media_root));
    let nodes = converter.extractor(format).extract(input, &mut ctx)?;
    converter.render(format, &nodes)
}
