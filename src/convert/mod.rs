//! Conversion entry points: format dispatch, rendering and output files.
//!
//! A [`Converter`] owns one extractor per [`SourceFormat`] and is shareable
//! across threads. Every call builds its own [`ExtractContext`], so media
//! counters never leak between conversions.
//!
//! # Example
//!
//! ```no_run
//! use undoc::convert::{ConvertOptions, Converter};
//! use std::path::Path;
//!
//! fn main() -> undoc::Result<()> {
//!     let converter = Converter::new(ConvertOptions::new().with_media_root("out"));
//!     let outcome = converter.convert(Path::new("report.docx"), Path::new("out/report.md"))?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::media::MediaStore;
use crate::model::StructuralNode;
use crate::ocr::{OcrConfig, OcrEngine};
use crate::parser::{
    DocExtractor, DocxExtractor, ExtractContext, Extractor, HtmlExtractor, ImageExtractor,
    PdfExtractor, SheetExtractor, TextExtractor,
};
use crate::render::{to_json, to_markdown, JsonFormat, RenderOptions};

/// Input formats with a registered extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// Portable Document Format
    Pdf,
    /// Word 97-2003 binary document
    Doc,
    /// Office Open XML word-processing document
    Docx,
    /// Plain text
    Text,
    /// Excel workbook, binary or XML
    Spreadsheet,
    /// HTML page
    Html,
    /// Raster image, read through OCR
    Image,
}

impl SourceFormat {
    /// Every supported format.
    pub const ALL: [SourceFormat; 7] = [
        SourceFormat::Pdf,
        SourceFormat::Doc,
        SourceFormat::Docx,
        SourceFormat::Text,
        SourceFormat::Spreadsheet,
        SourceFormat::Html,
        SourceFormat::Image,
    ];

    /// Look up a format by file extension, ignoring case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    /// Look up a format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Lowercase extensions handled by this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceFormat::Pdf => &["pdf"],
            SourceFormat::Doc => &["doc"],
            SourceFormat::Docx => &["docx"],
            SourceFormat::Text => &["txt"],
            SourceFormat::Spreadsheet => &["xls", "xlsx"],
            SourceFormat::Html => &["html", "htm"],
            SourceFormat::Image => &["jpg", "jpeg", "png", "gif"],
        }
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "PDF",
            SourceFormat::Doc => "Word 97-2003",
            SourceFormat::Docx => "Word",
            SourceFormat::Text => "Plain text",
            SourceFormat::Spreadsheet => "Excel",
            SourceFormat::Html => "HTML",
            SourceFormat::Image => "Image (OCR)",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Output format for conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Markdown format
    #[default]
    Markdown,

    /// JSON node sequence
    Json,
}

impl OutputFormat {
    /// File extension of written outputs.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

/// Options for document conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Directory receiving `images/`, `drawings/` and `equations/`
    pub media_root: PathBuf,

    /// Write a heading for each sheet of a workbook
    pub include_sheet_names: bool,

    /// OCR engine configuration for image inputs
    pub ocr: OcrConfig,

    /// Output format
    pub output_format: OutputFormat,

    /// Detect tables from PDF text positions
    pub detect_pdf_tables: bool,

    /// Write embedded PDF images to the media root
    pub extract_images: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("."),
            include_sheet_names: true,
            ocr: OcrConfig::default(),
            output_format: OutputFormat::Markdown,
            detect_pdf_tables: true,
            extract_images: true,
        }
    }
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the media root directory.
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = root.into();
        self
    }

    /// Enable or disable sheet-name headings.
    pub fn with_sheet_names(mut self, enabled: bool) -> Self {
        self.include_sheet_names = enabled;
        self
    }

    /// Set the OCR configuration.
    pub fn with_ocr(mut self, ocr: OcrConfig) -> Self {
        self.ocr = ocr;
        self
    }

    /// Set output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Enable or disable PDF table detection.
    pub fn with_pdf_tables(mut self, enabled: bool) -> Self {
        self.detect_pdf_tables = enabled;
        self
    }

    /// Enable or disable PDF image extraction.
    pub fn with_images(mut self, enabled: bool) -> Self {
        self.extract_images = enabled;
        self
    }
}

/// Summary of one successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertReport {
    /// Detected input format
    pub format: SourceFormat,
    /// File the output was written to
    pub output: PathBuf,
    /// Number of structural nodes extracted
    pub node_count: usize,
    /// Media files written alongside the output
    pub media_files: Vec<PathBuf>,
    /// Elements that failed without aborting the conversion
    pub warnings: Vec<String>,
}

/// Result of converting one input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvertOutcome {
    /// The output file was written
    Converted(ConvertReport),
    /// The extension has no extractor; nothing was written
    Skipped {
        /// The skipped input
        input: PathBuf,
    },
}

impl ConvertOutcome {
    /// The report, if the input was converted.
    pub fn report(&self) -> Option<&ConvertReport> {
        match self {
            ConvertOutcome::Converted(report) => Some(report),
            ConvertOutcome::Skipped { .. } => None,
        }
    }

    /// Whether the input was skipped.
    pub fn is_skipped(&self) -> bool {
        matches!(self, ConvertOutcome::Skipped { .. })
    }
}

/// Markdown file written next to `input`: same base name, `.md` extension.
pub fn sidecar_path(input: &Path) -> PathBuf {
    input.with_extension(OutputFormat::Markdown.extension())
}

/// Format dispatcher holding one extractor per source format.
#[derive(Debug, Clone)]
pub struct Converter {
    options: ConvertOptions,
    pdf: PdfExtractor,
    doc: DocExtractor,
    docx: DocxExtractor,
    text: TextExtractor,
    sheet: SheetExtractor,
    html: HtmlExtractor,
    image: ImageExtractor,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(ConvertOptions::default())
    }
}

impl Converter {
    /// Create a converter; image inputs use Tesseract configured by `options.ocr`.
    pub fn new(options: ConvertOptions) -> Self {
        let image = ImageExtractor::with_config(options.ocr.clone());
        Self::build(options, image)
    }

    /// Create a converter with a custom OCR engine.
    pub fn with_ocr_engine(options: ConvertOptions, engine: Arc<dyn OcrEngine>) -> Self {
        Self::build(options, ImageExtractor::new(engine))
    }

    fn build(options: ConvertOptions, image: ImageExtractor) -> Self {
        Self {
            pdf: PdfExtractor::new()
                .with_tables(options.detect_pdf_tables)
                .with_images(options.extract_images),
            doc: DocExtractor::new(),
            docx: DocxExtractor::new(),
            text: TextExtractor::new(),
            sheet: SheetExtractor::new().with_sheet_names(options.include_sheet_names),
            html: HtmlExtractor::new(),
            image,
            options,
        }
    }

    /// Conversion options.
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// The extractor registered for `format`.
    pub fn extractor(&self, format: SourceFormat) -> &dyn Extractor {
        match format {
            SourceFormat::Pdf => &self.pdf,
            SourceFormat::Doc => &self.doc,
            SourceFormat::Docx => &self.docx,
            SourceFormat::Text => &self.text,
            SourceFormat::Spreadsheet => &self.sheet,
            SourceFormat::Html => &self.html,
            SourceFormat::Image => &self.image,
        }
    }

    /// The image extractor, for multi-image reports.
    pub fn image_extractor(&self) -> &ImageExtractor {
        &self.image
    }

    /// Extract the node sequence of `input` without writing an output file.
    pub fn extract(&self, input: &Path, ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>> {
        let format = SourceFormat::from_path(input)
            .ok_or_else(|| Error::UnsupportedFormat(input.display().to_string()))?;
        let extractor = self.extractor(format);
        log::debug!("Extracting {} with {}", input.display(), extractor.name());
        extractor.extract(input, ctx)
    }

    /// Serialize nodes in the configured output format.
    pub fn render(&self, format: SourceFormat, nodes: &[StructuralNode]) -> Result<String> {
        match self.options.output_format {
            OutputFormat::Json => to_json(nodes, JsonFormat::Pretty),
            OutputFormat::Markdown => {
                let options = RenderOptions::new()
                    .with_collapse_blank_lines(format == SourceFormat::Html);
                Ok(to_markdown(nodes, &options))
            }
        }
    }

    /// Convert `input` into `output`, writing media under the media root.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<ConvertOutcome> {
        let media = MediaStore::new(&self.options.media_root);
        self.convert_with_media(input, output, media)
    }

    fn convert_with_media(
        &self,
        input: &Path,
        output: &Path,
        media: MediaStore,
    ) -> Result<ConvertOutcome> {
        let Some(format) = SourceFormat::from_path(input) else {
            log::info!("Skipping {}: unsupported extension", input.display());
            return Ok(ConvertOutcome::Skipped {
                input: input.to_path_buf(),
            });
        };

        let mut ctx = ExtractContext::new(media);
        let nodes = self.extractor(format).extract(input, &mut ctx)?;
        let content = self.render(format, &nodes)?;

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(output, content)?;

        let (media_files, warnings) = ctx.into_parts();
        log::info!(
            "Converted {} ({}) -> {}: {} nodes, {} media files, {} warnings",
            input.display(),
            format,
            output.display(),
            nodes.len(),
            media_files.len(),
            warnings.len()
        );

        Ok(ConvertOutcome::Converted(ConvertReport {
            format,
            output: output.to_path_buf(),
            node_count: nodes.len(),
            media_files,
            warnings,
        }))
    }

    /// Output path next to `input` for the configured output format.
    pub fn output_path(&self, input: &Path) -> PathBuf {
        input.with_extension(self.options.output_format.extension())
    }

    /// Convert `input` to its sibling output file.
    ///
    /// Never fails: errors are logged and yield `None`, as do skipped inputs.
    pub fn convert_sidecar(&self, input: &Path) -> Option<PathBuf> {
        let output = self.output_path(input);
        match self.convert(input, &output) {
            Ok(ConvertOutcome::Converted(report)) => Some(report.output),
            Ok(ConvertOutcome::Skipped { .. }) => None,
            Err(e) => {
                log::error!("Failed to convert {}: {}", input.display(), e);
                None
            }
        }
    }

    /// Convert many inputs in parallel, each to its sibling output file.
    ///
    /// Each input writes its media under `<stem>_media/` next to the input,
    /// and the links in its output carry that prefix.
    pub fn convert_batch<P>(&self, inputs: &[P]) -> Vec<(PathBuf, Result<ConvertOutcome>)>
    where
        P: AsRef<Path> + Sync,
    {
        log::info!("Converting {} files", inputs.len());
        inputs
            .par_iter()
            .map(|input| {
                let input = input.as_ref();
                let output = self.output_path(input);
                let result = self.convert_with_media(input, &output, batch_media(input));
                (input.to_path_buf(), result)
            })
            .collect()
    }
}

/// Media store for one batch input: `<dir>/<stem>_media/`.
fn batch_media(input: &Path) -> MediaStore {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir_name = format!("{}_media", stem);
    let root = match input.parent() {
        Some(parent) => parent.join(&dir_name),
        None => PathBuf::from(&dir_name),
    };
    MediaStore::new(root).with_link_prefix(format!("{}/", dir_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("PDF"), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::from_extension("htm"), Some(SourceFormat::Html));
        assert_eq!(
            SourceFormat::from_extension("XLS"),
            Some(SourceFormat::Spreadsheet)
        );
        assert_eq!(SourceFormat::from_extension("jpeg"), Some(SourceFormat::Image));
        assert_eq!(SourceFormat::from_extension("pptx"), None);
        assert_eq!(SourceFormat::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_every_extension_maps_back() {
        for format in SourceFormat::ALL {
            for ext in format.extensions() {
                assert_eq!(SourceFormat::from_extension(ext), Some(format));
            }
        }
    }

    #[test]
    fn test_options_builder() {
        let options = ConvertOptions::new()
            .with_media_root("/tmp/media")
            .with_sheet_names(false)
            .with_format(OutputFormat::Json)
            .with_pdf_tables(false)
            .with_images(false)
            .with_ocr(OcrConfig::new().with_language("eng"));

        assert_eq!(options.media_root, PathBuf::from("/tmp/media"));
        assert!(!options.include_sheet_names);
        assert_eq!(options.output_format, OutputFormat::Json);
        assert!(!options.detect_pdf_tables);
        assert!(!options.extract_images);
        assert_eq!(options.ocr.language, "eng");
    }

    #[test]
    fn test_converter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Converter>();
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/data/report.final.docx")),
            PathBuf::from("/data/report.final.md")
        );
        let converter = Converter::new(ConvertOptions::new().with_format(OutputFormat::Json));
        assert_eq!(
            converter.output_path(Path::new("a/b.txt")),
            PathBuf::from("a/b.json")
        );
    }

    #[test]
    fn test_unknown_extension_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("slides.pptx");
        fs::write(&input, b"whatever").unwrap();
        let output = dir.path().join("slides.md");

        let outcome = Converter::default().convert(&input, &output).unwrap();
        assert!(outcome.is_skipped());
        assert!(!output.exists());
    }

    #[test]
    fn test_html_output_is_collapsed() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.html");
        fs::write(&input, "<h2>Title</h2><p>Hello <b>world</b></p>").unwrap();
        let output = dir.path().join("out/page.md");

        let converter = Converter::new(ConvertOptions::new().with_media_root(dir.path()));
        let outcome = converter.convert(&input, &output).unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.format, SourceFormat::Html);
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "## Title\n\nHello **world**\n\n"
        );
    }

    #[test]
    fn test_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        fs::write(&input, "1. Intro\nbody").unwrap();

        let converter = Converter::new(ConvertOptions::new().with_format(OutputFormat::Json));
        let output = converter.convert_sidecar(&input).unwrap();
        assert_eq!(output, dir.path().join("notes.json"));

        let nodes: Vec<StructuralNode> =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(nodes[0], StructuralNode::heading(1, "Intro"));
    }

    #[test]
    fn test_convert_sidecar_never_fails() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::default();
        assert_eq!(converter.convert_sidecar(&dir.path().join("missing.pdf")), None);
        assert_eq!(converter.convert_sidecar(&dir.path().join("deck.pptx")), None);
    }

    #[test]
    fn test_extract_unsupported() {
        let err = Converter::default()
            .extract(Path::new("a.odt"), &mut ExtractContext::default())
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }

    #[test]
    fn test_batch_media_root() {
        let media = batch_media(Path::new("/data/report.docx"));
        assert_eq!(media.root(), Path::new("/data/report_media"));
        assert_eq!(media.dir_link("images"), "report_media/images/");
    }
}
