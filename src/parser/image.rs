//! Image text extraction through an injected OCR engine.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::model::{Inline, ListItem, StructuralNode, StyleFlags};
use crate::ocr::{OcrConfig, OcrEngine, TesseractCli};

use super::{read_source, ExtractContext, Extractor};

/// Paragraph written when the engine finds no text.
pub const NO_TEXT_MESSAGE: &str = "No text could be extracted from the image.";

/// Image extractor: OCR plus light structuring of the recognized text.
#[derive(Clone)]
pub struct ImageExtractor {
    engine: Arc<dyn OcrEngine>,
    list_item: Regex,
    title: Regex,
}

impl fmt::Debug for ImageExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageExtractor")
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl Default for ImageExtractor {
    fn default() -> Self {
        Self::with_config(OcrConfig::default())
    }
}

impl ImageExtractor {
    /// Create an extractor using the given engine.
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            list_item: Regex::new(r"^\d+\..+$").unwrap(),
            title: Regex::new(r"^[A-Z0-9\s:]+$").unwrap(),
        }
    }

    /// Create an extractor running Tesseract with `config`.
    pub fn with_config(config: OcrConfig) -> Self {
        Self::new(Arc::new(TesseractCli::new(config)))
    }

    /// Recognize the text of one image file.
    pub fn recognize_file(&self, path: &Path) -> Result<String> {
        let data = read_source(path)?;
        let image = image::load_from_memory(&data).map_err(|e| Error::source_read(path, e))?;
        log::debug!(
            "OCR {} ({}x{}) with {}",
            path.display(),
            image.width(),
            image.height(),
            self.engine.name()
        );
        self.engine.recognize(&image)
    }

    /// Turn raw OCR output into list items, bold titles and paragraphs.
    pub fn structure_text(&self, text: &str) -> Vec<StructuralNode> {
        if text.trim().is_empty() {
            return vec![StructuralNode::paragraph(NO_TEXT_MESSAGE)];
        }

        let mut nodes = Vec::new();
        for block in text.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
            if self.list_item.is_match(block) {
                let item = ListItem::new("- ", vec![Inline::text(block)]);
                // consecutive items share one list
                if let Some(StructuralNode::List { items }) = nodes.last_mut() {
                    items.push(item);
                } else {
                    nodes.push(StructuralNode::List { items: vec![item] });
                }
            } else if self.title.is_match(block) || block.ends_with(':') {
                nodes.push(StructuralNode::Paragraph {
                    spans: vec![Inline::styled_text(block, StyleFlags::bold())],
                });
            } else {
                nodes.push(StructuralNode::paragraph(block));
            }
        }
        nodes
    }

    /// Build one report covering several images.
    pub fn extract_many<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<StructuralNode>> {
        let mut nodes = vec![StructuralNode::heading(1, "Image text extraction results")];

        for (i, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let label = format!("Image {}", i + 1);
            let text = self.recognize_file(path)?;

            nodes.push(StructuralNode::heading(2, label.as_str()));
            nodes.push(StructuralNode::image(path.display().to_string(), label));
            nodes.push(StructuralNode::heading(3, "Extracted text"));
            nodes.extend(self.structure_text(&text));
            nodes.push(StructuralNode::Rule);
        }

        log::info!("OCR report covers {} images", paths.len());
        Ok(nodes)
    }
}

impl Extractor for ImageExtractor {
    fn name(&self) -> &str {
        "image"
    }

    fn extract(&self, path: &Path, _ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>> {
        let text = self.recognize_file(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut nodes = vec![
            StructuralNode::heading(1, file_name.as_str()),
            StructuralNode::image(path.display().to_string(), file_name),
            StructuralNode::heading(2, "Extracted text"),
        ];
        nodes.extend(self.structure_text(&text));
        Ok(nodes)
    }
}
