//! PDF extraction using lopdf.
//!
//! Text runs and ruling lines are read per page, ruled tables are split out
//! of each page's runs, the remaining runs are assembled into headings, paragraphs and code
//! blocks, and embedded images are appended at the end.

pub mod assemble;
pub mod images;
pub mod layout;
pub mod table_detector;

pub use assemble::{assemble, PageContent};
pub use layout::PageLayout;
pub use table_detector::{Ruling, TableDetector, TableDetectorConfig};

use std::path::Path;

use lopdf::Document as LopdfDocument;

use crate::error::{Error, Result};
use crate::heading::FontSizeHistogram;
use crate::model::StructuralNode;

use super::{read_source, ExtractContext, Extractor};

/// PDF extractor.
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    detect_tables: bool,
    extract_images: bool,
    table_detector: TableDetector,
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self {
            detect_tables: true,
            extract_images: true,
            table_detector: TableDetector::new(),
        }
    }
}

impl PdfExtractor {
    /// Create an extractor with tables and images enabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable table detection.
    pub fn with_tables(mut self, enabled: bool) -> Self {
        self.detect_tables = enabled;
        self
    }

    /// Enable or disable image extraction.
    pub fn with_images(mut self, enabled: bool) -> Self {
        self.extract_images = enabled;
        self
    }

    /// Use a custom table detector configuration.
    pub fn with_table_config(mut self, config: TableDetectorConfig) -> Self {
        self.table_detector = TableDetector::with_config(config);
        self
    }

    /// Extract nodes from an in-memory PDF.
    pub fn extract_bytes(
        &self,
        data: &[u8],
        ctx: &mut ExtractContext,
    ) -> Result<Vec<StructuralNode>> {
        let doc = LopdfDocument::load_mem(data)?;
        if doc.is_encrypted() {
            log::warn!("PDF is encrypted; text may be unreadable");
        }
        Ok(self.extract_document(&doc, ctx))
    }

    fn extract_document(
        &self,
        doc: &LopdfDocument,
        ctx: &mut ExtractContext,
    ) -> Vec<StructuralNode> {
        let mut pages = Vec::new();
        for (index, (page_num, page_id)) in doc.get_pages().into_iter().enumerate() {
            let page = match layout::extract_page(doc, page_id, index as u32) {
                Ok(page) => page,
                Err(e) => {
                    ctx.partial(format!("page {}", page_num), e);
                    PageLayout::default()
                }
            };
            log::debug!(
                "Page {}: {} text runs, {} rulings",
                page_num,
                page.runs.len(),
                page.rulings.len()
            );
            pages.push(page);
        }

        let histogram = FontSizeHistogram::from_sizes(
            pages
                .iter()
                .flat_map(|page| page.runs.iter())
                .map(|run| run.font_size),
        );
        log::debug!("Font sizes: {:?}", histogram.sizes());

        let pages = pages
            .into_iter()
            .map(|page| {
                if self.detect_tables {
                    let (tables, runs) = self.table_detector.split(page.runs, &page.rulings);
                    PageContent { runs, tables }
                } else {
                    PageContent {
                        runs: page.runs,
                        tables: Vec::new(),
                    }
                }
            })
            .collect();

        let mut nodes = assemble(pages, &histogram);
        if self.extract_images {
            nodes.extend(images::extract_images(doc, ctx));
        }
        nodes
    }
}

impl Extractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extract(&self, path: &Path, ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>> {
        let data = read_source(path)?;
        self.extract_bytes(&data, ctx).map_err(|e| match e {
            Error::SourceRead(cause) => Error::source_read(path, cause),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_source_read_error() {
        let mut ctx = ExtractContext::default();
        let err = PdfExtractor::new()
            .extract_bytes(b"not a pdf at all", &mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::SourceRead(_)));
    }
}
