//! Word processing documents: DOCX (Office Open XML) and DOC (Word 97-2003).
//!
//! Both formats are read into an [`OfficeContent`] holding the body
//! paragraphs, the tables, the embedded media and counts of objects that are
//! only noted. [`OfficeContent::into_nodes`] writes the media and emits nodes
//! in a fixed order: body, tables, images, drawing placeholder, equations.

mod cfb;
mod doc;
mod docx;

pub use doc::DocExtractor;
pub use docx::DocxExtractor;

use crate::model::{Inline, PlaceholderKind, StructuralNode, StyleFlags, TableGrid};
use crate::media::{DRAWING_DIR, EQUATION_DIR};

use super::ExtractContext;

/// Alt text of images embedded in word processing documents.
const IMAGE_ALT: &str = "image";

/// Runs of one paragraph, merged while their roles match.
#[derive(Debug, Default)]
pub(crate) struct ParagraphBuilder {
    spans: Vec<Inline>,
}

impl ParagraphBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append run text with its roles.
    pub(crate) fn push_run(&mut self, text: &str, roles: StyleFlags) {
        if text.is_empty() {
            return;
        }
        if let Some(Inline::Text(last)) = self.spans.last_mut() {
            if last.roles == roles {
                last.text.push_str(text);
                return;
            }
        }
        self.spans.push(Inline::styled_text(text, roles));
    }

    pub(crate) fn line_break(&mut self) {
        self.spans.push(Inline::LineBreak);
    }

    /// Paragraph text without markup.
    pub(crate) fn plain_text(&self) -> String {
        self.spans.iter().map(Inline::plain_text).collect()
    }

    pub(crate) fn is_blank(&self) -> bool {
        self.plain_text().trim().is_empty()
    }

    /// Finish as a heading (level 1-6) or a paragraph; `None` when empty.
    pub(crate) fn finish(self, heading_level: u8) -> Option<StructuralNode> {
        if self.is_blank() {
            return None;
        }
        if heading_level > 0 {
            let text = self.plain_text().trim().to_string();
            return Some(StructuralNode::heading(heading_level, text));
        }
        Some(StructuralNode::Paragraph { spans: self.spans })
    }
}

/// Everything read from a word processing document before media is written.
#[derive(Debug, Default)]
pub(crate) struct OfficeContent {
    /// Headings and paragraphs in document order
    pub body: Vec<StructuralNode>,
    /// Top-level tables in document order
    pub tables: Vec<TableGrid>,
    /// Embedded pictures as (extension, bytes)
    pub images: Vec<(String, Vec<u8>)>,
    /// Shapes, charts and other drawn objects
    pub drawing_count: u32,
    /// Chart parts copied alongside the drawing placeholder
    pub drawing_parts: Vec<(String, Vec<u8>)>,
    /// Linear text of each equation
    pub equations: Vec<String>,
}

impl OfficeContent {
    /// Write media through `ctx` and emit the node sequence.
    pub(crate) fn into_nodes(self, ctx: &mut ExtractContext) -> Vec<StructuralNode> {
        let mut nodes = self.body;
        nodes.extend(self.tables.into_iter().map(StructuralNode::table));

        for (index, (ext, bytes)) in self.images.iter().enumerate() {
            match ctx.save_image(ext, bytes) {
                Ok(link) => nodes.push(StructuralNode::image(link, IMAGE_ALT)),
                Err(e) => ctx.partial(format!("image {}", index), e),
            }
        }

        let mut drawing_links = Vec::new();
        for (index, (ext, bytes)) in self.drawing_parts.iter().enumerate() {
            match ctx.save_drawing(ext, bytes) {
                Ok(link) => drawing_links.push(link),
                Err(e) => ctx.partial(format!("drawing {}", index), e),
            }
        }
        if self.drawing_count > 0 {
            let location = match drawing_links.as_slice() {
                [link] if self.drawing_count == 1 => link.clone(),
                _ => ctx.media().dir_link(DRAWING_DIR),
            };
            log::debug!("{} drawings noted at {}", self.drawing_count, location);
            nodes.push(StructuralNode::Placeholder {
                kind: PlaceholderKind::Drawing,
                count: self.drawing_count,
                location,
            });
        }

        for (index, text) in self.equations.iter().enumerate() {
            match ctx.save_equation("txt", text.as_bytes()) {
                Ok(link) => nodes.push(StructuralNode::Placeholder {
                    kind: PlaceholderKind::Equation,
                    count: 1,
                    location: link,
                }),
                Err(e) => ctx.partial(format!("equation {}", index), e),
            }
        }
        if !self.equations.is_empty() {
            log::debug!(
                "{} equations written to {}",
                self.equations.len(),
                ctx.media().dir_link(EQUATION_DIR)
            );
        }

        nodes
    }
}

/// Flatten a nested table into cell text: cells joined by spaces, rows by newlines.
pub(crate) fn flatten_table(rows: &[Vec<String>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.trim())
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
