//! DOCX extraction: `word/document.xml` walked as a quick-xml event stream.

use std::io::{Cursor, Read};
use std::mem;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::heading::level_from_style_id;
use crate::media::image_extension;
use crate::model::{build_grid, StructuralNode, StyleFlags};
use crate::parser::{read_source, ExtractContext, Extractor};

use super::{flatten_table, OfficeContent, ParagraphBuilder};

const DOCUMENT_PART: &str = "word/document.xml";
const MEDIA_PREFIX: &str = "word/media/";
const CHART_PREFIX: &str = "word/charts/";

/// Extractor for Office Open XML word processing documents.
#[derive(Debug, Clone, Default)]
pub struct DocxExtractor;

impl DocxExtractor {
    /// Create a DOCX extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract nodes from an in-memory DOCX package.
    pub fn extract_bytes(
        &self,
        data: &[u8],
        ctx: &mut ExtractContext,
    ) -> Result<Vec<StructuralNode>> {
        let content = read_package(data, ctx)?;
        log::debug!(
            "DOCX: {} body nodes, {} tables, {} images, {} drawings, {} equations",
            content.body.len(),
            content.tables.len(),
            content.images.len(),
            content.drawing_count,
            content.equations.len()
        );
        Ok(content.into_nodes(ctx))
    }
}

impl Extractor for DocxExtractor {
    fn name(&self) -> &str {
        "docx"
    }

    fn extract(&self, path: &Path, ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>> {
        let data = read_source(path)?;
        self.extract_bytes(&data, ctx).map_err(|e| match e {
            Error::SourceRead(cause) => Error::source_read(path, cause),
            other => other,
        })
    }
}

/// Read the document part and every media and chart part.
///
/// Only the document part is required; an unreadable media or chart part is
/// recorded on `ctx` and skipped.
fn read_package(data: &[u8], ctx: &mut ExtractContext) -> Result<OfficeContent> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let document = read_part(&mut archive, DOCUMENT_PART)?;
    let mut content = DocumentWalker::default().walk(&document)?;

    // imageN/chartN sort naturally by length first
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    for name in &names {
        if let Some(file_name) = name.strip_prefix(MEDIA_PREFIX) {
            if file_name.is_empty() || file_name.contains('/') {
                continue;
            }
            let bytes = match read_part(&mut archive, name) {
                Ok(bytes) => bytes,
                Err(e) => {
                    ctx.partial(name, e);
                    continue;
                }
            };
            let ext = image_extension(&bytes)
                .map(String::from)
                .or_else(|| part_extension(file_name))
                .unwrap_or_else(|| "bin".to_string());
            content.images.push((ext, bytes));
        } else if is_chart_part(name) {
            match read_part(&mut archive, name) {
                Ok(bytes) => content.drawing_parts.push(("xml".to_string(), bytes)),
                Err(e) => ctx.partial(name, e),
            }
        }
    }

    Ok(content)
}

fn read_part(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Vec<u8>> {
    let mut file = archive.by_name(name)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| Error::SourceRead(format!("{}: {}", name, e)))?;
    Ok(bytes)
}

fn part_extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// `word/charts/chartN.xml`, excluding relationship, style and color parts.
fn is_chart_part(name: &str) -> bool {
    match name.strip_prefix(CHART_PREFIX) {
        Some(rest) => rest.starts_with("chart") && rest.ends_with(".xml") && !rest.contains('/'),
        None => false,
    }
}

#[derive(Default)]
struct OpenParagraph {
    style_id: String,
    builder: ParagraphBuilder,
}

#[derive(Default)]
struct OpenRun {
    roles: StyleFlags,
    text: String,
}

#[derive(Default)]
struct OpenTable {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
}

/// Event-driven state over `word/document.xml`.
#[derive(Default)]
struct DocumentWalker {
    content: OfficeContent,
    paragraph: Option<OpenParagraph>,
    run: Option<OpenRun>,
    tables: Vec<OpenTable>,
    in_run_props: bool,
    in_text: bool,
    fallback_depth: u32,
    drawing_depth: u32,
    drawing_has_picture: bool,
    math_depth: u32,
    in_math_text: bool,
    equation: String,
}

impl DocumentWalker {
    fn walk(mut self, xml: &[u8]) -> Result<OfficeContent> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => self.on_start(&e),
                Event::Empty(e) => {
                    self.on_start(&e);
                    self.on_end(e.name().as_ref());
                }
                Event::Text(t) => {
                    if self.in_text || self.in_math_text {
                        let text = t.unescape()?;
                        self.on_text(&text);
                    }
                }
                Event::End(e) => self.on_end(e.name().as_ref()),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(self.content)
    }

    fn on_start(&mut self, e: &BytesStart) {
        let qname = e.name();
        let name = qname.as_ref();

        // mc:Fallback repeats the mc:Choice content in legacy markup
        if self.fallback_depth > 0 || name == b"mc:Fallback" {
            if name == b"mc:Fallback" {
                self.fallback_depth += 1;
            }
            return;
        }
        if self.math_depth > 0 {
            match name {
                b"m:oMath" => self.math_depth += 1,
                b"m:t" => self.in_math_text = true,
                _ => {}
            }
            return;
        }
        if self.drawing_depth > 0 {
            if name == b"w:drawing" || name == b"w:pict" {
                self.drawing_depth += 1;
            } else if e.local_name().as_ref() == b"pic" {
                self.drawing_has_picture = true;
            }
            return;
        }

        match name {
            b"m:oMath" => {
                self.math_depth = 1;
                self.equation.clear();
            }
            b"w:drawing" | b"w:pict" => {
                self.drawing_depth = 1;
                self.drawing_has_picture = false;
            }
            b"w:p" => self.paragraph = Some(OpenParagraph::default()),
            b"w:pStyle" => {
                if let (Some(paragraph), Some(style_id)) =
                    (self.paragraph.as_mut(), attr_value(e, b"val"))
                {
                    paragraph.style_id = style_id;
                }
            }
            b"w:r" => self.run = Some(OpenRun::default()),
            b"w:rPr" => self.in_run_props = self.run.is_some(),
            b"w:b" | b"w:i" | b"w:strike" | b"w:dstrike" if self.in_run_props => {
                let on = toggle_on(e);
                if let Some(run) = self.run.as_mut() {
                    match name {
                        b"w:b" => run.roles.bold = on,
                        b"w:i" => run.roles.italic = on,
                        _ => run.roles.strikethrough = on,
                    }
                }
            }
            b"w:t" => self.in_text = self.run.is_some(),
            b"w:tab" if !self.in_run_props => {
                if let Some(run) = self.run.as_mut() {
                    run.text.push('\t');
                }
            }
            b"w:br" | b"w:cr" => self.break_line(),
            b"w:tbl" => self.tables.push(OpenTable::default()),
            b"w:tr" => {
                if let Some(table) = self.tables.last_mut() {
                    table.row.clear();
                }
            }
            b"w:tc" => {
                if let Some(table) = self.tables.last_mut() {
                    table.cell.clear();
                }
            }
            _ => {}
        }
    }

    fn on_text(&mut self, text: &str) {
        if self.in_math_text {
            self.equation.push_str(text);
        } else if let Some(run) = self.run.as_mut() {
            run.text.push_str(text);
        }
    }

    fn on_end(&mut self, name: &[u8]) {
        if self.fallback_depth > 0 {
            if name == b"mc:Fallback" {
                self.fallback_depth -= 1;
            }
            return;
        }
        if self.math_depth > 0 {
            match name {
                b"m:t" => self.in_math_text = false,
                b"m:oMath" => {
                    self.math_depth -= 1;
                    if self.math_depth == 0 {
                        let text = mem::take(&mut self.equation);
                        if !text.trim().is_empty() {
                            self.content.equations.push(text.trim().to_string());
                        }
                    }
                }
                _ => {}
            }
            return;
        }
        if self.drawing_depth > 0 {
            if name == b"w:drawing" || name == b"w:pict" {
                self.drawing_depth -= 1;
                if self.drawing_depth == 0 && !self.drawing_has_picture {
                    self.content.drawing_count += 1;
                }
            }
            return;
        }

        match name {
            b"w:t" => self.in_text = false,
            b"w:rPr" => self.in_run_props = false,
            b"w:r" => self.finish_run(),
            b"w:p" => self.finish_paragraph(),
            b"w:tc" => {
                if let Some(table) = self.tables.last_mut() {
                    let text = mem::take(&mut table.cell).join("\n");
                    table.row.push(text);
                }
            }
            b"w:tr" => {
                if let Some(table) = self.tables.last_mut() {
                    let row = mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            b"w:tbl" => self.finish_table(),
            _ => {}
        }
    }

    fn break_line(&mut self) {
        if let (Some(run), Some(paragraph)) = (self.run.as_mut(), self.paragraph.as_mut()) {
            paragraph.builder.push_run(&run.text, run.roles);
            run.text.clear();
            paragraph.builder.line_break();
        }
    }

    fn finish_run(&mut self) {
        self.in_run_props = false;
        self.in_text = false;
        if let (Some(run), Some(paragraph)) = (self.run.take(), self.paragraph.as_mut()) {
            paragraph.builder.push_run(&run.text, run.roles);
        }
    }

    fn finish_paragraph(&mut self) {
        let Some(paragraph) = self.paragraph.take() else {
            return;
        };

        if let Some(table) = self.tables.last_mut() {
            let text = paragraph.builder.plain_text();
            if !text.trim().is_empty() {
                table.cell.push(text.trim().to_string());
            }
            return;
        }

        let level = level_from_style_id(&paragraph.style_id);
        if let Some(node) = paragraph.builder.finish(level) {
            self.content.body.push(node);
        }
    }

    fn finish_table(&mut self) {
        let Some(table) = self.tables.pop() else {
            return;
        };
        match self.tables.last_mut() {
            Some(outer) => {
                let text = flatten_table(&table.rows);
                if !text.is_empty() {
                    outer.cell.push(text);
                }
            }
            None => {
                if !table.rows.is_empty() {
                    self.content.tables.push(build_grid(table.rows));
                }
            }
        }
    }
}

fn attr_value(e: &BytesStart, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// `<w:b/>` is on; `w:val="0|false|off"` turns the property off.
fn toggle_on(e: &BytesStart) -> bool {
    match attr_value(e, b"val") {
        Some(val) => !matches!(val.as_str(), "0" | "false" | "off"),
        None => true,
    }
}
