//! Positioned text extraction from PDF content streams.
//!
//! Walks the operators of one page and emits a [`RawTextRun`] for every
//! shown string, with the position taken from the text matrix under the
//! current transformation matrix and the base font name taken from the
//! page's font resources. Stroked or filled axis-aligned path segments are
//! collected as [`Ruling`]s for table detection.

use std::collections::{BTreeMap, HashMap};

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::model::RawTextRun;

use super::table_detector::Ruling;

/// Default leading used by `T*` until a `TL` operator sets one.
const DEFAULT_LEADING: f32 = 12.0;

/// TJ adjustment (thousandths of an em) beyond which a word space is assumed.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Text runs and ruling lines of one page.
#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub runs: Vec<RawTextRun>,
    pub rulings: Vec<Ruling>,
}

/// Extract the text runs and ruling lines of one page.
pub fn extract_page(
    doc: &LopdfDocument,
    page_id: ObjectId,
    page_index: u32,
) -> Result<PageLayout> {
    let fonts = doc.get_page_fonts(page_id)?;

    let mut base_fonts = HashMap::new();
    for (name, font) in &fonts {
        let base_font = font
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
        base_fonts.insert(name.clone(), base_font);
    }

    let content = page_content(doc, page_id)?;
    let walker = ContentWalker {
        doc,
        fonts: &fonts,
        base_fonts: &base_fonts,
        page_index,
    };
    walker.walk(&content)
}

/// Concatenated, decompressed content of a page.
pub(crate) fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>> {
    let page_dict = doc.get_dictionary(page_id)?;
    let contents = page_dict.get(b"Contents")?;

    match contents {
        Object::Reference(r) => match doc.get_object(*r) {
            Ok(Object::Stream(s)) => Ok(stream_bytes(s)),
            _ => Err(Error::SourceRead("invalid content stream".to_string())),
        },
        Object::Stream(s) => Ok(stream_bytes(s)),
        Object::Array(arr) => {
            let mut content = Vec::new();
            for obj in arr {
                if let Object::Reference(r) = obj {
                    if let Ok(Object::Stream(s)) = doc.get_object(*r) {
                        content.extend_from_slice(&stream_bytes(s));
                        content.push(b' ');
                    }
                }
            }
            Ok(content)
        }
        _ => Err(Error::SourceRead("invalid content stream".to_string())),
    }
}

/// Stream data, decompressed when a filter is present.
fn stream_bytes(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

struct ContentWalker<'a> {
    doc: &'a LopdfDocument,
    fonts: &'a BTreeMap<Vec<u8>, &'a Dictionary>,
    base_fonts: &'a HashMap<Vec<u8>, String>,
    page_index: u32,
}

#[derive(Default)]
struct TextState {
    font_key: Vec<u8>,
    font_family: String,
    font_size: f32,
    leading: f32,
    matrix: TextMatrix,
    in_text: bool,
}

/// Graphics state that survives `q`/`Q`, plus the path under construction.
#[derive(Default)]
struct GraphicsState {
    ctm: Matrix,
    saved: Vec<Matrix>,
    current: Option<(f32, f32)>,
    subpath_start: Option<(f32, f32)>,
    segments: Vec<Ruling>,
}

impl GraphicsState {
    fn move_to(&mut self, x: f32, y: f32) {
        let point = self.ctm.apply(x, y);
        self.current = Some(point);
        self.subpath_start = Some(point);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let point = self.ctm.apply(x, y);
        if let Some(from) = self.current {
            self.segments.push(Ruling::new(from, point));
        }
        self.current = Some(point);
    }

    fn close(&mut self) {
        if let (Some(from), Some(start)) = (self.current, self.subpath_start) {
            self.segments.push(Ruling::new(from, start));
            self.current = Some(start);
        }
    }

    fn rectangle(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.move_to(x, y);
        self.line_to(x + w, y);
        self.line_to(x + w, y + h);
        self.line_to(x, y + h);
        self.close();
    }

    /// Paint the current path: keep its axis-aligned segments.
    fn paint(&mut self, rulings: &mut Vec<Ruling>) {
        rulings.extend(
            self.segments
                .drain(..)
                .filter(|r| r.is_horizontal() || r.is_vertical()),
        );
        self.current = None;
        self.subpath_start = None;
    }

    fn discard(&mut self) {
        self.segments.clear();
        self.current = None;
        self.subpath_start = None;
    }
}

impl<'a> ContentWalker<'a> {
    fn walk(&self, content: &[u8]) -> Result<PageLayout> {
        let content = lopdf::content::Content::decode(content)?;

        let mut layout = PageLayout::default();
        let mut graphics = GraphicsState::default();
        let mut state = TextState {
            font_size: 12.0,
            leading: DEFAULT_LEADING,
            ..TextState::default()
        };

        for op in &content.operations {
            let operands = &op.operands;
            let n = |i: usize| operands.get(i).and_then(get_number).unwrap_or(0.0);
            match op.operator.as_str() {
                "q" => graphics.saved.push(graphics.ctm),
                "Q" => {
                    if let Some(ctm) = graphics.saved.pop() {
                        graphics.ctm = ctm;
                    }
                }
                "cm" if operands.len() >= 6 => {
                    let m = Matrix::new(n(0), n(1), n(2), n(3), n(4), n(5));
                    graphics.ctm = m.multiply(&graphics.ctm);
                }
                "m" if operands.len() >= 2 => graphics.move_to(n(0), n(1)),
                "l" if operands.len() >= 2 => graphics.line_to(n(0), n(1)),
                "h" => graphics.close(),
                "re" if operands.len() >= 4 => graphics.rectangle(n(0), n(1), n(2), n(3)),
                "S" | "f" | "F" | "f*" | "B" | "B*" => graphics.paint(&mut layout.rulings),
                "s" | "b" | "b*" => {
                    graphics.close();
                    graphics.paint(&mut layout.rulings);
                }
                "n" => graphics.discard(),
                "BT" => {
                    state.in_text = true;
                    state.matrix = TextMatrix::default();
                }
                "ET" => state.in_text = false,
                "Tf" if operands.len() >= 2 => {
                    if let Object::Name(key) = &operands[0] {
                        state.font_family = self
                            .base_fonts
                            .get(key)
                            .cloned()
                            .unwrap_or_else(|| String::from_utf8_lossy(key).to_string());
                        state.font_key = key.clone();
                    }
                    state.font_size = get_number(&operands[1]).unwrap_or(12.0);
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(get_number) {
                        state.leading = leading;
                    }
                }
                "Td" | "TD" if operands.len() >= 2 => {
                    let (tx, ty) = (n(0), n(1));
                    if op.operator == "TD" {
                        state.leading = -ty;
                    }
                    state.matrix.translate(tx, ty);
                }
                "Tm" if operands.len() >= 6 => {
                    let m = Matrix::new(n(0), n(1), n(2), n(3), n(4), n(5));
                    state.matrix.set(m);
                }
                "T*" => state.matrix.next_line(state.leading),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        let text = self.decode(&state.font_key, bytes);
                        self.show(&mut layout.runs, &mut state, &graphics.ctm, text);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let text = self.decode_array(&state.font_key, items);
                        self.show(&mut layout.runs, &mut state, &graphics.ctm, text);
                    }
                }
                "'" | "\"" => {
                    state.matrix.next_line(state.leading);
                    let index = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(Object::String(bytes, _)) = operands.get(index) {
                        let text = self.decode(&state.font_key, bytes);
                        self.show(&mut layout.runs, &mut state, &graphics.ctm, text);
                    }
                }
                _ => {}
            }
        }

        Ok(layout)
    }

    /// Emit a run at the pen position, then advance the pen past it.
    fn show(
        &self,
        runs: &mut Vec<RawTextRun>,
        state: &mut TextState,
        ctm: &Matrix,
        text: String,
    ) {
        if !state.in_text {
            return;
        }
        let text: String = text.nfc().collect();
        // Advance in unscaled text space
        let advance = RawTextRun::estimate_width(&text, state.font_size);

        if !text.trim().is_empty() {
            let rendering = state.matrix.current.multiply(ctm);
            let (x, y) = rendering.apply(0.0, 0.0);
            runs.push(RawTextRun::new(
                text,
                x,
                y,
                state.font_size * rendering.scale(),
                state.font_family.clone(),
                self.page_index,
            ));
        }
        state.matrix.advance(advance);
    }

    fn decode(&self, font_key: &[u8], bytes: &[u8]) -> String {
        let encoding = self
            .fonts
            .get(font_key)
            .and_then(|f| f.get_font_encoding(self.doc).ok());
        match encoding {
            Some(enc) => LopdfDocument::decode_text(&enc, bytes).unwrap_or_default(),
            None => decode_text_simple(bytes),
        }
    }

    fn decode_array(&self, font_key: &[u8], items: &[Object]) -> String {
        let encoding = self
            .fonts
            .get(font_key)
            .and_then(|f| f.get_font_encoding(self.doc).ok());
        let mut combined = String::new();

        for item in items {
            match item {
                Object::String(bytes, _) => match encoding {
                    Some(ref enc) => {
                        if let Ok(decoded) = LopdfDocument::decode_text(enc, bytes) {
                            combined.push_str(&decoded);
                        }
                    }
                    None => combined.push_str(&decode_text_simple(bytes)),
                },
                Object::Integer(_) | Object::Real(_) => {
                    // Negative adjustments advance the pen
                    let adjustment = -get_number(item).unwrap_or(0.0);
                    if adjustment > TJ_SPACE_THRESHOLD && wants_space(&combined) {
                        combined.push(' ');
                    }
                }
                _ => {}
            }
        }

        combined
    }
}

fn wants_space(text: &str) -> bool {
    match text.chars().last() {
        Some(c) => c != ' ' && c != '\u{00A0}' && !is_spaceless_script_char(c),
        None => false,
    }
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }
}

impl Matrix {
    fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    fn translation(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Vertical scale factor, used for the effective font size.
    fn scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

/// Text matrix and text line matrix of a `BT`/`ET` block.
#[derive(Debug, Clone, Default)]
struct TextMatrix {
    current: Matrix,
    line: Matrix,
}

impl TextMatrix {
    fn set(&mut self, m: Matrix) {
        self.current = m;
        self.line = m;
    }

    /// `Td`: move relative to the start of the current line.
    fn translate(&mut self, tx: f32, ty: f32) {
        self.line = Matrix::translation(tx, ty).multiply(&self.line);
        self.current = self.line;
    }

    fn next_line(&mut self, leading: f32) {
        self.translate(0.0, -leading);
    }

    /// Move the pen right by `tx` text space units after a shown string.
    fn advance(&mut self, tx: f32) {
        self.current = Matrix::translation(tx, 0.0).multiply(&self.current);
    }
}

pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Scripts written without word spaces (Chinese, Japanese kana).
///
/// Hangul is excluded; Korean separates words with spaces.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0x3040..=0x309F).contains(&code)
        || (0x30A0..=0x30FF).contains(&code)
        || (0x3000..=0x303F).contains(&code)
}

/// Decode a string with no font encoding: UTF-16BE with BOM, UTF-8, then Latin-1.
fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}
