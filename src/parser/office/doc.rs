//! Word 97-2003 binary documents.
//!
//! The `WordDocument` stream starts with the FIB, which locates the piece
//! table (CLX) and the bin tables of character and paragraph property pages
//! in the table stream. Text is read piece by piece; each character's file
//! offset selects its CHPX and PAPX run.

use std::mem;
use std::path::Path;

use encoding_rs::Encoding;

use crate::error::{Error, Result};
use crate::heading::level_from_style_index;
use crate::media::image_extension;
use crate::model::{build_grid, StructuralNode, StyleFlags};
use crate::parser::{read_source, ExtractContext, Extractor};

use super::cfb::{read_u16, read_u32, CompoundFile};
use super::{OfficeContent, ParagraphBuilder};

const WORD_IDENT: u16 = 0xA5EC;
/// Oldest FIB version with the Word 97 layout.
const MIN_FIB_VERSION: u16 = 106;

const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_TABLE_STREAM: u16 = 0x0200;

const FIB_BASE_SIZE: usize = 32;
const FCLCB_PLCF_BTE_CHPX: usize = 12;
const FCLCB_PLCF_BTE_PAPX: usize = 13;
const FCLCB_CLX: usize = 33;

const FKP_SIZE: usize = 512;
const BX_SIZE: usize = 13;
const PCD_SIZE: usize = 8;

const SPRM_C_F_BOLD: u16 = 0x0835;
const SPRM_C_F_ITALIC: u16 = 0x0836;
const SPRM_C_F_STRIKE: u16 = 0x0837;
const SPRM_C_F_DSTRIKE: u16 = 0x2A53;
const SPRM_C_PIC_LOCATION: u16 = 0x6A03;
const SPRM_P_F_IN_TABLE: u16 = 0x2416;
const SPRM_P_F_TTP: u16 = 0x2417;
const SPRM_P_ITAP: u16 = 0x6649;
const SPRM_P_F_INNER_TTP: u16 = 0x244C;
const SPRM_P_CHG_TABS: u16 = 0xC615;
const SPRM_T_DEF_TABLE: u16 = 0xD608;

/// Extractor for Word 97-2003 binary documents.
#[derive(Debug, Clone, Default)]
pub struct DocExtractor;

impl DocExtractor {
    /// Create a DOC extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract nodes from an in-memory DOC file.
    pub fn extract_bytes(
        &self,
        data: &[u8],
        ctx: &mut ExtractContext,
    ) -> Result<Vec<StructuralNode>> {
        let cfb = CompoundFile::parse(data)?;
        let word = cfb.stream("WordDocument")?;
        let fib = Fib::parse(&word)?;
        if fib.encrypted {
            return Err(Error::SourceRead("encrypted Word document".to_string()));
        }

        let table = cfb.stream(fib.table_stream)?;
        let data_stream = if cfb.has_stream("Data") {
            match cfb.stream("Data") {
                Ok(stream) => Some(stream),
                Err(e) => {
                    ctx.partial("Data stream", e);
                    None
                }
            }
        } else {
            None
        };

        let clx = slice(&table, fib.clx).ok_or_else(|| corrupt("piece table out of range"))?;
        let pieces = parse_pieces(clx)?;
        let encoding = lid_encoding(fib.lid);
        let text = main_text(&word, &pieces, fib.ccp_text, encoding);
        let chars = char_runs(&word, &table, fib.bte_chpx);
        let paras = para_runs(&word, &table, fib.bte_papx);
        log::debug!(
            "DOC: {} pieces, {} characters ({}), {} CHPX runs, {} PAPX runs",
            pieces.len(),
            text.len(),
            encoding.name(),
            chars.runs.len(),
            paras.runs.len()
        );

        let walker = TextWalker::new(&chars, &paras, data_stream.as_deref());
        let content = walker.walk(&text, ctx);
        Ok(content.into_nodes(ctx))
    }
}

impl Extractor for DocExtractor {
    fn name(&self) -> &str {
        "doc"
    }

    fn extract(&self, path: &Path, ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>> {
        let data = read_source(path)?;
        self.extract_bytes(&data, ctx).map_err(|e| match e {
            Error::SourceRead(cause) => Error::source_read(path, cause),
            other => other,
        })
    }
}

fn corrupt(message: &str) -> Error {
    Error::SourceRead(format!("Word document: {}", message))
}

fn slice(data: &[u8], (fc, lcb): (u32, u32)) -> Option<&[u8]> {
    data.get(fc as usize..fc as usize + lcb as usize)
}

/// The parts of the File Information Block this reader uses.
#[derive(Debug)]
struct Fib {
    /// Install language of the document
    lid: u16,
    encrypted: bool,
    table_stream: &'static str,
    ccp_text: u32,
    clx: (u32, u32),
    bte_chpx: (u32, u32),
    bte_papx: (u32, u32),
}

impl Fib {
    fn parse(word: &[u8]) -> Result<Self> {
        if read_u16(word, 0) != Some(WORD_IDENT) {
            return Err(corrupt("missing Word signature"));
        }
        let version = read_u16(word, 2).unwrap_or(0);
        if version < MIN_FIB_VERSION {
            return Err(Error::SourceRead(format!(
                "Word document version {} predates Word 97",
                version
            )));
        }
        let flags = read_u16(word, 0x0A).unwrap_or(0);

        // FibBase, then csw u16s, cslw u32s and cbRgFcLcb fc/lcb pairs
        let truncated = || corrupt("truncated FIB");
        let csw = read_u16(word, FIB_BASE_SIZE).ok_or_else(truncated)? as usize;
        let rg_lw = FIB_BASE_SIZE + 2 + csw * 2 + 2;
        let cslw = read_u16(word, rg_lw - 2).ok_or_else(truncated)? as usize;
        let ccp_text = read_u32(word, rg_lw + 3 * 4).ok_or_else(truncated)?;
        let count_offset = rg_lw + cslw * 4;
        let fc_lcb_count = read_u16(word, count_offset).ok_or_else(truncated)? as usize;
        let fc_lcb_base = count_offset + 2;

        let fc_lcb = |index: usize| -> (u32, u32) {
            if index >= fc_lcb_count {
                return (0, 0);
            }
            let at = fc_lcb_base + index * 8;
            (
                read_u32(word, at).unwrap_or(0),
                read_u32(word, at + 4).unwrap_or(0),
            )
        };

        Ok(Fib {
            lid: read_u16(word, 6).unwrap_or(0),
            encrypted: flags & FLAG_ENCRYPTED != 0,
            table_stream: if flags & FLAG_TABLE_STREAM != 0 {
                "1Table"
            } else {
                "0Table"
            },
            ccp_text,
            clx: fc_lcb(FCLCB_CLX),
            bte_chpx: fc_lcb(FCLCB_PLCF_BTE_CHPX),
            bte_papx: fc_lcb(FCLCB_PLCF_BTE_PAPX),
        })
    }
}

/// A run of text stored contiguously in the `WordDocument` stream.
#[derive(Debug, Clone, PartialEq)]
struct Piece {
    cp_start: u32,
    cp_end: u32,
    /// Byte offset of the first character
    offset: u32,
    /// 8-bit code page text instead of UTF-16LE
    compressed: bool,
}

fn parse_pieces(clx: &[u8]) -> Result<Vec<Piece>> {
    let mut pos = 0;

    // Prc entries carry property modifiers for complex files
    while clx.get(pos) == Some(&0x01) {
        let size = read_u16(clx, pos + 1).ok_or_else(|| corrupt("truncated CLX"))? as usize;
        pos += 3 + size;
    }
    if clx.get(pos) != Some(&0x02) {
        return Err(corrupt("CLX without a piece table"));
    }
    let lcb = read_u32(clx, pos + 1).ok_or_else(|| corrupt("truncated CLX"))? as usize;
    let plc = clx
        .get(pos + 5..pos + 5 + lcb)
        .ok_or_else(|| corrupt("truncated piece table"))?;

    let count = lcb.saturating_sub(4) / (4 + PCD_SIZE);
    let pcd_base = (count + 1) * 4;
    let mut pieces = Vec::with_capacity(count);
    for i in 0..count {
        let (Some(cp_start), Some(cp_end), Some(fc)) = (
            read_u32(plc, i * 4),
            read_u32(plc, i * 4 + 4),
            read_u32(plc, pcd_base + i * PCD_SIZE + 2),
        ) else {
            break;
        };
        let compressed = fc & 0x4000_0000 != 0;
        let fc = fc & 0x3FFF_FFFF;
        pieces.push(Piece {
            cp_start,
            cp_end,
            offset: if compressed { fc / 2 } else { fc },
            compressed,
        });
    }
    Ok(pieces)
}

/// Characters of the main document with their byte offsets.
///
/// 8-bit pieces are decoded with `encoding`.
fn main_text(
    word: &[u8],
    pieces: &[Piece],
    ccp_text: u32,
    encoding: &'static Encoding,
) -> Vec<(char, u32)> {
    let mut chars = Vec::new();

    for piece in pieces {
        if piece.cp_start >= ccp_text || piece.cp_end <= piece.cp_start {
            continue;
        }
        let count = (piece.cp_end.min(ccp_text) - piece.cp_start) as usize;
        let start = piece.offset as usize;

        if piece.compressed {
            let end = (start + count).min(word.len());
            if let Some(bytes) = word.get(start..end) {
                decode_compressed(bytes, start, encoding, &mut chars);
            }
        } else {
            let units: Vec<u16> = (0..count)
                .map_while(|k| read_u16(word, start + k * 2))
                .collect();
            let mut offset = start;
            for c in char::decode_utf16(units) {
                let c = c.unwrap_or(char::REPLACEMENT_CHARACTER);
                chars.push((c, offset as u32));
                offset += c.len_utf16() * 2;
            }
        }
    }

    chars
}

/// Decode an 8-bit piece starting at byte `start`, keeping each character's offset.
fn decode_compressed(
    bytes: &[u8],
    start: usize,
    encoding: &'static Encoding,
    chars: &mut Vec<(char, u32)>,
) {
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    let mut offset = start;
    let mut buf = [0u8; 4];
    for c in text.chars() {
        chars.push((c, offset as u32));
        // Double-byte code pages take two bytes outside ASCII
        let (encoded, _, unmappable) = encoding.encode(c.encode_utf8(&mut buf));
        offset += if unmappable { 1 } else { encoded.len().max(1) };
    }
}

/// Code page of 8-bit text for a FIB language identifier.
fn lid_encoding(lid: u16) -> &'static Encoding {
    match lid {
        0x0804 | 0x1004 => encoding_rs::GBK,
        0x0404 | 0x0C04 | 0x1404 => encoding_rs::BIG5,
        0x0411 => encoding_rs::SHIFT_JIS,
        0x0412 => encoding_rs::EUC_KR,
        _ => match lid & 0x03FF {
            // Czech, Polish, Hungarian, Slovak, Slovenian, Croatian, Romanian, Albanian
            0x05 | 0x15 | 0x0E | 0x1B | 0x24 | 0x1A | 0x18 | 0x1C => encoding_rs::WINDOWS_1250,
            // Russian, Ukrainian, Belarusian, Bulgarian, Macedonian
            0x19 | 0x22 | 0x23 | 0x02 | 0x2F => encoding_rs::WINDOWS_1251,
            0x08 => encoding_rs::WINDOWS_1253,
            0x1F => encoding_rs::WINDOWS_1254,
            0x0D => encoding_rs::WINDOWS_1255,
            0x01 => encoding_rs::WINDOWS_1256,
            // Estonian, Latvian, Lithuanian
            0x25 | 0x26 | 0x27 => encoding_rs::WINDOWS_1257,
            0x2A => encoding_rs::WINDOWS_1258,
            0x1E => encoding_rs::WINDOWS_874,
            _ => encoding_rs::WINDOWS_1252,
        },
    }
}

/// Property modifiers of a grpprl, as (opcode, operand) pairs.
struct Sprms<'a> {
    grpprl: &'a [u8],
    pos: usize,
}

impl<'a> Sprms<'a> {
    fn new(grpprl: &'a [u8]) -> Self {
        Self { grpprl, pos: 0 }
    }
}

impl<'a> Iterator for Sprms<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let opcode = read_u16(self.grpprl, self.pos)?;
        let at = self.pos + 2;

        // Operand size comes from bits 13-15 of the opcode
        let (start, len) = match opcode >> 13 {
            0 | 1 => (at, 1),
            2 | 4 | 5 => (at, 2),
            3 => (at, 4),
            7 => (at, 3),
            _ if opcode == SPRM_P_CHG_TABS || opcode == SPRM_T_DEF_TABLE => {
                let size = read_u16(self.grpprl, at)? as usize;
                (at + 2, size.saturating_sub(1))
            }
            _ => (at + 1, *self.grpprl.get(at)? as usize),
        };

        let operand = self.grpprl.get(start..start + len)?;
        self.pos = start + len;
        Some((opcode, operand))
    }
}

/// Toggle operands: 1 is on, 0x81 is the opposite of an off style value.
fn toggle(operand: &[u8]) -> bool {
    matches!(operand.first(), Some(0x01 | 0x81))
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CharProps {
    roles: StyleFlags,
    pic_location: Option<u32>,
}

impl CharProps {
    fn from_grpprl(grpprl: &[u8]) -> Self {
        let mut props = CharProps::default();
        let (mut strike, mut dstrike) = (false, false);
        for (opcode, operand) in Sprms::new(grpprl) {
            match opcode {
                SPRM_C_F_BOLD => props.roles.bold = toggle(operand),
                SPRM_C_F_ITALIC => props.roles.italic = toggle(operand),
                SPRM_C_F_STRIKE => strike = toggle(operand),
                SPRM_C_F_DSTRIKE => dstrike = toggle(operand),
                SPRM_C_PIC_LOCATION => props.pic_location = read_u32(operand, 0),
                _ => {}
            }
        }
        props.roles.strikethrough = strike || dstrike;
        props
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct ParaProps {
    istd: u16,
    in_table: bool,
    row_end: bool,
    inner_row_end: bool,
}

impl ParaProps {
    fn from_grpprl(istd: u16, grpprl: &[u8]) -> Self {
        let mut props = ParaProps {
            istd,
            ..ParaProps::default()
        };
        for (opcode, operand) in Sprms::new(grpprl) {
            match opcode {
                SPRM_P_F_IN_TABLE => props.in_table = operand.first().is_some_and(|&b| b != 0),
                SPRM_P_F_TTP => props.row_end = operand.first().is_some_and(|&b| b != 0),
                SPRM_P_ITAP => props.in_table |= read_u32(operand, 0).is_some_and(|n| n > 0),
                SPRM_P_F_INNER_TTP => {
                    props.inner_row_end = operand.first().is_some_and(|&b| b != 0)
                }
                _ => {}
            }
        }
        props
    }

    /// Heading level; istd 0 is the Normal style.
    fn heading_level(&self) -> u8 {
        match self.istd {
            0 => 0,
            istd => level_from_style_index(istd as i32 - 1),
        }
    }
}

/// Property runs keyed by byte offset ranges, sorted by start.
#[derive(Debug, Default)]
struct PropRuns<T> {
    runs: Vec<(u32, u32, T)>,
}

impl<T: Copy + Default> PropRuns<T> {
    fn new(mut runs: Vec<(u32, u32, T)>) -> Self {
        runs.sort_by_key(|run| run.0);
        Self { runs }
    }

    fn at(&self, fc: u32) -> T {
        let index = self.runs.partition_point(|run| run.0 <= fc);
        match index.checked_sub(1).map(|i| &self.runs[i]) {
            Some(&(_, end, props)) if fc < end => props,
            _ => T::default(),
        }
    }
}

/// FKP page numbers listed in a bin table.
fn fkp_pages(table: &[u8], location: (u32, u32)) -> Vec<u32> {
    let Some(plc) = slice(table, location) else {
        return Vec::new();
    };
    let count = plc.len().saturating_sub(4) / 8;
    let base = (count + 1) * 4;
    (0..count)
        .filter_map(|i| read_u32(plc, base + i * 4))
        .map(|pn| pn & 0x003F_FFFF)
        .collect()
}

fn fkp_page(word: &[u8], pn: u32) -> Option<&[u8]> {
    let start = pn as usize * FKP_SIZE;
    word.get(start..start + FKP_SIZE)
}

fn char_runs(word: &[u8], table: &[u8], location: (u32, u32)) -> PropRuns<CharProps> {
    let mut runs = Vec::new();

    for pn in fkp_pages(table, location) {
        let Some(page) = fkp_page(word, pn) else {
            log::warn!("CHPX page {} out of range", pn);
            continue;
        };
        let crun = page[FKP_SIZE - 1] as usize;
        let rgb = (crun + 1) * 4;
        if rgb + crun >= FKP_SIZE {
            continue;
        }

        for i in 0..crun {
            let (Some(start), Some(end)) = (read_u32(page, i * 4), read_u32(page, i * 4 + 4)) else {
                break;
            };
            let offset = page[rgb + i] as usize * 2;
            let props = if offset == 0 {
                CharProps::default()
            } else {
                let cb = page.get(offset).copied().unwrap_or(0) as usize;
                CharProps::from_grpprl(page.get(offset + 1..offset + 1 + cb).unwrap_or(&[]))
            };
            runs.push((start, end, props));
        }
    }

    PropRuns::new(runs)
}

fn para_runs(word: &[u8], table: &[u8], location: (u32, u32)) -> PropRuns<ParaProps> {
    let mut runs = Vec::new();

    for pn in fkp_pages(table, location) {
        let Some(page) = fkp_page(word, pn) else {
            log::warn!("PAPX page {} out of range", pn);
            continue;
        };
        let crun = page[FKP_SIZE - 1] as usize;
        let rgbx = (crun + 1) * 4;
        if rgbx + crun * BX_SIZE >= FKP_SIZE {
            continue;
        }

        for i in 0..crun {
            let (Some(start), Some(end)) = (read_u32(page, i * 4), read_u32(page, i * 4 + 4)) else {
                break;
            };
            let offset = page[rgbx + i * BX_SIZE] as usize * 2;
            runs.push((start, end, papx_props(page, offset)));
        }
    }

    PropRuns::new(runs)
}

/// Read a PapxInFkp: a size byte (or a zero and a second size byte), istd, grpprl.
fn papx_props(page: &[u8], offset: usize) -> ParaProps {
    if offset == 0 {
        return ParaProps::default();
    }
    let Some(&cb) = page.get(offset) else {
        return ParaProps::default();
    };
    let (start, len) = if cb != 0 {
        (offset + 1, cb as usize * 2 - 1)
    } else {
        let cb = page.get(offset + 1).copied().unwrap_or(0) as usize;
        (offset + 2, cb * 2)
    };
    let Some(papx) = page.get(start..(start + len).min(page.len())) else {
        return ParaProps::default();
    };

    let istd = read_u16(papx, 0).unwrap_or(0);
    ParaProps::from_grpprl(istd, papx.get(2..).unwrap_or(&[]))
}

/// Locate the picture stored at `location` in the `Data` stream.
///
/// The PICF header gives the record size; the image is the first PNG,
/// JPEG or GIF signature after the header.
fn picture_bytes(data: &[u8], location: u32) -> Option<(String, Vec<u8>)> {
    const SIGNATURES: [(&[u8], &str); 3] = [
        (b"\x89PNG\r\n\x1a\n", "png"),
        (b"\xFF\xD8\xFF", "jpeg"),
        (b"GIF8", "gif"),
    ];

    let start = location as usize;
    let size = read_u32(data, start)? as usize;
    let header = read_u16(data, start + 4)? as usize;
    let end = start.checked_add(size)?.min(data.len());
    let record = data.get(start + header..end)?;

    let (offset, ext) = SIGNATURES
        .iter()
        .filter_map(|(sig, ext)| {
            record
                .windows(sig.len())
                .position(|w| w == *sig)
                .map(|pos| (pos, *ext))
        })
        .min_by_key(|(pos, _)| *pos)?;

    let bytes = record[offset..].to_vec();
    let ext = image_extension(&bytes).unwrap_or(ext).to_string();
    Some((ext, bytes))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldPart {
    Code,
    Result,
}

/// Rebuilds paragraphs and table rows from the character stream.
struct TextWalker<'a> {
    chars: &'a PropRuns<CharProps>,
    paras: &'a PropRuns<ParaProps>,
    data_stream: Option<&'a [u8]>,
    content: OfficeContent,
    paragraph: ParagraphBuilder,
    cell: Vec<String>,
    row: Vec<String>,
    rows: Vec<Vec<String>>,
    fields: Vec<FieldPart>,
}

impl<'a> TextWalker<'a> {
    fn new(
        chars: &'a PropRuns<CharProps>,
        paras: &'a PropRuns<ParaProps>,
        data_stream: Option<&'a [u8]>,
    ) -> Self {
        Self {
            chars,
            paras,
            data_stream,
            content: OfficeContent::default(),
            paragraph: ParagraphBuilder::new(),
            cell: Vec::new(),
            row: Vec::new(),
            rows: Vec::new(),
            fields: Vec::new(),
        }
    }

    fn walk(mut self, text: &[(char, u32)], ctx: &mut ExtractContext) -> OfficeContent {
        let mut buf = [0u8; 4];

        for &(c, fc) in text {
            match c {
                '\u{13}' => {
                    self.fields.push(FieldPart::Code);
                    continue;
                }
                '\u{14}' => {
                    if let Some(part) = self.fields.last_mut() {
                        *part = FieldPart::Result;
                    }
                    continue;
                }
                '\u{15}' => {
                    self.fields.pop();
                    continue;
                }
                _ => {}
            }
            if self.fields.contains(&FieldPart::Code) {
                continue;
            }

            match c {
                '\r' | '\u{0C}' | '\u{0E}' => self.end_paragraph(self.paras.at(fc)),
                '\u{07}' => self.end_cell(self.paras.at(fc)),
                '\u{0B}' => self.paragraph.line_break(),
                '\u{1E}' => self.paragraph.push_run("-", self.chars.at(fc).roles),
                '\u{01}' => self.picture(self.chars.at(fc), ctx),
                '\u{08}' => self.content.drawing_count += 1,
                '\t' => self.paragraph.push_run("\t", self.chars.at(fc).roles),
                c if (c as u32) < 0x20 => {}
                c => self
                    .paragraph
                    .push_run(c.encode_utf8(&mut buf), self.chars.at(fc).roles),
            }
        }

        if !self.paragraph.is_blank() {
            self.end_paragraph(ParaProps::default());
        }
        self.flush_table();
        self.content
    }

    fn end_paragraph(&mut self, props: ParaProps) {
        let paragraph = mem::take(&mut self.paragraph);
        if props.in_table {
            let text = paragraph.plain_text();
            if !text.trim().is_empty() {
                self.cell.push(text.trim().to_string());
            }
            return;
        }

        self.flush_table();
        if let Some(node) = paragraph.finish(props.heading_level()) {
            self.content.body.push(node);
        }
    }

    fn end_cell(&mut self, props: ParaProps) {
        if props.row_end {
            self.paragraph = ParagraphBuilder::new();
            self.cell.clear();
            let row = mem::take(&mut self.row);
            if !row.is_empty() {
                self.rows.push(row);
            }
            return;
        }
        // Rows of nested tables flatten into the enclosing row
        if props.inner_row_end {
            self.paragraph = ParagraphBuilder::new();
            return;
        }

        let paragraph = mem::take(&mut self.paragraph);
        let text = paragraph.plain_text();
        if !text.trim().is_empty() {
            self.cell.push(text.trim().to_string());
        }
        self.row.push(mem::take(&mut self.cell).join("\n"));
    }

    fn flush_table(&mut self) {
        if !self.row.is_empty() {
            let row = mem::take(&mut self.row);
            self.rows.push(row);
        }
        if !self.rows.is_empty() {
            let rows = mem::take(&mut self.rows);
            self.content.tables.push(build_grid(rows));
        }
    }

    fn picture(&mut self, props: CharProps, ctx: &mut ExtractContext) {
        let Some(location) = props.pic_location else {
            return;
        };
        let what = format!("picture at {:#x}", location);
        match self.data_stream {
            Some(data) => match picture_bytes(data, location) {
                Some(image) => self.content.images.push(image),
                None => ctx.partial(what, "no supported image data"),
            },
            None => ctx.partial(what, "document has no Data stream"),
        }
    }
}
