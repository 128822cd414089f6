//! End-to-end conversion of fixtures built at runtime, one per format.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use undoc::{ConvertOptions, Converter, Error, OcrEngine, Result, SourceFormat};

fn zip_package(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in parts {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn png_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::new_rgb8(2, 2)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn xlsx_package() -> Vec<u8> {
    let content_types = br#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#;
    let root_rels = br#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;
    let workbook = br#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;
    let workbook_rels = br#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#;
    let sheet = br#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>Name</t></is></c><c r="B1" t="inlineStr"><is><t>Age</t></is></c></row>
<row r="2"><c r="A2" t="inlineStr"><is><t>Alice</t></is></c><c r="B2"><v>30</v></c></row>
</sheetData>
</worksheet>"#;

    zip_package(&[
        ("[Content_Types].xml", content_types),
        ("_rels/.rels", root_rels),
        ("xl/workbook.xml", workbook),
        ("xl/_rels/workbook.xml.rels", workbook_rels),
        ("xl/worksheets/sheet1.xml", sheet),
    ])
}

fn docx_package() -> Vec<u8> {
    let document = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Quarterly Report</w:t></w:r></w:p>
<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>Revenue</w:t></w:r><w:r><w:t xml:space="preserve"> grew.</w:t></w:r></w:p>
<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Region</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Total</w:t></w:r></w:p></w:tc></w:tr>
<w:tr><w:tc><w:p><w:r><w:t>North</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>12</w:t></w:r></w:p></w:tc></w:tr></w:tbl>
</w:body></w:document>"#;
    let png = png_bytes();
    zip_package(&[
        ("word/document.xml", document),
        ("word/media/image1.png", &png),
    ])
}

/// One-page PDF with a Helvetica `F1` font and the given content stream.
fn pdf_with_content(operations: Vec<Operation>, compress: bool) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content { operations };
    let mut stream = Stream::new(dictionary! {}, content.encode().unwrap());
    if compress {
        stream.compress().unwrap();
        assert!(stream.dict.get(b"Filter").is_ok(), "fixture stream not compressed");
    }
    let content_id = doc.add_object(stream);
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Text lines as `(text, x, y, size)`, each in its own BT block.
fn text_ops(lines: &[(&str, i64, i64, i64)]) -> Vec<Operation> {
    let mut ops = Vec::new();
    for (text, x, y, size) in lines {
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("Tf", vec!["F1".into(), (*size).into()]));
        ops.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
        ops.push(Operation::new("ET", vec![]));
    }
    ops
}

fn stroke_line(ops: &mut Vec<Operation>, from: (i64, i64), to: (i64, i64)) {
    ops.push(Operation::new("m", vec![from.0.into(), from.1.into()]));
    ops.push(Operation::new("l", vec![to.0.into(), to.1.into()]));
    ops.push(Operation::new("S", vec![]));
}

fn pdf_bytes() -> Vec<u8> {
    pdf_with_content(text_ops(&[("Hello PDF", 72, 700, 12)]), false)
}

const LABEL_VALUE: [(&str, i64, i64, i64); 6] = [
    ("Name:", 72, 700, 12),
    ("Alice", 150, 700, 12),
    ("Role:", 72, 680, 12),
    ("Engineer", 150, 680, 12),
    ("Team:", 72, 660, 12),
    ("Core", 150, 660, 12),
];

fn convert_pdf(bytes: &[u8]) -> String {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "doc.pdf", bytes);
    let output = dir.path().join("doc.md");

    let converter = Converter::new(ConvertOptions::new().with_media_root(dir.path()));
    let outcome = converter.convert(&input, &output).unwrap();
    assert!(outcome.report().unwrap().warnings.is_empty());
    fs::read_to_string(&output).unwrap()
}

fn write_input(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_xlsx_sheet_table() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "people.xlsx", &xlsx_package());
    let output = dir.path().join("people.md");

    let converter = Converter::new(ConvertOptions::new().with_media_root(dir.path()));
    let outcome = converter.convert(&input, &output).unwrap();
    assert_eq!(outcome.report().unwrap().format, SourceFormat::Spreadsheet);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "## Sheet1\n\n| Name | Age |\n| --- | --- |\n| Alice | 30 |\n\n"
    );
}

#[test]
fn test_xlsx_without_sheet_names() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "people.xlsx", &xlsx_package());
    let output = dir.path().join("people.md");

    let options = ConvertOptions::new()
        .with_media_root(dir.path())
        .with_sheet_names(false);
    Converter::new(options).convert(&input, &output).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "| Name | Age |\n| --- | --- |\n| Alice | 30 |\n\n"
    );
}

#[test]
fn test_docx_structure_and_media() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "report.docx", &docx_package());
    let output = dir.path().join("report.md");

    let converter = Converter::new(ConvertOptions::new().with_media_root(dir.path()));
    let outcome = converter.convert(&input, &output).unwrap();
    let report = outcome.report().unwrap();
    assert_eq!(report.media_files.len(), 1);
    assert!(report.warnings.is_empty());

    let markdown = fs::read_to_string(&output).unwrap();
    assert!(markdown.starts_with("# Quarterly Report\n\n"));
    assert!(markdown.contains("**Revenue** grew."));
    assert!(markdown.contains("| Region | Total |\n| --- | --- |\n| North | 12 |"));
    assert!(markdown.contains("](images/image_0.png)"));
    assert!(dir.path().join("images/image_0.png").exists());
}

#[test]
fn test_pdf_text_without_headings() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "hello.pdf", &pdf_bytes());
    let output = dir.path().join("hello.md");

    let converter = Converter::new(ConvertOptions::new().with_media_root(dir.path()));
    converter.convert(&input, &output).unwrap();

    let markdown = fs::read_to_string(&output).unwrap();
    assert!(markdown.contains("Hello PDF"));
    assert!(!markdown.contains('#'));
}

#[test]
fn test_pdf_multiline_uncompressed() {
    let bytes = pdf_with_content(
        text_ops(&[
            ("First line", 72, 700, 12),
            ("Second line", 72, 686, 12),
            ("Third line", 72, 672, 12),
        ]),
        false,
    );
    assert_eq!(
        convert_pdf(&bytes),
        "First line Second line Third line\n\n"
    );
}

#[test]
fn test_pdf_multiline_flate_compressed() {
    let lines: Vec<String> = (1..=20).map(|i| format!("Compressed body line {}", i)).collect();
    let specs: Vec<(&str, i64, i64, i64)> = lines
        .iter()
        .enumerate()
        .map(|(i, text)| (text.as_str(), 72, 720 - 14 * i as i64, 11))
        .collect();
    let markdown = convert_pdf(&pdf_with_content(text_ops(&specs), true));

    assert!(markdown.starts_with("Compressed body line 1 Compressed body line 2 "));
    assert!(markdown.contains("Compressed body line 20"));
    assert!(!markdown.contains('#'));
    assert!(!markdown.contains('|'));
}

#[test]
fn test_pdf_label_value_lines_stay_paragraph() {
    let markdown = convert_pdf(&pdf_with_content(text_ops(&LABEL_VALUE), false));
    assert_eq!(
        markdown,
        "Name: Alice Role: Engineer Team: Core\n\n"
    );
}

#[test]
fn test_pdf_ruled_grid_becomes_table() {
    let mut ops = Vec::new();
    for y in [714, 694, 674, 654] {
        stroke_line(&mut ops, (66, y), (260, y));
    }
    for x in [66, 144, 260] {
        stroke_line(&mut ops, (x, 654), (x, 714));
    }
    ops.extend(text_ops(&LABEL_VALUE));

    let markdown = convert_pdf(&pdf_with_content(ops, false));
    assert_eq!(
        markdown,
        "| Name: | Alice |\n| --- | --- |\n| Role: | Engineer |\n| Team: | Core |\n\n"
    );
}

#[test]
fn test_pdf_five_sizes_give_heading_levels() {
    let bytes = pdf_with_content(
        text_ops(&[
            ("Title", 72, 740, 28),
            ("Chapter", 72, 700, 24),
            ("Section", 72, 660, 20),
            ("Topic", 72, 620, 18),
            ("Minor", 72, 590, 16),
            ("Body text here", 72, 560, 11),
        ]),
        false,
    );
    assert_eq!(
        convert_pdf(&bytes),
        "# Title\n\n## Chapter\n\n### Section\n\n#### Topic\n\n##### Minor\n\nBody text here\n\n"
    );
}

#[test]
fn test_corrupt_pdf_is_source_read() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "broken.pdf", b"%PDF-1.4 truncated");
    let output = dir.path().join("broken.md");

    let err = Converter::default().convert(&input, &output).unwrap_err();
    assert!(matches!(err, Error::SourceRead(_)));
    assert!(!output.exists());
}

struct MockOcr;

impl OcrEngine for MockOcr {
    fn name(&self) -> &str {
        "mock"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<String> {
        Ok("INVOICE\n\n1. Widget\n\nThank you".to_string())
    }
}

#[test]
fn test_image_through_mock_ocr() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "scan.png", &png_bytes());
    let output = dir.path().join("scan.md");

    let converter = Converter::with_ocr_engine(
        ConvertOptions::new().with_media_root(dir.path()),
        Arc::new(MockOcr),
    );
    converter.convert(&input, &output).unwrap();

    let markdown = fs::read_to_string(&output).unwrap();
    assert!(markdown.starts_with("# scan.png\n\n"));
    assert!(markdown.contains("## Extracted text\n\n"));
    assert!(markdown.contains("**INVOICE**\n\n"));
    assert!(markdown.contains("- 1. Widget\n"));
    assert!(markdown.contains("Thank you\n\n"));
}

#[test]
fn test_ocr_report_for_many_images() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_input(dir.path(), "a.png", &png_bytes());
    let second = write_input(dir.path(), "b.png", &png_bytes());

    let converter = Converter::with_ocr_engine(ConvertOptions::new(), Arc::new(MockOcr));
    let nodes = converter
        .image_extractor()
        .extract_many(&[first, second])
        .unwrap();
    let markdown = undoc::render::to_markdown(&nodes, &undoc::RenderOptions::new());

    assert!(markdown.starts_with("# Image text extraction results\n\n"));
    assert!(markdown.contains("## Image 1\n\n"));
    assert!(markdown.contains("## Image 2\n\n"));
    assert_eq!(markdown.matches("### Extracted text").count(), 2);
    assert_eq!(markdown.matches("---\n").count(), 2);
}
