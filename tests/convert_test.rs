//! Integration tests for the converter: dispatch, output files and batches.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::DynamicImage;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use undoc::{sidecar_path, ConvertOptions, ConvertOutcome, Converter, Error, OutputFormat};

fn write_input(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn docx_with_image(title: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>"#,
        title
    );
    let mut png = Vec::new();
    DynamicImage::new_rgb8(1, 1)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.start_file("word/media/image1.png", options).unwrap();
    writer.write_all(&png).unwrap();
    writer.finish().unwrap().into_inner()
}

#[test]
fn test_html_heading_and_bold() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "page.HTML",
        b"<html><body><h2>Title</h2><p>Hello <b>world</b></p></body></html>",
    );
    let output = dir.path().join("page.md");

    undoc::convert(&input, &output).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "## Title\n\nHello **world**\n\n"
    );
}

#[test]
fn test_html_escapes_text_once() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "a.htm", b"<p>2 * 3 = [six]</p>");
    let output = dir.path().join("a.md");

    Converter::default().convert(&input, &output).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "2 \\* 3 = \\[six\\]\n\n"
    );
}

#[test]
fn test_plain_text_underline_is_blank() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "notes.txt", b"Notes\n====\n1. Scope\n- item");
    let output = dir.path().join("notes.md");

    Converter::default().convert(&input, &output).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "Notes\n\n# Scope\n- item\n"
    );
}

#[test]
fn test_unsupported_extension_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "deck.pptx", b"PK");
    let output = dir.path().join("deck.md");

    let outcome = undoc::convert(&input, &output).unwrap();
    assert_eq!(outcome, ConvertOutcome::Skipped { input: input.clone() });
    assert!(!output.exists());
}

#[test]
fn test_missing_input_is_source_read() {
    let dir = tempfile::tempdir().unwrap();
    let err = Converter::default()
        .convert(&dir.path().join("gone.docx"), &dir.path().join("gone.md"))
        .unwrap_err();
    assert!(matches!(err, Error::SourceRead(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_convert_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "readme.txt", b"hello");

    let written = Converter::default().convert_sidecar(&input).unwrap();
    assert_eq!(written, sidecar_path(&input));
    assert_eq!(fs::read_to_string(&written).unwrap(), "hello\n");
}

#[test]
fn test_media_written_under_media_root() {
    let dir = tempfile::tempdir().unwrap();
    let media = dir.path().join("media");
    let input = write_input(dir.path(), "doc.docx", &docx_with_image("Body"));
    let output = dir.path().join("doc.md");

    let converter = Converter::new(ConvertOptions::new().with_media_root(&media));
    converter.convert(&input, &output).unwrap();

    assert!(media.join("images/image_0.png").exists());
    let markdown = fs::read_to_string(&output).unwrap();
    assert!(markdown.contains("](images/image_0.png)"));
}

#[test]
fn test_naming_restarts_for_each_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_input(dir.path(), "one.docx", &docx_with_image("One"));
    let second = write_input(dir.path(), "two.docx", &docx_with_image("Two"));

    let converter = Converter::new(ConvertOptions::new().with_media_root(dir.path()));
    let a = converter.convert(&first, &dir.path().join("one.md")).unwrap();
    let b = converter.convert(&second, &dir.path().join("two.md")).unwrap();

    assert_eq!(
        a.report().unwrap().media_files,
        b.report().unwrap().media_files
    );
}

#[test]
fn test_batch_uses_separate_media_roots() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write_input(dir.path(), "alpha.docx", &docx_with_image("Alpha")),
        write_input(dir.path(), "beta.docx", &docx_with_image("Beta")),
        write_input(dir.path(), "gamma.txt", b"plain"),
        write_input(dir.path(), "skip.odt", b"?"),
    ];

    let results = Converter::default().convert_batch(&inputs);
    assert_eq!(results.len(), 4);
    for (input, result) in &results {
        assert!(result.is_ok(), "{} failed", input.display());
    }
    assert!(results[3].1.as_ref().unwrap().is_skipped());

    assert!(dir.path().join("alpha_media/images/image_0.png").exists());
    assert!(dir.path().join("beta_media/images/image_0.png").exists());
    let alpha = fs::read_to_string(dir.path().join("alpha.md")).unwrap();
    assert!(alpha.contains("](alpha_media/images/image_0.png)"));
    assert_eq!(
        fs::read_to_string(dir.path().join("gamma.md")).unwrap(),
        "plain\n"
    );
    assert!(!dir.path().join("skip.md").exists());
}

#[test]
fn test_json_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "page.html", b"<h1>Doc</h1>");
    let output = dir.path().join("page.json");

    let converter = Converter::new(ConvertOptions::new().with_format(OutputFormat::Json));
    converter.convert(&input, &output).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json[0]["type"], "heading");
    assert_eq!(json[0]["level"], 1);
}
