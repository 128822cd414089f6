//! Benchmarks for undoc extraction and rendering.
//!
//! Run with: cargo bench
//!
//! Inputs are synthetic and built in memory.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use undoc::model::build_grid;
use undoc::parser::{ExtractContext, HtmlExtractor, PdfExtractor, TextExtractor};
use undoc::render::{to_markdown, RenderOptions};
use undoc::StructuralNode;

/// Creates a minimal synthetic PDF with the given number of pages.
fn create_test_pdf(page_count: usize) -> Vec<u8> {
    let mut content = String::new();
    content.push_str("%PDF-1.4\n");
    content.push_str("1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

    let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", i * 2 + 3)).collect();
    content.push_str(&format!(
        "2 0 obj\n<< /Type /Pages /Kids [{}] /Count {} >>\nendobj\n",
        kids.join(" "),
        page_count
    ));

    let mut next_obj = 3;
    for i in 0..page_count {
        let page_obj = next_obj;
        let content_obj = next_obj + 1;
        next_obj += 2;

        content.push_str(&format!(
            "{} 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R >>\nendobj\n",
            page_obj, content_obj
        ));

        let text = format!(
            "BT /F1 12 Tf 100 700 Td (Page {} benchmark content for undoc.) Tj ET",
            i + 1
        );
        content.push_str(&format!(
            "{} 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            content_obj,
            text.len(),
            text
        ));
    }

    let xref_offset = content.len();
    content.push_str(&format!("xref\n0 {}\n", next_obj));
    content.push_str("0000000000 65535 f \n");
    for _ in 1..next_obj {
        content.push_str("0000000000 00000 n \n");
    }
    content.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        next_obj, xref_offset
    ));

    content.into_bytes()
}

fn create_text(lines: usize) -> String {
    (0..lines)
        .map(|i| match i % 4 {
            0 => format!("{}. Section {}", i / 4 + 1, i),
            1 => "=====".to_string(),
            2 => format!("- item with a [link](http://example.com/{})", i),
            _ => format!("Plain sentence with **bold** and *italic* words {}.", i),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn create_html(paragraphs: usize) -> String {
    let mut html = String::from("<html><body><h1>Benchmark</h1>");
    for i in 0..paragraphs {
        html.push_str(&format!(
            "<p>Paragraph {} with <b>bold</b>, <i>italic</i> and <a href=\"#{}\">a link</a>.</p>",
            i, i
        ));
        if i % 10 == 0 {
            html.push_str("<ul><li>one</li><li>two</li></ul>");
        }
    }
    html.push_str("</body></html>");
    html
}

/// Benchmark the plain-text line heuristics.
fn bench_text_extraction(c: &mut Criterion) {
    let extractor = TextExtractor::new();
    let text = create_text(2000);

    c.bench_function("text_2000_lines", |b| {
        b.iter(|| extractor.extract_str(black_box(&text)));
    });
}

/// Benchmark the HTML tree walk.
fn bench_html_extraction(c: &mut Criterion) {
    let extractor = HtmlExtractor::new();
    let html = create_html(500);

    c.bench_function("html_500_paragraphs", |b| {
        b.iter(|| extractor.extract_str(black_box(&html)));
    });
}

/// Benchmark table grid building and Markdown rendering.
fn bench_table_rendering(c: &mut Criterion) {
    let rows: Vec<Vec<String>> = (0..200)
        .map(|r| (0..(r % 8 + 1)).map(|c| format!("r{}|c{}", r, c)).collect())
        .collect();
    let options = RenderOptions::new();

    c.bench_function("table_200_ragged_rows", |b| {
        b.iter(|| {
            let grid = build_grid(black_box(rows.clone()));
            to_markdown(&[StructuralNode::table(grid)], &options)
        });
    });
}

/// Benchmark PDF extraction at various sizes.
fn bench_pdf_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("pdf_extraction");
    let extractor = PdfExtractor::new().with_images(false);

    for page_count in [1, 5, 10].iter() {
        let data = create_test_pdf(*page_count);

        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| {
                // Synthetic PDFs carry placeholder xref offsets
                let mut ctx = ExtractContext::default();
                let _ = extractor.extract_bytes(black_box(&data), &mut ctx);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_text_extraction,
    bench_html_extraction,
    bench_table_rendering,
    bench_pdf_extraction,
);
criterion_main!(benches);
