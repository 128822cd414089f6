//! HTML extraction: a depth-first walk over the scraper DOM.
//!
//! Block tags produce nodes directly; inline tags build the spans of the
//! paragraph being collected. Inside list items, quotes and inline tags,
//! block tags degrade to line breaks.

use std::mem;
use std::path::Path;

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::Result;
use crate::model::{Inline, ListItem, StructuralNode, StyleFlags};

use super::{read_source, ExtractContext, Extractor};

/// Tags whose content never reaches the output.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

/// Tags that break the line when met in an inline context.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "ol", "p",
    "pre", "section", "table", "tr", "ul",
];

/// HTML extractor.
#[derive(Debug, Clone, Default)]
pub struct HtmlExtractor;

impl HtmlExtractor {
    /// Create an HTML extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract nodes from an HTML string.
    pub fn extract_str(&self, html: &str) -> Vec<StructuralNode> {
        let document = Html::parse_document(html);
        let root = Selector::parse("body")
            .ok()
            .and_then(|body| document.select(&body).next())
            .unwrap_or_else(|| document.root_element());

        let mut walker = HtmlWalker::default();
        walker.block_children(root);
        walker.flush();
        log::debug!("HTML: {} nodes", walker.nodes.len());
        walker.nodes
    }
}

impl Extractor for HtmlExtractor {
    fn name(&self) -> &str {
        "html"
    }

    fn extract(&self, path: &Path, _ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>> {
        let data = read_source(path)?;
        Ok(self.extract_str(&String::from_utf8_lossy(&data)))
    }
}

struct HtmlWalker {
    nodes: Vec<StructuralNode>,
    /// Inline content of the paragraph being collected
    pending: Vec<Inline>,
    /// Whether the last emitted character was a space or a line start
    at_space: bool,
}

impl Default for HtmlWalker {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            pending: Vec::new(),
            at_space: true,
        }
    }
}

impl HtmlWalker {
    fn block_children(&mut self, element: ElementRef) {
        for child in element.children() {
            if let Some(child) = ElementRef::wrap(child) {
                self.block_element(child);
            } else if let Node::Text(text) = child.value() {
                let mut pending = mem::take(&mut self.pending);
                self.push_text(&mut pending, text, true);
                self.pending = pending;
            }
        }
    }

    fn block_element(&mut self, element: ElementRef) {
        let name = element.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                self.flush();
                let text = normalize(&element.text().collect::<String>());
                if !text.is_empty() {
                    let level = name[1..].parse().unwrap_or(1);
                    self.nodes.push(StructuralNode::heading(level, text));
                }
            }
            "p" => {
                self.flush();
                let spans = self.inline_children(element);
                if !is_blank(&spans) {
                    self.nodes.push(StructuralNode::Paragraph { spans });
                }
            }
            "br" => {
                self.pending.push(Inline::LineBreak);
                self.at_space = true;
            }
            "hr" => {
                self.flush();
                self.nodes.push(StructuralNode::Rule);
            }
            "pre" => {
                self.flush();
                let text: String = element.text().collect();
                let text = text.strip_prefix('\n').unwrap_or(&text).trim_end();
                if !text.trim().is_empty() {
                    let lines = text.lines().map(String::from).collect();
                    self.nodes.push(StructuralNode::CodeBlock { lines });
                }
            }
            "ul" | "ol" => {
                self.flush();
                let items = self.list_items(element, name == "ol");
                if !items.is_empty() {
                    self.nodes.push(StructuralNode::List { items });
                }
            }
            "blockquote" => {
                self.flush();
                let spans = self.inline_children(element);
                if !is_blank(&spans) {
                    self.nodes.push(StructuralNode::Quote { spans });
                }
            }
            // Only consumed by its list
            "li" => {}
            tag if SKIPPED_TAGS.contains(&tag) => {}
            "strong" | "b" | "em" | "i" | "code" | "a" | "img" => {
                let mut pending = mem::take(&mut self.pending);
                self.inline_element(element, &mut pending);
                self.pending = pending;
            }
            _ => self.block_children(element),
        }
    }

    fn list_items(&mut self, list: ElementRef, ordered: bool) -> Vec<ListItem> {
        let mut items = Vec::new();
        for item in list
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "li")
        {
            let content = self.inline_children(item);
            let marker = if ordered {
                format!("{}. ", items.len() + 1)
            } else {
                "* ".to_string()
            };
            items.push(ListItem::new(marker, content));
        }
        items
    }

    /// Inline content of an element, starting a new line.
    fn inline_children(&mut self, element: ElementRef) -> Vec<Inline> {
        self.at_space = true;
        let mut spans = self.collect_inline(element);
        trim_trailing(&mut spans);
        self.at_space = true;
        spans
    }

    fn collect_inline(&mut self, element: ElementRef) -> Vec<Inline> {
        let mut out = Vec::new();
        self.inline_children_into(element, &mut out);
        out
    }

    fn inline_children_into(&mut self, element: ElementRef, out: &mut Vec<Inline>) {
        for child in element.children() {
            if let Some(child) = ElementRef::wrap(child) {
                self.inline_element(child, out);
            } else if let Node::Text(text) = child.value() {
                self.push_text(out, text, true);
            }
        }
    }

    fn inline_element(&mut self, element: ElementRef, out: &mut Vec<Inline>) {
        let name = element.value().name();
        match name {
            "strong" | "b" => self.push_styled(element, StyleFlags::bold(), out),
            "em" | "i" => self.push_styled(element, StyleFlags::italic(), out),
            "code" => {
                let mut code = Vec::new();
                self.push_text(&mut code, &element.text().collect::<String>(), false);
                if let Some(Inline::Text(span)) = code.pop() {
                    out.push(Inline::styled_text(span.text, StyleFlags::code()));
                }
            }
            "a" => {
                let children = self.collect_inline(element);
                let url = element.value().attr("href").unwrap_or_default().to_string();
                out.push(Inline::Link { children, url });
            }
            "img" => {
                let value = element.value();
                out.push(Inline::Image {
                    alt: value.attr("alt").unwrap_or_default().to_string(),
                    src: value.attr("src").unwrap_or_default().to_string(),
                });
                self.at_space = false;
            }
            "br" => {
                out.push(Inline::LineBreak);
                self.at_space = true;
            }
            tag if SKIPPED_TAGS.contains(&tag) => {}
            tag if BLOCK_TAGS.contains(&tag) => {
                self.line_break(out);
                if tag != "hr" {
                    self.inline_children_into(element, out);
                    self.line_break(out);
                }
            }
            _ => self.inline_children_into(element, out),
        }
    }

    fn push_styled(&mut self, element: ElementRef, roles: StyleFlags, out: &mut Vec<Inline>) {
        let children = self.collect_inline(element);
        if !children.is_empty() {
            out.push(Inline::Styled { roles, children });
        }
    }

    /// Append text with whitespace runs collapsed against what came before.
    fn push_text(&mut self, out: &mut Vec<Inline>, text: &str, escape: bool) {
        let mut collapsed = String::with_capacity(text.len());
        for c in text.chars() {
            if c.is_ascii_whitespace() {
                if !self.at_space {
                    collapsed.push(' ');
                    self.at_space = true;
                }
            } else {
                collapsed.push(c);
                self.at_space = false;
            }
        }
        if collapsed.is_empty() {
            return;
        }

        let collapsed = if escape {
            escape_markdown(&collapsed)
        } else {
            collapsed
        };
        if let Some(Inline::Text(span)) = out.last_mut() {
            if span.roles.is_plain() {
                span.text.push_str(&collapsed);
                return;
            }
        }
        out.push(Inline::text(collapsed));
    }

    fn line_break(&mut self, out: &mut Vec<Inline>) {
        trim_trailing(out);
        if !out.is_empty() {
            out.push(Inline::LineBreak);
        }
        self.at_space = true;
    }

    /// Emit the pending inline content as a paragraph.
    fn flush(&mut self) {
        let mut spans = mem::take(&mut self.pending);
        trim_trailing(&mut spans);
        if !is_blank(&spans) {
            self.nodes.push(StructuralNode::Paragraph { spans });
        }
        self.at_space = true;
    }
}

/// Escape Markdown emphasis, code and link characters.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '_' | '`' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn normalize(text: &str) -> String {
    text.split_ascii_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop trailing whitespace and line breaks.
fn trim_trailing(spans: &mut Vec<Inline>) {
    while let Some(last) = spans.last_mut() {
        let now_empty = match last {
            Inline::LineBreak => true,
            Inline::Text(span) => {
                let len = span.text.trim_end().len();
                span.text.truncate(len);
                span.text.is_empty()
            }
            Inline::Styled { children, .. } => {
                trim_trailing(children);
                children.is_empty()
            }
            Inline::Link { .. } | Inline::Image { .. } => false,
        };
        if now_empty {
            spans.pop();
        } else {
            break;
        }
    }
}

fn is_blank(spans: &[Inline]) -> bool {
    spans.iter().all(|span| match span {
        Inline::LineBreak => true,
        Inline::Text(_) | Inline::Styled { .. } => span.plain_text().trim().is_empty(),
        Inline::Link { .. } | Inline::Image { .. } => false,
    })
}
