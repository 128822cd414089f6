//! Plain text extraction with line-oriented Markdown heuristics.

use std::path::Path;

use regex::Regex;

use crate::error::Result;
use crate::model::StructuralNode;

use super::{read_source, ExtractContext, Extractor};

/// Plain text extractor.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    numbered_heading: Regex,
    numbered_prefix: Regex,
    underline_double: Regex,
    underline_single: Regex,
    bullet_item: Regex,
    nested_item: Regex,
    bold: Regex,
    italic: Regex,
    link: Regex,
    image: Regex,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of the heading step for one line.
#[derive(Debug, PartialEq)]
enum HeadingStep {
    Unchanged,
    /// `===` / `---` under a title
    Underline,
    Heading(String),
}

impl TextExtractor {
    /// Create a text extractor.
    pub fn new() -> Self {
        Self {
            numbered_heading: Regex::new(r"^\d+\.\s+.+").unwrap(),
            numbered_prefix: Regex::new(r"^\d+\.\s+").unwrap(),
            underline_double: Regex::new(r"^=+$").unwrap(),
            underline_single: Regex::new(r"^-+$").unwrap(),
            bullet_item: Regex::new(r"^[*+\-]\s+.+").unwrap(),
            nested_item: Regex::new(r"^\s+[*+\-\d.]\s+.+").unwrap(),
            bold: Regex::new(r"\*\*(.+?)\*\*").unwrap(),
            italic: Regex::new(r"\*(.+?)\*").unwrap(),
            link: Regex::new(r"\[(.*?)\]\((.*?)\)").unwrap(),
            image: Regex::new(r"!\[(.*?)\]\((.*?)\)").unwrap(),
        }
    }

    /// Extract nodes from text, one decision per line.
    pub fn extract_str(&self, text: &str) -> Vec<StructuralNode> {
        let text = text.trim_start_matches('\u{FEFF}');
        let mut nodes = Vec::new();
        let mut in_code_block = false;

        for line in text.lines() {
            if line.trim().is_empty() {
                nodes.push(StructuralNode::Blank);
                continue;
            }

            match self.heading(line) {
                HeadingStep::Underline => {
                    nodes.push(StructuralNode::Blank);
                    continue;
                }
                HeadingStep::Heading(title) => {
                    // A heading line, not a block: no blank line follows it
                    nodes.push(StructuralNode::Line {
                        text: format!("# {}", title),
                    });
                    continue;
                }
                HeadingStep::Unchanged => {}
            }

            // Markdown list lines pass through untouched
            let processed = if self.is_list_item(line) {
                line.to_string()
            } else {
                self.emphasis(line)
            };

            if processed.starts_with("```") {
                in_code_block = !in_code_block;
            }
            let processed = if in_code_block {
                processed
            } else {
                self.links(&processed)
            };

            nodes.push(StructuralNode::Line { text: processed });
        }

        log::debug!("Text: {} nodes", nodes.len());
        nodes
    }

    fn heading(&self, line: &str) -> HeadingStep {
        if line.starts_with('#') {
            return HeadingStep::Unchanged;
        }
        if self.underline_double.is_match(line) || self.underline_single.is_match(line) {
            return HeadingStep::Underline;
        }
        if self.numbered_heading.is_match(line) {
            let title = self.numbered_prefix.replace(line, "");
            return HeadingStep::Heading(title.into_owned());
        }
        HeadingStep::Unchanged
    }

    fn is_list_item(&self, line: &str) -> bool {
        self.bullet_item.is_match(line)
            || self.numbered_heading.is_match(line)
            || self.nested_item.is_match(line)
    }

    /// Rewrite emphasis markers into canonical form.
    fn emphasis(&self, line: &str) -> String {
        let line = self.bold.replace_all(line, "**${1}**");
        self.italic.replace_all(&line, "*${1}*").into_owned()
    }

    /// Rewrite links and images into canonical form.
    fn links(&self, line: &str) -> String {
        let line = self.link.replace_all(line, "[${1}](${2})");
        self.image.replace_all(&line, "![${1}](${2})").into_owned()
    }
}

impl Extractor for TextExtractor {
    fn name(&self) -> &str {
        "text"
    }

    fn extract(&self, path: &Path, _ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>> {
        let data = read_source(path)?;
        Ok(self.extract_str(&String::from_utf8_lossy(&data)))
    }
}
