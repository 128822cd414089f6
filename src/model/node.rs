//! Structural nodes: the canonical output of every extractor.

use serde::{Deserialize, Serialize};

use super::span::{StyleFlags, StyledSpan};
use super::table::TableGrid;

/// Inline content inside a heading, paragraph, list item or quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    /// A styled run of text
    Text(StyledSpan),
    /// Nested content sharing roles (markup formats)
    Styled {
        /// Roles applied to all children
        roles: StyleFlags,
        /// Wrapped content
        children: Vec<Inline>,
    },
    /// Hard line break
    LineBreak,
    /// Hyperlink
    Link {
        /// Link text
        children: Vec<Inline>,
        /// Target URL
        url: String,
    },
    /// Inline image reference
    Image {
        /// Alternative text
        alt: String,
        /// Image source
        src: String,
    },
}

impl Inline {
    /// Plain text content.
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text(StyledSpan::plain(text))
    }

    /// Text with roles.
    pub fn styled_text(text: impl Into<String>, roles: StyleFlags) -> Self {
        Inline::Text(StyledSpan::styled(text, roles))
    }

    /// Visible text without any markup.
    pub fn plain_text(&self) -> String {
        match self {
            Inline::Text(span) => span.text.clone(),
            Inline::Styled { children, .. } | Inline::Link { children, .. } => {
                children.iter().map(Inline::plain_text).collect()
            }
            Inline::LineBreak => "\n".to_string(),
            Inline::Image { alt, .. } => alt.clone(),
        }
    }
}

/// One entry of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    /// Marker including its trailing space (`"* "`, `"3. "`, `"- "`)
    pub marker: String,
    /// Item content
    pub content: Vec<Inline>,
}

impl ListItem {
    /// Create a list item.
    pub fn new(marker: impl Into<String>, content: Vec<Inline>) -> Self {
        Self {
            marker: marker.into(),
            content,
        }
    }
}

/// Kind of non-text content reduced to a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderKind {
    /// Shapes, charts, drawn objects
    Drawing,
    /// Embedded equations
    Equation,
}

impl PlaceholderKind {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            PlaceholderKind::Drawing => "Drawing",
            PlaceholderKind::Equation => "Equation",
        }
    }
}

/// One semantic unit of output, independent of the source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuralNode {
    /// A heading (level 1-6)
    Heading {
        /// Heading level, always within 1..=6
        level: u8,
        /// Heading content
        spans: Vec<Inline>,
    },
    /// A paragraph
    Paragraph {
        /// Paragraph content
        spans: Vec<Inline>,
    },
    /// A fenced code block
    CodeBlock {
        /// Code lines with their indentation
        lines: Vec<String>,
    },
    /// A table
    Table {
        /// Padded cell grid, row 0 is the header
        grid: TableGrid,
    },
    /// A block image
    Image {
        /// Path written into the Markdown link
        relative_path: String,
        /// Alternative text
        alt: String,
    },
    /// A blank output line
    Blank,
    /// A verbatim output line
    Line {
        /// Line content
        text: String,
    },
    /// A list
    List {
        /// List entries in order
        items: Vec<ListItem>,
    },
    /// A block quote
    Quote {
        /// Quote content
        spans: Vec<Inline>,
    },
    /// A horizontal rule
    Rule,
    /// Non-text content noted but not reconstructed
    Placeholder {
        /// What was found
        kind: PlaceholderKind,
        /// How many objects the marker stands for
        count: u32,
        /// Where the extracted content was written
        location: String,
    },
}

impl StructuralNode {
    /// Create a heading, clamping the level into 1..=6.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        StructuralNode::Heading {
            level: level.clamp(1, 6),
            spans: vec![Inline::text(text)],
        }
    }

    /// Create a paragraph with plain text.
    pub fn paragraph(text: impl Into<String>) -> Self {
        StructuralNode::Paragraph {
            spans: vec![Inline::text(text)],
        }
    }

    /// Create a table node.
    pub fn table(grid: TableGrid) -> Self {
        StructuralNode::Table { grid }
    }

    /// Create an image node.
    pub fn image(relative_path: impl Into<String>, alt: impl Into<String>) -> Self {
        StructuralNode::Image {
            relative_path: relative_path.into(),
            alt: alt.into(),
        }
    }

    /// Heading level, or `None` for other nodes.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            StructuralNode::Heading { level, .. } => Some(*level),
            _ => None,
        }
    }

    /// Whether this node is a heading.
    pub fn is_heading(&self) -> bool {
        self.heading_level().is_some()
    }

    /// Whether this node is a paragraph.
    pub fn is_paragraph(&self) -> bool {
        matches!(self, StructuralNode::Paragraph { .. })
    }

    /// Visible text of the node without markup.
    pub fn plain_text(&self) -> String {
        fn join(spans: &[Inline]) -> String {
            spans.iter().map(Inline::plain_text).collect()
        }

        match self {
            StructuralNode::Heading { spans, .. }
            | StructuralNode::Paragraph { spans }
            | StructuralNode::Quote { spans } => join(spans),
            StructuralNode::CodeBlock { lines } => lines.join("\n"),
            StructuralNode::Table { grid } => grid
                .rows
                .iter()
                .map(|r| r.join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
            StructuralNode::Image { alt, .. } => alt.clone(),
            StructuralNode::Line { text } => text.clone(),
            StructuralNode::List { items } => items
                .iter()
                .map(|i| join(&i.content))
                .collect::<Vec<_>>()
                .join("\n"),
            StructuralNode::Blank | StructuralNode::Rule | StructuralNode::Placeholder { .. } => {
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_level_clamped() {
        assert_eq!(StructuralNode::heading(0, "a").heading_level(), Some(1));
        assert_eq!(StructuralNode::heading(9, "a").heading_level(), Some(6));
        assert_eq!(StructuralNode::heading(3, "a").heading_level(), Some(3));
        assert_eq!(StructuralNode::paragraph("a").heading_level(), None);
    }

    #[test]
    fn test_plain_text() {
        let node = StructuralNode::Paragraph {
            spans: vec![
                Inline::text("Hello "),
                Inline::Styled {
                    roles: StyleFlags::bold(),
                    children: vec![Inline::text("world")],
                },
            ],
        };
        assert_eq!(node.plain_text(), "Hello world");
        assert!(node.is_paragraph());
    }

    #[test]
    fn test_serde_tagging() {
        let node = StructuralNode::heading(2, "Title");
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"type\":\"heading\""));
        let back: StructuralNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
