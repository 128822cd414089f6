//! Markdown serialization of structural nodes.

use crate::model::{Inline, ListItem, PlaceholderKind, StructuralNode, StyleFlags, TableGrid};
use crate::model::escape_cell;

use super::{collapse_blank_lines, RenderOptions};

/// Serialize a node sequence to Markdown.
pub fn to_markdown(nodes: &[StructuralNode], options: &RenderOptions) -> String {
    MarkdownRenderer::new(options.clone()).render(nodes)
}

/// Markdown renderer.
///
/// Block nodes end with a blank line; `Line` and `Blank` nodes end with a
/// single newline so line-oriented sources keep their shape.
pub struct MarkdownRenderer {
    options: RenderOptions,
}

impl MarkdownRenderer {
    /// Create a new Markdown renderer.
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Render a node sequence.
    pub fn render(&self, nodes: &[StructuralNode]) -> String {
        let mut output = String::new();
        for node in nodes {
            self.render_node(&mut output, node);
        }

        if self.options.collapse_blank_lines {
            output = collapse_blank_lines(&output);
        }
        output
    }

    fn render_node(&self, output: &mut String, node: &StructuralNode) {
        match node {
            StructuralNode::Heading { level, spans } => {
                let level = (*level).clamp(1, self.options.max_heading_level.max(1));
                output.push_str(&"#".repeat(level as usize));
                output.push(' ');
                output.push_str(self.render_inline(spans).trim());
                output.push_str("\n\n");
            }
            StructuralNode::Paragraph { spans } => {
                let text = self.render_inline(spans);
                if text.trim().is_empty() {
                    return;
                }
                output.push_str(&text);
                output.push_str("\n\n");
            }
            StructuralNode::CodeBlock { lines } => {
                output.push_str("```\n");
                for line in lines {
                    output.push_str(line);
                    output.push('\n');
                }
                output.push_str("```\n\n");
            }
            StructuralNode::Table { grid } => self.render_table(output, grid),
            StructuralNode::Image { relative_path, alt } => {
                output.push_str(&format!("![{}]({})\n\n", alt, relative_path));
            }
            StructuralNode::Blank => output.push('\n'),
            StructuralNode::Line { text } => {
                output.push_str(text);
                output.push('\n');
            }
            StructuralNode::List { items } => self.render_list(output, items),
            StructuralNode::Quote { spans } => {
                let text = self.render_inline(spans);
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                output.push_str("> ");
                output.push_str(&text.replace('\n', "\n> "));
                output.push_str("\n\n");
            }
            StructuralNode::Rule => output.push_str("---\n\n"),
            StructuralNode::Placeholder {
                kind,
                count,
                location,
            } => {
                output.push_str(&render_placeholder(*kind, *count, location));
                output.push_str("\n\n");
            }
        }
    }

    fn render_list(&self, output: &mut String, items: &[ListItem]) {
        if items.is_empty() {
            return;
        }
        for item in items {
            output.push_str(&item.marker);
            output.push_str(self.render_inline(&item.content).trim());
            output.push('\n');
        }
        output.push('\n');
    }

    fn render_table(&self, output: &mut String, grid: &TableGrid) {
        if grid.is_empty() {
            return;
        }

        for (i, row) in grid.rows.iter().enumerate() {
            output.push('|');
            for cell in row {
                let content = escape_cell(cell);
                output.push_str(&format!(" {} |", content.trim()));
            }
            output.push('\n');

            // Row 0 is always the header
            if i == 0 {
                output.push('|');
                for _ in row {
                    output.push_str(" --- |");
                }
                output.push('\n');
            }
        }

        output.push('\n');
    }

    fn render_inline(&self, content: &[Inline]) -> String {
        let mut output = String::new();
        for item in content {
            match item {
                Inline::Text(span) => output.push_str(&apply_roles(&span.text, span.roles)),
                Inline::Styled { roles, children } => {
                    output.push_str(&apply_roles(&self.render_inline(children), *roles));
                }
                Inline::LineBreak => output.push('\n'),
                Inline::Link { children, url } => {
                    output.push_str(&format!("[{}]({})", self.render_inline(children), url));
                }
                Inline::Image { alt, src } => {
                    output.push_str(&format!("![{}]({})", alt, src));
                }
            }
        }
        output
    }
}

/// Wrap text in role markers, keeping surrounding whitespace outside them.
fn apply_roles(text: &str, roles: StyleFlags) -> String {
    if roles.is_plain() {
        return text.to_string();
    }

    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }
    let start = text.len() - text.trim_start().len();
    let leading = &text[..start];
    let trailing = &text[start + core.len()..];

    // Innermost first
    let mut result = core.to_string();
    if roles.code {
        result = format!("`{}`", result);
    }
    if roles.strikethrough {
        result = format!("~~{}~~", result);
    }
    if roles.italic {
        result = format!("*{}*", result);
    }
    if roles.bold {
        result = format!("**{}**", result);
    }

    format!("{}{}{}", leading, result, trailing)
}

fn render_placeholder(kind: PlaceholderKind, count: u32, location: &str) -> String {
    if count == 1 {
        format!("[{} extracted: {}]", kind.label(), location)
    } else {
        format!("[{} {}s extracted to {}]", count, kind.label(), location)
    }
}
