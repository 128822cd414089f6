//! Turns sorted text runs into structural nodes.
//!
//! The flow is a two-state machine. In [`FlowState::Prose`] runs accumulate
//! into a paragraph; a run set in a code-family font switches to
//! [`FlowState::Code`], where runs accumulate into the lines of a code block
//! until a heading or a non-code run switches back.

use crate::heading::FontSizeHistogram;
use crate::model::{Inline, RawTextRun, StructuralNode, StyleFlags, StyledSpan, TableGrid};
use crate::style;

/// Horizontal units per space of code indentation.
const INDENT_UNIT: f32 = 5.0;

/// The runs and tables of one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Text runs outside any table
    pub runs: Vec<RawTextRun>,
    /// Tables detected on the page
    pub tables: Vec<TableGrid>,
}

/// Sort runs top to bottom, then left to right (PDF y grows upward).
pub fn sort_runs(runs: &mut [RawTextRun]) {
    runs.sort_by(|a, b| {
        a.page_index
            .cmp(&b.page_index)
            .then(b.y.total_cmp(&a.y))
            .then(a.x.total_cmp(&b.x))
    });
}

/// Assemble the node sequence of a document.
///
/// Each page's tables follow that page's text.
pub fn assemble(pages: Vec<PageContent>, histogram: &FontSizeHistogram) -> Vec<StructuralNode> {
    let mut assembler = Assembler::new(histogram);
    for mut page in pages {
        sort_runs(&mut page.runs);
        for run in &page.runs {
            assembler.push(run);
        }
        assembler.finish_page(page.tables);
    }
    assembler.nodes
}

/// Where the flow currently is.
#[derive(Debug)]
enum FlowState {
    Prose(OpenParagraph),
    Code(OpenCode),
}

#[derive(Debug, Default)]
struct OpenParagraph {
    spans: Vec<Inline>,
    size_key: Option<i32>,
    last_roles: StyleFlags,
}

#[derive(Debug)]
struct OpenCode {
    start_x: f32,
    last_y: f32,
    lines: Vec<String>,
}

struct Assembler<'h> {
    histogram: &'h FontSizeHistogram,
    state: FlowState,
    nodes: Vec<StructuralNode>,
    /// Level, page and baseline of the last heading run, for same-line merging
    last_heading: Option<(u8, u32, f32)>,
}

impl<'h> Assembler<'h> {
    fn new(histogram: &'h FontSizeHistogram) -> Self {
        Self {
            histogram,
            state: FlowState::Prose(OpenParagraph::default()),
            nodes: Vec::new(),
            last_heading: None,
        }
    }

    fn push(&mut self, run: &RawTextRun) {
        let text = run.text.replace("\r\n", " ").replace('\n', " ");
        let text = text.trim();

        if text.is_empty() {
            self.on_blank();
            return;
        }

        let level = self.histogram.level(run.font_size);
        if level > 0 {
            self.on_heading(level, text, run);
            return;
        }
        self.last_heading = None;

        let roles = style::classify(&run.font_family);
        if roles.code {
            self.on_code(text, run);
        } else {
            self.on_prose(text, run, roles);
        }
    }

    fn on_blank(&mut self) {
        self.last_heading = None;
        if let FlowState::Code(code) = &mut self.state {
            code.lines.push(String::new());
        } else {
            self.flush();
        }
    }

    fn on_heading(&mut self, level: u8, text: &str, run: &RawTextRun) {
        if let Some((last_level, page, y)) = self.last_heading {
            let same_line = page == run.page_index && (y - run.y).abs() <= run.font_size * 0.5;
            if last_level == level && same_line {
                if let Some(StructuralNode::Heading { spans, .. }) = self.nodes.last_mut() {
                    spans.push(Inline::text(format!(" {}", text)));
                    return;
                }
            }
        }

        self.flush();
        self.nodes.push(StructuralNode::heading(level, text));
        self.last_heading = Some((level, run.page_index, run.y));
    }

    fn on_code(&mut self, text: &str, run: &RawTextRun) {
        if let FlowState::Code(code) = &mut self.state {
            if (run.y - code.last_y).abs() > run.font_size * 0.5 {
                code.lines.push(indented(text, run.x - code.start_x));
            } else if let Some(line) = code.lines.last_mut() {
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(text);
            }
            code.last_y = run.y;
            return;
        }

        self.flush();
        self.state = FlowState::Code(OpenCode {
            start_x: run.x,
            last_y: run.y,
            lines: vec![text.to_string()],
        });
    }

    fn on_prose(&mut self, text: &str, run: &RawTextRun, roles: StyleFlags) {
        if matches!(self.state, FlowState::Code(_)) {
            self.flush();
        }

        let size_key = size_key(run.font_size);
        let size_changed = matches!(
            &self.state,
            FlowState::Prose(para) if para.size_key.is_some_and(|k| k != size_key)
        );
        if size_changed {
            self.flush();
        }

        let FlowState::Prose(para) = &mut self.state else {
            return;
        };
        para.size_key = Some(size_key);

        if para.spans.is_empty() {
            para.spans.push(Inline::Text(StyledSpan::styled(text, roles)));
        } else if para.last_roles == roles {
            if let Some(Inline::Text(span)) = para.spans.last_mut() {
                span.text.push(' ');
                span.text.push_str(text);
            }
        } else {
            para.spans.push(Inline::text(" "));
            para.spans.push(Inline::Text(StyledSpan::styled(text, roles)));
        }
        para.last_roles = roles;
    }

    /// Close whatever is open and return to an empty prose state.
    fn flush(&mut self) {
        let state = std::mem::replace(&mut self.state, FlowState::Prose(OpenParagraph::default()));
        match state {
            FlowState::Prose(para) => {
                if !para.spans.is_empty() {
                    self.nodes.push(StructuralNode::Paragraph { spans: para.spans });
                }
            }
            FlowState::Code(code) => {
                self.nodes.push(StructuralNode::CodeBlock { lines: code.lines });
            }
        }
    }

    fn finish_page(&mut self, tables: Vec<TableGrid>) {
        self.flush();
        self.last_heading = None;
        self.nodes
            .extend(tables.into_iter().filter(|t| !t.is_empty()).map(StructuralNode::table));
    }
}

fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

/// Prefix a code line with spaces for its offset from the block's first run.
fn indented(text: &str, offset: f32) -> String {
    if offset > 1.0 {
        let spaces = ((offset / INDENT_UNIT) as usize).max(1);
        format!("{}{}", " ".repeat(spaces), text)
    } else {
        text.to_string()
    }
}
