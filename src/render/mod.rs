//! Rendering module for serializing structural nodes.

mod cleanup;
mod json;
mod markdown;
mod options;

pub use cleanup::collapse_blank_lines;
pub use json::{to_json, JsonFormat};
pub use markdown::{to_markdown, MarkdownRenderer};
pub use options::RenderOptions;
