//! JSON rendering of the node sequence.

use crate::error::Result;
use crate::model::StructuralNode;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a node sequence to JSON.
pub fn to_json(nodes: &[StructuralNode], format: JsonFormat) -> Result<String> {
    let json = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(nodes)?,
        JsonFormat::Compact => serde_json::to_string(nodes)?,
    };
    Ok(json)
}
