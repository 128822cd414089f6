//! Text runs and styled spans.

use serde::{Deserialize, Serialize};

/// A positioned piece of text as emitted by a PDF content stream.
///
/// Lives only for the duration of one conversion call.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextRun {
    /// The decoded text
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline, grows upward)
    pub y: f32,
    /// Estimated advance width
    pub width: f32,
    /// Effective font size in points
    pub font_size: f32,
    /// Base font name (e.g., "Helvetica-Bold")
    pub font_family: String,
    /// Zero-based page index
    pub page_index: u32,
}

impl RawTextRun {
    /// Create a new run, estimating its width from the character count.
    pub fn new(
        text: impl Into<String>,
        x: f32,
        y: f32,
        font_size: f32,
        font_family: impl Into<String>,
        page_index: u32,
    ) -> Self {
        let text = text.into();
        let width = Self::estimate_width(&text, font_size);
        Self {
            text,
            x,
            y,
            width,
            font_size,
            font_family: font_family.into(),
            page_index,
        }
    }

    /// Advance width of `text` at `font_size`, half an em per character.
    pub fn estimate_width(text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * 0.5
    }
}

/// Semantic roles a span of text can carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleFlags {
    /// Bold text
    pub bold: bool,
    /// Italic text
    pub italic: bool,
    /// Strikethrough text
    pub strikethrough: bool,
    /// Monospace / code text
    pub code: bool,
}

impl StyleFlags {
    /// Flags with only bold set.
    pub fn bold() -> Self {
        Self {
            bold: true,
            ..Self::default()
        }
    }

    /// Flags with only italic set.
    pub fn italic() -> Self {
        Self {
            italic: true,
            ..Self::default()
        }
    }

    /// Flags with only strikethrough set.
    pub fn strikethrough() -> Self {
        Self {
            strikethrough: true,
            ..Self::default()
        }
    }

    /// Flags with only code set.
    pub fn code() -> Self {
        Self {
            code: true,
            ..Self::default()
        }
    }

    /// Whether no role is set.
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    /// Union of two flag sets.
    pub fn union(self, other: Self) -> Self {
        Self {
            bold: self.bold || other.bold,
            italic: self.italic || other.italic,
            strikethrough: self.strikethrough || other.strikethrough,
            code: self.code || other.code,
        }
    }
}

/// A run of Markdown-ready text with semantic roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledSpan {
    /// Text content, already escaped where the source format requires it
    pub text: String,
    /// Roles applied to the whole span
    #[serde(default, skip_serializing_if = "StyleFlags::is_plain")]
    pub roles: StyleFlags,
}

impl StyledSpan {
    /// Create a plain span.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            roles: StyleFlags::default(),
        }
    }

    /// Create a span with roles.
    pub fn styled(text: impl Into<String>, roles: StyleFlags) -> Self {
        Self {
            text: text.into(),
            roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_estimate() {
        let run = RawTextRun::new("abcd", 0.0, 0.0, 10.0, "Helvetica", 0);
        assert!((run.width - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_flags_union() {
        let flags = StyleFlags::bold().union(StyleFlags::italic());
        assert!(flags.bold && flags.italic);
        assert!(!flags.code);
        assert!(StyleFlags::default().is_plain());
        assert!(!flags.is_plain());
    }
}
