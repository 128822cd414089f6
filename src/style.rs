//! Style classification from typographic signals.
//!
//! Maps font family names to semantic roles with case-insensitive substring
//! checks. Unlisted monospace families are not recognized as code.

use crate::model::StyleFlags;

/// Font name fragments that indicate a monospace (code) family.
const CODE_FONTS: &[&str] = &[
    "courier",
    "courier new",
    "consolas",
    "monaco",
    "menlo",
    "andale mono",
    "lucida console",
    "monospace",
    "source code",
    "sourcecode",
    "dejavu sans mono",
    "dejavusansmono",
    "liberation mono",
    "liberationmono",
    "inconsolata",
    "fira code",
    "firacode",
    "roboto mono",
    "robotomono",
];

const BOLD_MARKERS: &[&str] = &["bold", "heavy", "black"];
const ITALIC_MARKERS: &[&str] = &["italic", "oblique"];

/// Classify a font family into style roles.
pub fn classify(font_family: &str) -> StyleFlags {
    StyleFlags {
        bold: is_bold(font_family),
        italic: is_italic(font_family),
        strikethrough: false,
        code: is_code_font(font_family),
    }
}

/// Check whether a font family name denotes a bold weight.
pub fn is_bold(font_family: &str) -> bool {
    contains_any(font_family, BOLD_MARKERS)
}

/// Check whether a font family name denotes an italic style.
pub fn is_italic(font_family: &str) -> bool {
    contains_any(font_family, ITALIC_MARKERS)
}

/// Check whether a font family name is a known monospace family.
pub fn is_code_font(font_family: &str) -> bool {
    contains_any(font_family, CODE_FONTS)
}

fn contains_any(font_family: &str, needles: &[&str]) -> bool {
    if font_family.is_empty() {
        return false;
    }
    let lower = font_family.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}
