//! Heading-level inference.
//!
//! Three strategies share one contract: return a level in `1..=6`, or `0`
//! when the input is not a heading.
//!
//! - font size (PDF): ranked against the document's distinct sizes
//! - style index (DOC): small ordinal of the paragraph style
//! - style id (DOCX): `Heading1`..`Heading6` prefix

use std::collections::BTreeSet;

/// Minimum number of distinct sizes before any size can be a heading.
const MIN_DISTINCT_SIZES: usize = 5;

/// Deepest heading level produced by any strategy.
pub const MAX_HEADING_LEVEL: u8 = 6;

/// A heading-level strategy: `1..=6`, or `0` for body text.
pub trait HeadingRule {
    /// What the strategy looks at.
    type Input: ?Sized;

    /// Heading level of `input`.
    fn level(&self, input: &Self::Input) -> u8;
}

/// Distinct font sizes of one document, sorted largest first.
#[derive(Debug, Clone, Default)]
pub struct FontSizeHistogram {
    sizes: Vec<f32>,
}

impl FontSizeHistogram {
    /// Build a histogram from every observed size.
    ///
    /// Sizes are quantized to 0.1pt so that matrix rounding does not split
    /// one visual size into several.
    pub fn from_sizes(sizes: impl IntoIterator<Item = f32>) -> Self {
        let keys: BTreeSet<i32> = sizes.into_iter().map(size_key).collect();
        let sizes = keys.into_iter().rev().map(|k| k as f32 / 10.0).collect();
        Self { sizes }
    }

    /// Distinct sizes, largest first.
    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    /// Number of distinct sizes.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Check if no size was observed.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Heading level for a font size.
    ///
    /// Only sizes at or above the fifth-largest distinct size qualify;
    /// level is the size's rank plus one.
    pub fn level(&self, font_size: f32) -> u8 {
        if self.sizes.len() < MIN_DISTINCT_SIZES {
            return 0;
        }

        let key = size_key(font_size);
        let threshold = size_key(self.sizes[MIN_DISTINCT_SIZES - 1]);
        if key < threshold {
            return 0;
        }

        self.sizes
            .iter()
            .position(|s| size_key(*s) == key)
            .map(|rank| (rank as u8 + 1).min(MAX_HEADING_LEVEL))
            .unwrap_or(0)
    }
}

impl HeadingRule for FontSizeHistogram {
    type Input = f32;

    fn level(&self, font_size: &f32) -> u8 {
        FontSizeHistogram::level(self, *font_size)
    }
}

fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

/// DOC paragraph style index: `0..=5` maps to `index + 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleIndexRule;

impl HeadingRule for StyleIndexRule {
    type Input = i32;

    fn level(&self, index: &i32) -> u8 {
        if (0..=5).contains(index) {
            *index as u8 + 1
        } else {
            0
        }
    }
}

/// DOCX style identifier: `Heading1`..`Heading6` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleIdRule;

impl HeadingRule for StyleIdRule {
    type Input = str;

    fn level(&self, style_id: &str) -> u8 {
        (1..=MAX_HEADING_LEVEL)
            .find(|level| style_id.starts_with(&format!("Heading{}", level)))
            .unwrap_or(0)
    }
}

/// Heading level from a DOC paragraph style index.
pub fn level_from_style_index(index: i32) -> u8 {
    StyleIndexRule.level(&index)
}

/// Heading level from a DOCX style identifier.
pub fn level_from_style_id(style_id: &str) -> u8 {
    StyleIdRule.level(style_id)
}
