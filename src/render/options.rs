//! Rendering options and configuration.

/// Options for serializing a node sequence.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Collapse runs of 3+ newlines and trim blank lines at both ends
    pub collapse_blank_lines: bool,

    /// Maximum heading level (1-6); deeper headings are clamped
    pub max_heading_level: u8,
}

impl RenderOptions {
    /// Create new render options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable blank-line collapsing.
    pub fn with_collapse_blank_lines(mut self, collapse: bool) -> Self {
        self.collapse_blank_lines = collapse;
        self
    }

    /// Set the maximum heading level.
    pub fn with_max_heading(mut self, level: u8) -> Self {
        self.max_heading_level = level.clamp(1, 6);
        self
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            collapse_blank_lines: false,
            max_heading_level: 6,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let options = RenderOptions::new()
            .with_collapse_blank_lines(true)
            .with_max_heading(9);
        assert!(options.collapse_blank_lines);
        assert_eq!(options.max_heading_level, 6);
    }
}
