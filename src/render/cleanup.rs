//! Whitespace cleanup applied after serialization.

/// Collapse runs of three or more newlines to exactly two, drop leading
/// blank lines, and end the text with a single block terminator.
///
/// Empty or whitespace-only input yields an empty string.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut newlines = 0usize;

    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                result.push(c);
            }
        } else {
            newlines = 0;
            result.push(c);
        }
    }

    let body = strip_leading_blank_lines(&result).trim_end();
    if body.is_empty() {
        return String::new();
    }
    format!("{}\n\n", body)
}

fn strip_leading_blank_lines(text: &str) -> &str {
    let mut rest = text;
    while let Some(pos) = rest.find('\n') {
        if rest[..pos].trim().is_empty() {
            rest = &rest[pos + 1..];
        } else {
            break;
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_runs() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\n"), "a\n\nb\n\n");
        assert_eq!(collapse_blank_lines("a\nb"), "a\nb\n\n");
    }

    #[test]
    fn test_trims_both_ends() {
        assert_eq!(collapse_blank_lines("\n\n  \n# T\n\nx\n\n\n\n"), "# T\n\nx\n\n");
    }

    #[test]
    fn test_keeps_first_line_indentation() {
        assert_eq!(collapse_blank_lines("\n    code\n"), "    code\n\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(collapse_blank_lines(""), "");
        assert_eq!(collapse_blank_lines("\n\n \n"), "");
    }
}
