//! Table grid construction and cell escaping.

use serde::{Deserialize, Serialize};

/// A rectangular table of cell texts; row 0 is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGrid {
    /// Rows of cells, every row `column_count()` wide
    pub rows: Vec<Vec<String>>,
}

impl TableGrid {
    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns (identical for every row).
    pub fn column_count(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if the grid has no renderable cells.
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0 || self.column_count() == 0
    }

    /// The header row, if any.
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(|r| r.as_slice())
    }
}

/// Build a padded grid from ragged rows.
///
/// The first pass finds the widest row; the second pads every row with empty
/// cells up to that width. No cell is ever dropped.
pub fn build_grid<R, C, S>(rows: R) -> TableGrid
where
    R: IntoIterator<Item = C>,
    C: IntoIterator<Item = S>,
    S: Into<String>,
{
    let collected: Vec<Vec<String>> = rows
        .into_iter()
        .map(|row| row.into_iter().map(Into::into).collect())
        .collect();

    let max_cols = collected.iter().map(|r| r.len()).max().unwrap_or(0);

    let rows = collected
        .into_iter()
        .map(|mut row| {
            row.resize(max_cols, String::new());
            row
        })
        .collect();

    TableGrid { rows }
}

/// Escape a cell so that it stays on one table row.
///
/// `|` becomes `\|`; CRLF, CR and LF each become a single space.
pub fn escape_cell(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .replace('|', "\\|")
}
