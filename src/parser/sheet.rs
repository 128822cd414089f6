//! Spreadsheet extraction (XLS, XLSX) using calamine.
//!
//! Every sheet becomes an optional level-2 heading and one table whose first
//! row is treated as the header.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDateTime, NaiveTime};

use crate::error::{Error, Result};
use crate::model::{build_grid, StructuralNode, TableGrid};

use super::{read_source, ExtractContext, Extractor};

/// Heading level of sheet names.
pub const SHEET_HEADING_LEVEL: u8 = 2;

/// Spreadsheet extractor.
#[derive(Debug, Clone)]
pub struct SheetExtractor {
    include_sheet_names: bool,
}

impl Default for SheetExtractor {
    fn default() -> Self {
        Self {
            include_sheet_names: true,
        }
    }
}

impl SheetExtractor {
    /// Create an extractor that writes sheet names as headings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable sheet-name headings.
    pub fn with_sheet_names(mut self, enabled: bool) -> Self {
        self.include_sheet_names = enabled;
        self
    }

    /// Extract nodes from an in-memory workbook.
    pub fn extract_bytes(
        &self,
        data: &[u8],
        ctx: &mut ExtractContext,
    ) -> Result<Vec<StructuralNode>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))?;
        let mut nodes = Vec::new();

        for name in workbook.sheet_names().to_vec() {
            if self.include_sheet_names {
                nodes.push(StructuralNode::heading(SHEET_HEADING_LEVEL, name.as_str()));
            }

            match workbook.worksheet_range(&name) {
                Ok(range) => {
                    let grid = range_to_grid(&range);
                    log::debug!(
                        "Sheet {}: {} rows x {} columns",
                        name,
                        grid.row_count(),
                        grid.column_count()
                    );
                    if !grid.is_empty() {
                        nodes.push(StructuralNode::table(grid));
                    }
                }
                Err(e) => ctx.partial(format!("sheet {}", name), e),
            }
        }

        Ok(nodes)
    }
}

impl Extractor for SheetExtractor {
    fn name(&self) -> &str {
        "spreadsheet"
    }

    fn extract(&self, path: &Path, ctx: &mut ExtractContext) -> Result<Vec<StructuralNode>> {
        let data = read_source(path)?;
        self.extract_bytes(&data, ctx).map_err(|e| match e {
            Error::SourceRead(cause) => Error::source_read(path, cause),
            other => other,
        })
    }
}

/// Rows `0..=last` and columns `0..=last` in absolute sheet coordinates.
pub fn range_to_grid(range: &Range<Data>) -> TableGrid {
    let Some((last_row, last_col)) = range.end() else {
        return TableGrid::default();
    };

    let rows = (0..=last_row).map(|row| {
        (0..=last_col)
            .map(|col| range.get_value((row, col)).map(format_cell).unwrap_or_default())
            .collect::<Vec<_>>()
    });
    build_grid(rows)
}

/// Text of one cell, trimmed.
pub fn format_cell(cell: &Data) -> String {
    let text = match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => format_datetime(datetime),
            None => format_number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    };
    text.trim().to_string()
}

/// Whole numbers without a fractional part; anything else as displayed by Rust.
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

fn format_datetime(datetime: NaiveDateTime) -> String {
    if datetime.time() == NaiveTime::MIN {
        datetime.format("%Y-%m-%d").to_string()
    } else {
        datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_numbers() {
        assert_eq!(format_cell(&Data::Float(30.0)), "30");
        assert_eq!(format_cell(&Data::Float(-2.0)), "-2");
        assert_eq!(format_cell(&Data::Float(3.25)), "3.25");
        assert_eq!(format_cell(&Data::Int(7)), "7");
        assert_eq!(format_cell(&Data::Float(f64::NAN)), "NaN");
    }

    #[test]
    fn test_format_other_cells() {
        assert_eq!(format_cell(&Data::String("  Alice ".to_string())), "Alice");
        assert_eq!(format_cell(&Data::Bool(true)), "true");
        assert_eq!(format_cell(&Data::Empty), "");
        assert_eq!(
            format_cell(&Data::Error(calamine::CellErrorType::Div0)),
            ""
        );
        assert_eq!(
            format_cell(&Data::DateTimeIso("2024-03-01T10:00:00".to_string())),
            "2024-03-01T10:00:00"
        );
    }

    #[test]
    fn test_format_datetime() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(format_datetime(date.and_hms_opt(0, 0, 0).unwrap()), "2024-03-01");
        assert_eq!(
            format_datetime(date.and_hms_opt(13, 5, 9).unwrap()),
            "2024-03-01 13:05:09"
        );
    }

    #[test]
    fn test_grid_starts_at_sheet_origin() {
        let mut range = Range::new((1, 1), (2, 2));
        range.set_value((1, 1), Data::String("Name".to_string()));
        range.set_value((1, 2), Data::String("Age".to_string()));
        range.set_value((2, 1), Data::String("Alice".to_string()));
        range.set_value((2, 2), Data::Float(30.0));

        let grid = range_to_grid(&range);
        assert_eq!(grid.rows.len(), 3);
        assert_eq!(grid.rows[0], vec!["", "", ""]);
        assert_eq!(grid.rows[1], vec!["", "Name", "Age"]);
        assert_eq!(grid.rows[2], vec!["", "Alice", "30"]);
    }

    #[test]
    fn test_empty_range() {
        let range: Range<Data> = Range::empty();
        assert!(range_to_grid(&range).is_empty());
    }

    #[test]
    fn test_garbage_is_source_read_error() {
        let mut ctx = ExtractContext::default();
        let err = SheetExtractor::new()
            .extract_bytes(b"not a workbook", &mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::SourceRead(_)));
    }
}
