//! Table detection from text positions inside drawn ruling lines.
//!
//! Runs are grouped into rows by baseline, column edges are the left edges
//! that recur across rows, and a candidate table is a run of consecutive rows
//! that align with those edges. A candidate is kept only when ruling lines
//! frame it: two horizontal rules across it and two vertical rules beside or
//! inside it. Aligned text without rules stays in the text flow.

use std::collections::{HashMap, HashSet};

use crate::model::{build_grid, RawTextRun, TableGrid};

/// Width of the buckets left edges are snapped to.
const EDGE_BUCKET: f32 = 5.0;

/// Distance within which a run counts as aligned with a column edge.
const ALIGN_TOLERANCE: f32 = 5.0;

/// Slack within which a segment still counts as axis-aligned.
const RULING_SLOPE_TOLERANCE: f32 = 1.0;

/// Shorter segments are glyph or border artifacts, not rules.
const MIN_RULING_LENGTH: f32 = 3.0;

/// A straight line segment painted on the page, in page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Ruling {
    /// Segment between two points, normalized so `x1 <= x2` and `y1 <= y2`.
    pub fn new(from: (f32, f32), to: (f32, f32)) -> Self {
        Self {
            x1: from.0.min(to.0),
            y1: from.1.min(to.1),
            x2: from.0.max(to.0),
            y2: from.1.max(to.1),
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.y2 - self.y1 <= RULING_SLOPE_TOLERANCE && self.x2 - self.x1 >= MIN_RULING_LENGTH
    }

    pub fn is_vertical(&self) -> bool {
        self.x2 - self.x1 <= RULING_SLOPE_TOLERANCE && self.y2 - self.y1 >= MIN_RULING_LENGTH
    }
}

/// Bounding box of a candidate table, in page space.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
}

/// A table region found on one page.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    /// Column left edges, ascending
    pub columns: Vec<f32>,
    /// Right-most extent of the table's runs
    pub right_x: f32,
    /// Rows, top to bottom
    pub rows: Vec<TableRow>,
}

/// Runs sharing a baseline.
#[derive(Debug, Clone)]
pub struct TableRow {
    /// Mean baseline of the row
    pub y: f32,
    /// Indices into the page's run list, sorted by x
    pub runs: Vec<usize>,
}

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping runs into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
    /// Keep only candidates framed by ruling lines
    pub require_rulings: bool,
    /// Distance outside a candidate's text box within which rules still frame it
    pub ruling_margin: f32,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
            require_rulings: true,
            ruling_margin: 20.0,
        }
    }
}

/// Detects tables among the runs of a single page.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    /// Create a new table detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Split a page's runs into table grids and the runs left for the text flow.
    pub fn split(
        &self,
        runs: Vec<RawTextRun>,
        rulings: &[Ruling],
    ) -> (Vec<TableGrid>, Vec<RawTextRun>) {
        let detected = self.detect(&runs, rulings);
        if detected.is_empty() {
            return (Vec::new(), runs);
        }

        let grids = detected
            .iter()
            .map(|table| self.to_grid(table, &runs))
            .collect();

        let used: HashSet<usize> = detected
            .iter()
            .flat_map(|t| t.rows.iter())
            .flat_map(|r| r.runs.iter().copied())
            .collect();
        let remaining = runs
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, run)| run)
            .collect();

        (grids, remaining)
    }

    /// Detect table regions.
    pub fn detect(&self, runs: &[RawTextRun], rulings: &[Ruling]) -> Vec<DetectedTable> {
        if self.config.require_rulings && rulings.is_empty() {
            return Vec::new();
        }
        if runs.len() < self.config.min_rows * self.config.min_columns {
            return Vec::new();
        }

        let rows = self.group_into_rows(runs);
        if rows.len() < self.config.min_rows {
            return Vec::new();
        }

        let columns = self.detect_columns(&rows, runs);
        log::debug!("TableDetector: {} rows, column edges {:?}", rows.len(), columns);
        if columns.len() < self.config.min_columns {
            return Vec::new();
        }

        let mut tables = Vec::new();
        for (start, end) in self.find_table_regions(&rows, &columns, runs) {
            let table_rows = rows[start..=end].to_vec();

            // Re-detect columns for this region alone
            let columns = self.detect_columns(&table_rows, runs);
            if columns.len() < self.config.min_columns {
                continue;
            }
            if columns.len() > self.config.max_columns {
                log::debug!(
                    "TableDetector: skipping region, too many columns ({} > {})",
                    columns.len(),
                    self.config.max_columns
                );
                continue;
            }
            if self.is_list_pattern(&table_rows, &columns, runs) {
                log::debug!("TableDetector: skipping region, looks like a list");
                continue;
            }

            let right_x = table_rows
                .iter()
                .flat_map(|r| r.runs.iter())
                .map(|&i| runs[i].x + runs[i].width)
                .fold(f32::MIN, f32::max);

            if self.config.require_rulings {
                let bounds = region_bounds(&table_rows, right_x, runs);
                if !self.is_ruled(&bounds, rulings) {
                    log::debug!("TableDetector: skipping region, no ruling lines");
                    continue;
                }
            }

            tables.push(DetectedTable {
                columns,
                right_x,
                rows: table_rows,
            });
        }

        tables
    }

    /// Group runs into rows by baseline, top to bottom.
    fn group_into_rows(&self, runs: &[RawTextRun]) -> Vec<TableRow> {
        let mut order: Vec<usize> = (0..runs.len()).collect();
        order.sort_by(|&a, &b| {
            runs[b]
                .y
                .total_cmp(&runs[a].y)
                .then(runs[a].x.total_cmp(&runs[b].x))
        });

        let mut rows: Vec<TableRow> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        let mut current_y: Option<f32> = None;

        for i in order {
            let run = &runs[i];
            let tolerance = run.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (run.y - y).abs() <= tolerance => current.push(i),
                _ => {
                    if !current.is_empty() {
                        rows.push(make_row(std::mem::take(&mut current), runs));
                    }
                    current_y = Some(run.y);
                    current.push(i);
                }
            }
        }
        if !current.is_empty() {
            rows.push(make_row(current, runs));
        }

        rows
    }

    /// Column edges: left edges recurring in enough rows.
    ///
    /// Rows with two or more runs are the evidence when there are enough of
    /// them; otherwise every run of every row votes.
    fn detect_columns(&self, rows: &[TableRow], runs: &[RawTextRun]) -> Vec<f32> {
        let multi: Vec<&TableRow> = rows.iter().filter(|r| r.runs.len() >= 2).collect();

        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        let voters = if multi.len() >= self.config.min_rows {
            for row in &multi {
                let buckets: HashSet<i32> = row.runs.iter().map(|&i| bucket(runs[i].x)).collect();
                for b in buckets {
                    *edge_counts.entry(b).or_insert(0) += 1;
                }
            }
            multi.len()
        } else {
            for row in rows {
                for &i in &row.runs {
                    *edge_counts.entry(bucket(runs[i].x)).or_insert(0) += 1;
                }
            }
            rows.len()
        };

        let min_occurrences =
            ((voters as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .into_iter()
            .filter(|(_, count)| *count >= min_occurrences)
            .map(|(b, _)| b as f32 * EDGE_BUCKET)
            .collect();
        edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(&last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Contiguous row ranges whose runs align with `columns`.
    fn find_table_regions(
        &self,
        rows: &[TableRow],
        columns: &[f32],
        runs: &[RawTextRun],
    ) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            let aligned = alignment_score(row, columns, runs) >= self.config.min_alignment_ratio;
            match (aligned, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    if i - s >= self.config.min_rows {
                        regions.push((s, i - 1));
                    }
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }

        regions
    }

    /// Whether the region is a bulleted or numbered list split into two runs per line.
    fn is_list_pattern(&self, rows: &[TableRow], columns: &[f32], runs: &[RawTextRun]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }

        let mut bullets = 0;
        let mut numbers = 0;
        for row in rows {
            // Runs are sorted by x, so the first is leftmost
            if let Some(&first) = row.runs.first() {
                let text = runs[first].text.trim();
                if is_bullet_marker(text) {
                    bullets += 1;
                } else if is_number_marker(text) {
                    numbers += 1;
                }
            }
        }

        let bullet_ratio = bullets as f32 / rows.len() as f32;
        let marker_ratio = (bullets + numbers) as f32 / rows.len() as f32;

        // Numbered first columns only disqualify two-column regions
        bullet_ratio >= 0.5 || (columns.len() == 2 && marker_ratio >= 0.5)
    }

    /// Whether rules frame `bounds`: two horizontals across, two verticals alongside.
    fn is_ruled(&self, bounds: &Bounds, rulings: &[Ruling]) -> bool {
        let margin = self.config.ruling_margin;
        let horizontal = rulings
            .iter()
            .filter(|r| r.is_horizontal())
            .filter(|r| r.y1 >= bounds.bottom - margin && r.y1 <= bounds.top + margin)
            .filter(|r| r.x1 < bounds.right && r.x2 > bounds.left)
            .count();
        let vertical = rulings
            .iter()
            .filter(|r| r.is_vertical())
            .filter(|r| r.x1 >= bounds.left - margin && r.x1 <= bounds.right + margin)
            .filter(|r| r.y1 < bounds.top && r.y2 > bounds.bottom)
            .count();
        horizontal >= 2 && vertical >= 2
    }

    /// Build the cell grid of a detected table; row 0 is the header.
    pub fn to_grid(&self, table: &DetectedTable, runs: &[RawTextRun]) -> TableGrid {
        let rows = table.rows.iter().map(|row| {
            let mut cells: Vec<Vec<&str>> = vec![Vec::new(); table.columns.len()];
            for &i in &row.runs {
                let col = find_column(runs[i].x, &table.columns, table.right_x);
                cells[col].push(runs[i].text.trim());
            }
            cells.into_iter().map(|parts| parts.join(" ")).collect::<Vec<_>>()
        });
        build_grid(rows)
    }
}

fn bucket(x: f32) -> i32 {
    (x / EDGE_BUCKET).round() as i32
}

/// Text box of a region: baselines widened by ascent above and descent below.
fn region_bounds(rows: &[TableRow], right_x: f32, runs: &[RawTextRun]) -> Bounds {
    let mut bounds = Bounds {
        left: f32::MAX,
        right: right_x,
        bottom: f32::MAX,
        top: f32::MIN,
    };
    for &i in rows.iter().flat_map(|r| r.runs.iter()) {
        let run = &runs[i];
        bounds.left = bounds.left.min(run.x);
        bounds.bottom = bounds.bottom.min(run.y - run.font_size * 0.3);
        bounds.top = bounds.top.max(run.y + run.font_size);
    }
    bounds
}

fn make_row(mut indices: Vec<usize>, runs: &[RawTextRun]) -> TableRow {
    indices.sort_by(|&a, &b| runs[a].x.total_cmp(&runs[b].x));
    let y = indices.iter().map(|&i| runs[i].y).sum::<f32>() / indices.len() as f32;
    TableRow { y, runs: indices }
}

fn alignment_score(row: &TableRow, columns: &[f32], runs: &[RawTextRun]) -> f32 {
    if row.runs.is_empty() || columns.is_empty() {
        return 0.0;
    }
    let aligned = row
        .runs
        .iter()
        .filter(|&&i| columns.iter().any(|c| (runs[i].x - c).abs() <= ALIGN_TOLERANCE))
        .count();
    aligned as f32 / row.runs.len() as f32
}

/// Column index for a left edge; runs slightly left of an edge still belong to it.
fn find_column(x: f32, columns: &[f32], right_x: f32) -> usize {
    for (i, &start) in columns.iter().enumerate() {
        let end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        if x >= start - 10.0 && x < end - 10.0 {
            return i;
        }
    }

    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "►" | "■" | "●" | "□" | "◆" | "▶" | "➤"
    )
}

/// Number-style list markers: `1.`, `12)`, a bare number, `a.`.
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let suffix = &cleaned[pos..];
        if pos > 0 && (suffix == "." || suffix == ")") {
            return true;
        }
    }
    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && (chars[1] == '.' || chars[1] == ')')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run(text: &str, x: f32, y: f32) -> RawTextRun {
        RawTextRun::new(text, x, y, 12.0, "Helvetica", 0)
    }

    /// Detector for the position logic alone.
    fn unruled() -> TableDetector {
        TableDetector::with_config(TableDetectorConfig {
            require_rulings: false,
            ..TableDetectorConfig::default()
        })
    }

    /// Outer frame plus one column separator around `left..right`, `bottom..top`.
    fn frame(left: f32, right: f32, bottom: f32, top: f32, split_x: f32) -> Vec<Ruling> {
        vec![
            Ruling::new((left, top), (right, top)),
            Ruling::new((left, bottom), (right, bottom)),
            Ruling::new((left, bottom), (left, top)),
            Ruling::new((split_x, bottom), (split_x, top)),
            Ruling::new((right, bottom), (right, top)),
        ]
    }

    fn label_value_runs() -> Vec<RawTextRun> {
        vec![
            make_run("Name:", 72.0, 700.0),
            make_run("Alice", 150.0, 700.0),
            make_run("Role:", 72.0, 680.0),
            make_run("Engineer", 150.0, 680.0),
            make_run("Team:", 72.0, 660.0),
            make_run("Core", 150.0, 660.0),
        ]
    }

    #[test]
    fn test_group_into_rows() {
        let detector = unruled();
        let runs = vec![
            make_run("B1", 60.0, 100.0),
            make_run("A1", 10.0, 100.0),
            make_run("A2", 10.0, 85.0),
            make_run("B2", 60.0, 85.0),
        ];

        let rows = detector.group_into_rows(&runs);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].runs, vec![1, 0]);
        assert_eq!(rows[1].runs.len(), 2);
    }

    #[test]
    fn test_split_simple_table() {
        let detector = unruled();
        let runs = vec![
            make_run("Name", 10.0, 100.0),
            make_run("Age", 60.0, 100.0),
            make_run("Alice", 10.0, 85.0),
            make_run("30", 60.0, 85.0),
            make_run("Bob", 10.0, 70.0),
            make_run("25", 60.0, 70.0),
        ];

        let (grids, remaining) = detector.split(runs, &[]);
        assert!(remaining.is_empty());
        assert_eq!(grids.len(), 1);
        assert_eq!(
            grids[0].rows,
            vec![
                vec!["Name".to_string(), "Age".to_string()],
                vec!["Alice".to_string(), "30".to_string()],
                vec!["Bob".to_string(), "25".to_string()],
            ]
        );
    }

    #[test]
    fn test_table_keeps_surrounding_text() {
        let detector = unruled();
        let runs = vec![
            make_run("Intro paragraph", 30.0, 130.0),
            make_run("Name", 10.0, 100.0),
            make_run("Age", 80.0, 100.0),
            make_run("Alice", 10.0, 85.0),
            make_run("30", 80.0, 85.0),
        ];

        let (grids, remaining) = detector.split(runs, &[]);
        assert_eq!(grids.len(), 1);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].text, "Intro paragraph");
    }

    #[test]
    fn test_no_table_single_column() {
        let detector = unruled();
        let runs = vec![
            make_run("Line 1", 10.0, 100.0),
            make_run("Line 2", 10.0, 85.0),
            make_run("Line 3", 10.0, 70.0),
            make_run("Line 4", 10.0, 55.0),
        ];

        let (grids, remaining) = detector.split(runs, &[]);
        assert!(grids.is_empty());
        assert_eq!(remaining.len(), 4);
    }

    #[test]
    fn test_numbered_list_not_detected_as_table() {
        let detector = unruled();
        let runs = vec![
            make_run("1.", 50.0, 400.0),
            make_run("Install", 80.0, 400.0),
            make_run("2.", 50.0, 370.0),
            make_run("Configure", 80.0, 370.0),
            make_run("3.", 50.0, 340.0),
            make_run("Run", 80.0, 340.0),
        ];

        let (grids, remaining) = detector.split(runs, &[]);
        assert!(grids.is_empty());
        assert_eq!(remaining.len(), 6);
    }

    #[test]
    fn test_bullet_list_not_detected_as_table() {
        let detector = unruled();
        let runs = vec![
            make_run("•", 50.0, 400.0),
            make_run("Management", 80.0, 400.0),
            make_run("•", 50.0, 370.0),
            make_run("Firmware", 80.0, 370.0),
        ];

        assert!(detector.detect(&runs, &[]).is_empty());
    }

    #[test]
    fn test_aligned_text_without_rulings_stays_text() {
        let (grids, remaining) = TableDetector::new().split(label_value_runs(), &[]);
        assert!(grids.is_empty());
        assert_eq!(remaining.len(), 6);
    }

    #[test]
    fn test_ruled_region_becomes_table() {
        let rulings = frame(66.0, 260.0, 654.0, 714.0, 144.0);
        let (grids, remaining) = TableDetector::new().split(label_value_runs(), &rulings);
        assert!(remaining.is_empty());
        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].rows[2], vec!["Team:".to_string(), "Core".to_string()]);
    }

    #[test]
    fn test_rulings_elsewhere_do_not_frame() {
        // A rule box far below the text
        let rulings = frame(66.0, 260.0, 100.0, 200.0, 144.0);
        assert!(TableDetector::new()
            .detect(&label_value_runs(), &rulings)
            .is_empty());
    }

    #[test]
    fn test_ruling_orientation() {
        assert!(Ruling::new((10.0, 5.0), (100.0, 5.4)).is_horizontal());
        assert!(Ruling::new((10.0, 90.0), (10.0, 5.0)).is_vertical());
        assert!(!Ruling::new((10.0, 5.0), (11.0, 5.0)).is_horizontal());
        assert!(!Ruling::new((0.0, 0.0), (40.0, 40.0)).is_vertical());
    }

    #[test]
    fn test_find_column() {
        let columns = [10.0, 60.0, 120.0];
        assert_eq!(find_column(10.0, &columns, 200.0), 0);
        assert_eq!(find_column(55.0, &columns, 200.0), 1);
        assert_eq!(find_column(150.0, &columns, 200.0), 2);
    }

    #[test]
    fn test_markers() {
        assert!(is_number_marker("1."));
        assert!(is_number_marker("12)"));
        assert!(is_number_marker("1 ."));
        assert!(is_number_marker("3"));
        assert!(is_number_marker("a."));
        assert!(is_bullet_marker("•"));
        assert!(is_bullet_marker(" - "));
        assert!(!is_number_marker("Name"));
        assert!(!is_bullet_marker("Alice"));
        assert!(!is_number_marker(""));
    }
}
