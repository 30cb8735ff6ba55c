//! Spreadsheet ingestor
//!
//! Turns raw sheet rows into a uniform column view: the header row is located
//! by its first-cell label, requested columns are matched by label regardless
//! of position, and non-data rows are discarded. Uploaded files are produced
//! by hand, so column order and extra columns are never assumed.

use cpt_common::{Error, Result};

/// One untyped spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }

    /// True for empty cells and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }

    /// Trimmed display text
    ///
    /// Integral numbers render without a fractional part, so an item number
    /// stored as `1.0` reads back as `"1"`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Cell::Bool(b) => b.to_string(),
        }
    }

    /// Non-negative quantity, or None when blank, non-numeric or negative
    pub fn as_quantity(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(n) => *n,
            Cell::Text(s) => parse_quantity_text(s)?,
            Cell::Empty | Cell::Bool(_) => return None,
        };

        (value.is_finite() && value >= 0.0).then_some(value)
    }
}

/// Parse numeric text typed by hand (`"1 234,5"`, `"1.234.567"`, `"12,5"`)
///
/// With both separators present the rightmost one is the decimal mark. A
/// separator that repeats is grouping. A single dot followed by exactly three
/// digits groups thousands; a single comma is always decimal.
fn parse_quantity_text(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let commas = compact.matches(',').count();
    let dots = compact.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0) => compact,
        (c, d) if c > 0 && d > 0 => {
            let (decimal, grouping) = if compact.rfind(',') > compact.rfind('.') {
                (',', '.')
            } else {
                ('.', ',')
            };
            let (whole, fraction) = compact.rsplit_once(decimal)?;
            if whole.contains(decimal) || fraction.contains(grouping) {
                return None;
            }
            format!("{}.{}", ungroup(whole, grouping)?, fraction)
        }
        (1, 0) => compact.replace(',', "."),
        (0, 1) => {
            let (whole, fraction) = compact.split_once('.')?;
            if fraction.len() == 3 && whole != "0" {
                ungroup(&compact, '.').unwrap_or(compact)
            } else {
                compact
            }
        }
        (_, 0) => ungroup(&compact, ',')?,
        _ => ungroup(&compact, '.')?,
    };

    normalized.parse::<f64>().ok()
}

/// Strip thousands separators, requiring 1-3 leading digits then groups of 3
fn ungroup(text: &str, separator: char) -> Option<String> {
    let mut parts = text.split(separator);
    let lead = parts.next()?;
    let digits = lead.trim_start_matches(['-', '+']);
    if digits.is_empty() || digits.len() > 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut joined = lead.to_string();
    for group in parts {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        joined.push_str(group);
    }
    Some(joined)
}

/// Compare labels case-insensitively, ignoring surrounding and repeated
/// whitespace (header cells often wrap onto several lines)
pub fn labels_match(a: &str, b: &str) -> bool {
    normalize_label(a) == normalize_label(b)
}

fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Requested columns projected out of the data rows below the header row
#[derive(Debug, Clone)]
pub struct ProjectedTable {
    labels: Vec<String>,
    rows: Vec<ProjectedRow>,
}

#[derive(Debug, Clone)]
struct ProjectedRow {
    /// 1-based row number in the source sheet
    source_row: usize,
    cells: Vec<Cell>,
}

impl ProjectedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |row| Record { table: self, row })
    }

    fn label_index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| labels_match(l, label))
    }
}

/// One data row of a projected table
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    table: &'a ProjectedTable,
    row: &'a ProjectedRow,
}

impl<'a> Record<'a> {
    /// Cell under a requested label; Empty for labels that were not requested
    pub fn get(&self, label: &str) -> &'a Cell {
        const EMPTY: &Cell = &Cell::Empty;
        match self.table.label_index(label) {
            Some(index) => &self.row.cells[index],
            None => EMPTY,
        }
    }

    pub fn text(&self, label: &str) -> String {
        self.get(label).as_text()
    }

    pub fn quantity(&self, label: &str) -> Option<f64> {
        self.get(label).as_quantity()
    }

    pub fn source_row(&self) -> usize {
        self.row.source_row
    }
}

/// Locate the header row and project the requested columns
///
/// The header row is the first row whose first non-blank cell equals
/// `header_marker` (case-insensitive); the table may start in any column.
/// Every label in `labels` must be present in that row, otherwise the upload
/// does not match the expected layout. Data rows with a blank cell under the
/// marker column are discarded.
pub fn project_columns(
    rows: &[Vec<Cell>],
    header_marker: &str,
    labels: &[&str],
) -> Result<ProjectedTable> {
    let (header_index, marker_column) = rows
        .iter()
        .enumerate()
        .find_map(|(i, row)| {
            let column = row.iter().position(|cell| !cell.is_blank())?;
            labels_match(&row[column].as_text(), header_marker).then_some((i, column))
        })
        .ok_or_else(|| {
            Error::Schema(format!("Header row starting with \"{}\" not found", header_marker))
        })?;

    let header = &rows[header_index];
    let mut indices = Vec::with_capacity(labels.len());
    let mut missing = Vec::new();
    for label in labels {
        match header.iter().position(|cell| labels_match(&cell.as_text(), label)) {
            Some(index) => indices.push(index),
            None => missing.push(format!("\"{}\"", label)),
        }
    }
    if !missing.is_empty() {
        return Err(Error::Schema(format!(
            "Required column(s) {} not found in header row {}",
            missing.join(", "),
            header_index + 1
        )));
    }

    let projected = rows
        .iter()
        .enumerate()
        .skip(header_index + 1)
        .filter(|(_, row)| row.get(marker_column).map(|cell| !cell.is_blank()).unwrap_or(false))
        .map(|(i, row)| ProjectedRow {
            source_row: i + 1,
            cells: indices
                .iter()
                .map(|&index| row.get(index).cloned().unwrap_or(Cell::Empty))
                .collect(),
        })
        .collect();

    Ok(ProjectedTable {
        labels: labels.iter().map(|l| l.to_string()).collect(),
        rows: projected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    fn sample_sheet() -> Vec<Vec<Cell>> {
        vec![
            vec![t("BẢNG KHỐI LƯỢNG"), Cell::Empty],
            vec![Cell::Empty],
            vec![t("stt"), t("Ghi chú"), t("Mô tả\ncông việc"), t("Khối lượng"), t("Extra")],
            vec![Cell::Number(1.0), t("ok"), t("Đào đất"), Cell::Number(120.5), t("x")],
            vec![Cell::Empty, t(""), t("separator"), Cell::Empty],
            vec![t("  "), t(""), t("blank stt"), Cell::Empty],
            vec![t("2"), Cell::Empty, t("Đắp cát")],
        ]
    }

    #[test]
    fn test_projects_columns_in_requested_order() {
        let table =
            project_columns(&sample_sheet(), "STT", &["STT", "Mô tả công việc", "Khối lượng"]).unwrap();

        assert_eq!(table.row_count(), 2);
        let names: Vec<String> = table.records().map(|r| r.text("Mô tả công việc")).collect();
        assert_eq!(names, vec!["Đào đất", "Đắp cát"]);

        let stts: Vec<String> = table.records().map(|r| r.text("stt")).collect();
        assert_eq!(stts, vec!["1", "2"]);
    }

    #[test]
    fn test_short_rows_pad_with_empty() {
        let table = project_columns(&sample_sheet(), "STT", &["STT", "Khối lượng"]).unwrap();
        let last = table.records().last().unwrap();
        assert_eq!(last.get("Khối lượng"), &Cell::Empty);
        assert_eq!(last.quantity("Khối lượng"), None);
        assert_eq!(last.source_row(), 7);
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let err = project_columns(&sample_sheet(), "STT", &["STT", "Đơn vị tính"]).unwrap_err();
        match err {
            Error::Schema(msg) => assert!(msg.contains("Đơn vị tính")),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_header_row_is_schema_error() {
        let rows = vec![vec![t("No."), t("Name")], vec![t("1"), t("x")]];
        let err = project_columns(&rows, "STT", &["STT"]).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_unrequested_label_reads_empty() {
        let table = project_columns(&sample_sheet(), "STT", &["STT"]).unwrap();
        let first = table.records().next().unwrap();
        assert_eq!(first.get("Extra"), &Cell::Empty);
        assert_eq!(first.quantity("Extra"), None);
    }

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(Cell::Number(95.0).as_quantity(), Some(95.0));
        assert_eq!(t("1 234,5").as_quantity(), Some(1234.5));
        assert_eq!(t("1,234.5").as_quantity(), Some(1234.5));
        assert_eq!(t("12.75").as_quantity(), Some(12.75));
        assert_eq!(t("n/a").as_quantity(), None);
        assert_eq!(t("").as_quantity(), None);
        assert_eq!(Cell::Number(-3.0).as_quantity(), None);
        assert_eq!(Cell::Number(f64::NAN).as_quantity(), None);
        assert_eq!(Cell::Bool(true).as_quantity(), None);
    }

    #[test]
    fn test_quantity_grouping_separators() {
        assert_eq!(t("1.234,5").as_quantity(), Some(1234.5));
        assert_eq!(t("1.234.567").as_quantity(), Some(1234567.0));
        assert_eq!(t("1,234,567").as_quantity(), Some(1234567.0));
        assert_eq!(t("1.234.567,8").as_quantity(), Some(1234567.8));
        assert_eq!(t("1,234,567.8").as_quantity(), Some(1234567.8));
        assert_eq!(t("2.400.000").as_quantity(), Some(2400000.0));
        assert_eq!(t("2.400").as_quantity(), Some(2400.0));
        assert_eq!(t("12,5").as_quantity(), Some(12.5));
        assert_eq!(t("0,125").as_quantity(), Some(0.125));
        assert_eq!(t("0.125").as_quantity(), Some(0.125));
        assert_eq!(t("1.2.3").as_quantity(), None);
        assert_eq!(t("1,2.3,4").as_quantity(), None);
    }

    #[test]
    fn test_table_offset_from_first_column() {
        let rows = vec![
            vec![t("BẢNG KHỐI LƯỢNG")],
            vec![Cell::Empty, t("STT"), t("Mô tả công việc"), t("Khối lượng")],
            vec![Cell::Empty, Cell::Number(1.0), t("Đào đất"), t("2.400.000")],
            vec![Cell::Empty, Cell::Empty, t("Tổng cộng"), Cell::Number(2400000.0)],
            vec![Cell::Empty, t("2"), t("Đắp cát"), Cell::Number(5.0)],
        ];
        let table = project_columns(&rows, "STT", &["STT", "Mô tả công việc", "Khối lượng"]).unwrap();

        assert_eq!(table.row_count(), 2);
        let first = table.records().next().unwrap();
        assert_eq!(first.text("STT"), "1");
        assert_eq!(first.quantity("Khối lượng"), Some(2400000.0));
        assert_eq!(first.source_row(), 3);
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(Cell::Number(3.0).as_text(), "3");
        assert_eq!(Cell::Number(1.25).as_text(), "1.25");
        assert_eq!(t("  II ").as_text(), "II");
        assert_eq!(Cell::Empty.as_text(), "");
    }

    #[test]
    fn test_labels_match_ignores_case_and_wrapping() {
        assert!(labels_match("Lũy kế\n đến nay", "LŨY KẾ ĐẾN NAY"));
        assert!(!labels_match("Đơn vị", "Đơn vị tính"));
    }
}
