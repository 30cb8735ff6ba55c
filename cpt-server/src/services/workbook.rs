//! Workbook decoding
//!
//! Wraps calamine so the rest of the crate only sees sheet names and rows of
//! [`Cell`] values.

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use cpt_common::config::SheetMatch;
use cpt_common::{Error, Result};
use std::io::Cursor;
use tracing::debug;

use super::spreadsheet::Cell;

/// An uploaded workbook held in memory
pub struct Workbook {
    sheets: Sheets<Cursor<Vec<u8>>>,
}

impl Workbook {
    /// Decode workbook bytes (xlsx, xlsm, xls or ods)
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::Parse("Uploaded file is empty".to_string()));
        }

        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| Error::Parse(format!("Unreadable spreadsheet: {}", e)))?;

        Ok(Self { sheets })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    /// Find the sheet selected by `selector`
    pub fn find_sheet(&self, selector: &str, mode: SheetMatch) -> Result<String> {
        let names = self.sheet_names();
        find_sheet_name(&names, selector, mode)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Parse(format!(
                    "Sheet \"{}\" not found (available: {})",
                    selector,
                    names.join(", ")
                ))
            })
    }

    /// All rows of a sheet, anchored at cell A1
    pub fn rows(&mut self, sheet: &str) -> Result<Vec<Vec<Cell>>> {
        let range = self
            .sheets
            .worksheet_range(sheet)
            .map_err(|e| Error::Parse(format!("Cannot read sheet \"{}\": {}", sheet, e)))?;

        // calamine trims leading empty rows/columns; restore them so column
        // positions and row numbers match what the user sees
        let (first_row, first_col) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Vec<Cell>> = (0..first_row).map(|_| Vec::new()).collect();
        for row in range.rows() {
            let mut cells = vec![Cell::Empty; first_col as usize];
            cells.extend(row.iter().map(cell_from_data));
            rows.push(cells);
        }

        debug!(sheet = %sheet, rows = rows.len(), "Decoded sheet");
        Ok(rows)
    }
}

/// Decode `bytes` and return the rows of the selected sheet
pub fn read_sheet(bytes: Vec<u8>, selector: &str, mode: SheetMatch) -> Result<Vec<Vec<Cell>>> {
    let mut workbook = Workbook::open(bytes)?;
    let sheet = workbook.find_sheet(selector, mode)?;
    workbook.rows(&sheet)
}

/// [`read_sheet`] on the blocking thread pool
pub async fn decode_sheet(bytes: Vec<u8>, selector: String, mode: SheetMatch) -> Result<Vec<Vec<Cell>>> {
    tokio::task::spawn_blocking(move || read_sheet(bytes, &selector, mode))
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
}

/// Pick a sheet name: exact match, or case-insensitive substring match
pub fn find_sheet_name<'a>(names: &'a [String], selector: &str, mode: SheetMatch) -> Option<&'a str> {
    let selector_trimmed = selector.trim();
    match mode {
        SheetMatch::Exact => names
            .iter()
            .find(|name| name.trim() == selector_trimmed)
            .map(String::as_str),
        SheetMatch::Contains => {
            let needle = selector_trimmed.to_lowercase();
            names
                .iter()
                .find(|name| name.to_lowercase().contains(&needle))
                .map(String::as_str)
        }
    }
}

fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(n) => Cell::Number(*n as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::Error(_) => Cell::Empty,
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}
