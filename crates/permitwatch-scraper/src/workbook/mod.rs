//! In-memory view of a spreadsheet's active sheet.
//!
//! Cell values come from `calamine`. Two things `calamine` does not expose,
//! the active tab and cell hyperlinks, are read from the OOXML package
//! directly (see [`ooxml`]); legacy `.xls` files get the first sheet and no
//! hyperlinks.

mod ooxml;

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, DataType, Reader};
use chrono::NaiveDateTime;

use crate::error::ScraperError;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    /// External link target attached to the cell, if any.
    pub hyperlink: Option<String>,
}

impl Cell {
    #[must_use]
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            hyperlink: None,
        }
    }

    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::new(CellValue::Text(text.to_owned()))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::new(CellValue::Empty)
    }

    #[must_use]
    pub fn with_hyperlink(mut self, target: &str) -> Self {
        self.hyperlink = Some(target.to_owned());
        self
    }

    /// A cell is empty when it has no value or only whitespace text.
    /// Numeric zero and `false` are values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.value {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The cell's value as trimmed text. Dates render as `YYYY-MM-DD`,
    /// whole floats without a fractional part.
    #[must_use]
    pub fn as_text(&self) -> String {
        match &self.value {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.trim().to_owned(),
            CellValue::Int(i) => i.to_string(),
            CellValue::Float(f) => format_float(*f),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(dt) => dt.format("%Y-%m-%d").to_string(),
        }
    }

    /// The value recorded for this cell in a permit: the hyperlink target
    /// when present, otherwise [`Self::as_text`].
    #[must_use]
    pub fn field_value(&self) -> String {
        match &self.hyperlink {
            Some(target) if !target.trim().is_empty() => target.trim().to_owned(),
            _ => self.as_text(),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = f as i64;
        whole.to_string()
    } else {
        f.to_string()
    }
}

/// A grid of cells addressed by 0-based absolute sheet position.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    rows: Vec<Vec<Cell>>,
}

impl Sheet {
    #[must_use]
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Convenience constructor: every non-empty string becomes a text cell.
    #[must_use]
    pub fn from_text_rows(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|s| {
                        if s.is_empty() {
                            Cell::empty()
                        } else {
                            Cell::text(s)
                        }
                    })
                    .collect()
            })
            .collect();
        Self::new(name, rows)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn row(&self, index: usize) -> &[Cell] {
        self.rows.get(index).map_or(&[], Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }
}

/// Loads the active sheet of a `.xlsx` or `.xls` workbook.
///
/// # Errors
///
/// Returns [`ScraperError::Workbook`] if the bytes are not a readable
/// workbook or it contains no sheets.
pub fn load_active_sheet(bytes: &[u8]) -> Result<Sheet, ScraperError> {
    let is_package = ooxml::is_package(bytes);

    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ScraperError::Workbook(e.to_string()))?;

    let names = workbook.sheet_names();
    let active = if is_package {
        ooxml::active_tab(bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read active tab, using first sheet");
            0
        })
    } else {
        0
    };
    let index = if active < names.len() { active } else { 0 };
    let name = names
        .get(index)
        .cloned()
        .ok_or_else(|| ScraperError::Workbook("workbook has no sheets".to_owned()))?;

    let range = workbook
        .worksheet_range_at(index)
        .ok_or_else(|| ScraperError::Workbook(format!("sheet {index} missing")))?
        .map_err(|e| ScraperError::Workbook(e.to_string()))?;

    let used = range.start().zip(range.end()).map(|(start, end)| {
        ooxml::CellRect::new(
            (start.0 as usize, start.1 as usize),
            (end.0 as usize, end.1 as usize),
        )
    });
    let hyperlinks = match used {
        Some(used) if is_package => ooxml::sheet_hyperlinks(bytes, index, used)
            .unwrap_or_else(|e| {
                tracing::warn!(sheet = %name, error = %e, "could not read hyperlinks");
                HashMap::new()
            }),
        _ => HashMap::new(),
    };

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    if let Some((start_row, start_col)) = range.start() {
        let start_row = start_row as usize;
        let start_col = start_col as usize;
        rows.resize_with(start_row, Vec::new);
        for (offset, data_row) in range.rows().enumerate() {
            let row_index = start_row + offset;
            let mut cells = vec![Cell::empty(); start_col];
            for (col_offset, data) in data_row.iter().enumerate() {
                let col_index = start_col + col_offset;
                let mut cell = Cell::new(convert(data));
                if let Some(target) = hyperlinks.get(&(row_index, col_index)) {
                    cell.hyperlink = Some(target.clone());
                }
                cells.push(cell);
            }
            rows.push(cells);
        }
    }

    Ok(Sheet::new(name, rows))
}

fn convert(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) | Data::DateTimeIso(_) => data
            .as_datetime()
            .map_or_else(|| CellValue::Text(data.to_string()), CellValue::Date),
        Data::DurationIso(_) | Data::Error(_) => CellValue::Text(data.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn whitespace_text_is_empty_but_zero_is_not() {
        assert!(Cell::text("   ").is_empty());
        assert!(Cell::empty().is_empty());
        assert!(!Cell::new(CellValue::Int(0)).is_empty());
        assert!(!Cell::new(CellValue::Float(0.0)).is_empty());
    }

    #[test]
    fn dates_render_as_iso_day() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        assert_eq!(Cell::new(CellValue::Date(dt)).as_text(), "2024-03-09");
    }

    #[test]
    fn whole_floats_render_without_fraction() {
        assert_eq!(Cell::new(CellValue::Float(42.0)).as_text(), "42");
        assert_eq!(Cell::new(CellValue::Float(2.5)).as_text(), "2.5");
    }

    #[test]
    fn hyperlink_target_wins_over_display_text() {
        let cell = Cell::text("AC 12/2024").with_hyperlink("https://files.example/ac12.pdf");
        assert_eq!(cell.field_value(), "https://files.example/ac12.pdf");
        assert_eq!(Cell::text("  plain  ").field_value(), "plain");
    }

    #[test]
    fn garbage_bytes_are_not_a_workbook() {
        assert!(matches!(
            load_active_sheet(b"definitely not a spreadsheet"),
            Err(ScraperError::Workbook(_))
        ));
    }
}
