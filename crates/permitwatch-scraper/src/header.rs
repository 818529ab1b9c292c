//! Header-row detection for government-published permit spreadsheets.
//!
//! Files carry a variable number of title and preamble rows above the real
//! column labels. The header row is the first row whose non-empty cells are
//! dense enough in permit vocabulary.

use crate::workbook::Sheet;

/// Number of leading rows searched for a header.
pub const DEFAULT_MAX_ROWS_TO_SCAN: usize = 15;

/// Substrings that mark a cell as a likely column label. Matched against
/// lower-cased, trimmed cell text.
pub const HEADER_KEYWORDS: &[&str] = &[
    "nr",
    "numar",
    "număr",
    "data",
    "dată",
    "adresa",
    "adresă",
    "beneficiar",
    "strada",
    "stradă",
    "ac",
    "ad",
    "autorizat",
    "lucrare",
    "titular",
    "solicitant",
    "descriere",
    "crt",
    "emiterii",
    "inreg",
    "cadastral",
    "scopul",
];

const MIN_MATCHES: usize = 3;

/// Accepted header row: its 0-based sheet index and one name per column.
/// Unlabeled columns are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRow {
    pub index: usize,
    pub names: Vec<Option<String>>,
}

/// Finds the first row within `max_rows_to_scan` that has at least three
/// keyword cells making up at least 40 % of its non-empty cells.
#[must_use]
pub fn detect_header_row(sheet: &Sheet, max_rows_to_scan: usize) -> Option<HeaderRow> {
    let limit = max_rows_to_scan.min(sheet.row_count());

    (0..limit).find_map(|index| {
        let row = sheet.row(index);
        let mut non_empty = 0usize;
        let mut matching = 0usize;

        for cell in row.iter().filter(|c| !c.is_empty()) {
            non_empty += 1;
            let text = cell.as_text().to_lowercase();
            if HEADER_KEYWORDS.iter().any(|kw| text.contains(kw)) {
                matching += 1;
            }
        }

        // matching / non_empty >= 0.4, kept in integers
        let accepted = matching >= MIN_MATCHES && non_empty > 0 && matching * 5 >= non_empty * 2;
        accepted.then(|| HeaderRow {
            index,
            names: row
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(collapse_whitespace(&cell.as_text()))
                    }
                })
                .collect(),
        })
    })
}

/// Leftmost column whose label contains `adresa`, case-insensitively.
#[must_use]
pub fn find_address_column(names: &[Option<String>]) -> Option<usize> {
    names.iter().position(|name| {
        name.as_deref()
            .is_some_and(|n| n.to_lowercase().contains("adresa"))
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
