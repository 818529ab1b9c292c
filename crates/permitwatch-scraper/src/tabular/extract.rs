use permitwatch_core::{CanonicalPermitRecord, Issuer, PermitFields};

use crate::header::{detect_header_row, find_address_column, DEFAULT_MAX_ROWS_TO_SCAN};
use crate::workbook::{load_active_sheet, Sheet};

/// Extracts one permit per usable data row of a downloaded workbook.
///
/// Never fails: an unreadable workbook, an undetectable header or a missing
/// address column all yield an empty list and a log line.
#[must_use]
pub fn extract_from_file(bytes: &[u8], source_url: &str) -> Vec<CanonicalPermitRecord> {
    match load_active_sheet(bytes) {
        Ok(sheet) => extract_from_sheet(&sheet, source_url),
        Err(e) => {
            tracing::warn!(source_url, error = %e, "skipping unreadable workbook");
            Vec::new()
        }
    }
}

/// Row extraction over an already loaded sheet.
#[must_use]
pub fn extract_from_sheet(sheet: &Sheet, source_url: &str) -> Vec<CanonicalPermitRecord> {
    let Some(header) = detect_header_row(sheet, DEFAULT_MAX_ROWS_TO_SCAN) else {
        tracing::warn!(source_url, sheet = %sheet.name, "no header row found, skipping file");
        return Vec::new();
    };
    let Some(address_col) = find_address_column(&header.names) else {
        tracing::warn!(source_url, sheet = %sheet.name, "no address column, skipping file");
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in sheet.rows().skip(header.index + 1) {
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let Some(address_cell) = row.get(address_col).filter(|cell| !cell.is_empty()) else {
            continue;
        };

        let mut fields = PermitFields::new();
        for (name, cell) in header.names.iter().zip(row) {
            let Some(name) = name else { continue };
            if cell.is_empty() {
                continue;
            }
            fields.insert(name.clone(), cell.field_value());
        }

        records.push(CanonicalPermitRecord::new(
            Issuer::Ps1,
            address_cell.as_text(),
            fields,
            source_url,
        ));
    }

    tracing::debug!(source_url, records = records.len(), "extracted permits from sheet");
    records
}
