//! Minimal OOXML package reader for the parts `calamine` leaves out.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use crate::error::ScraperError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Inclusive rectangle of 0-based `(row, column)` cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct CellRect {
    first: (usize, usize),
    last: (usize, usize),
}

impl CellRect {
    pub(super) fn new(a: (usize, usize), b: (usize, usize)) -> Self {
        Self {
            first: (a.0.min(b.0), a.1.min(b.1)),
            last: (a.0.max(b.0), a.1.max(b.1)),
        }
    }

    /// `"B3"` or `"A1:C9"`.
    fn parse(range: &str) -> Option<Self> {
        let (first, last) = range.split_once(':').unwrap_or((range, range));
        Some(Self::new(parse_cell_ref(first)?, parse_cell_ref(last)?))
    }

    fn intersect(self, other: Self) -> Option<Self> {
        let first = (self.first.0.max(other.first.0), self.first.1.max(other.first.1));
        let last = (self.last.0.min(other.last.0), self.last.1.min(other.last.1));
        (first.0 <= last.0 && first.1 <= last.1).then_some(Self { first, last })
    }

    fn cells(self) -> impl Iterator<Item = (usize, usize)> {
        (self.first.0..=self.last.0)
            .flat_map(move |row| (self.first.1..=self.last.1).map(move |col| (row, col)))
    }
}

/// `true` when the bytes are a zip package with a workbook part.
pub(super) fn is_package(bytes: &[u8]) -> bool {
    ZipArchive::new(Cursor::new(bytes))
        .map(|archive| archive.index_for_name(WORKBOOK_PART).is_some())
        .unwrap_or(false)
}

/// 0-based index of the tab that was selected when the workbook was saved.
pub(super) fn active_tab(bytes: &[u8]) -> Result<usize, ScraperError> {
    let mut archive = open(bytes)?;
    let xml = read_part(&mut archive, WORKBOOK_PART)?;
    let mut active = 0;
    for_each_element(&xml, |element| {
        if element.local_name().as_ref() == b"workbookView" {
            if let Some(tab) = attribute(element, b"activeTab").and_then(|v| v.parse().ok()) {
                active = tab;
            }
        }
    })?;
    Ok(active)
}

/// Hyperlink targets of the `sheet_index`-th sheet keyed by 0-based
/// `(row, column)`. Ranged hyperlinks are expanded to every covered cell
/// inside `used`, the sheet's data range; links without an external target
/// are skipped.
pub(super) fn sheet_hyperlinks(
    bytes: &[u8],
    sheet_index: usize,
    used: CellRect,
) -> Result<HashMap<(usize, usize), String>, ScraperError> {
    let mut archive = open(bytes)?;

    let workbook_xml = read_part(&mut archive, WORKBOOK_PART)?;
    let mut sheet_rel_ids = Vec::new();
    for_each_element(&workbook_xml, |element| {
        if element.local_name().as_ref() == b"sheet" {
            sheet_rel_ids.push(attribute(element, b"id").unwrap_or_default());
        }
    })?;
    let Some(rel_id) = sheet_rel_ids.get(sheet_index) else {
        return Ok(HashMap::new());
    };

    let workbook_rels = read_relationships(&mut archive, WORKBOOK_RELS_PART)?;
    let Some(target) = workbook_rels.get(rel_id) else {
        return Ok(HashMap::new());
    };
    let sheet_part = resolve_part(target);

    let sheet_xml = read_part(&mut archive, &sheet_part)?;
    let mut links: Vec<(String, String)> = Vec::new();
    for_each_element(&sheet_xml, |element| {
        if element.local_name().as_ref() == b"hyperlink" {
            if let (Some(cell_ref), Some(id)) = (attribute(element, b"ref"), attribute(element, b"id"))
            {
                links.push((cell_ref, id));
            }
        }
    })?;
    if links.is_empty() {
        return Ok(HashMap::new());
    }

    let sheet_rels = read_relationships(&mut archive, &rels_part_for(&sheet_part))?;
    let mut hyperlinks = HashMap::new();
    for (cell_ref, id) in links {
        let Some(target) = sheet_rels.get(&id) else {
            continue;
        };
        for position in expand_range(&cell_ref, used) {
            hyperlinks.insert(position, target.clone());
        }
    }
    Ok(hyperlinks)
}

fn open(bytes: &[u8]) -> Result<Archive<'_>, ScraperError> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| ScraperError::Workbook(e.to_string()))
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<String, ScraperError> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| ScraperError::Workbook(format!("{name}: {e}")))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Relationship id to target. A missing rels part means no relationships.
fn read_relationships(
    archive: &mut Archive<'_>,
    name: &str,
) -> Result<HashMap<String, String>, ScraperError> {
    if archive.index_for_name(name).is_none() {
        return Ok(HashMap::new());
    }
    let xml = read_part(archive, name)?;
    let mut rels = HashMap::new();
    for_each_element(&xml, |element| {
        if element.local_name().as_ref() == b"Relationship" {
            if let (Some(id), Some(target)) =
                (attribute(element, b"Id"), attribute(element, b"Target"))
            {
                rels.insert(id, target);
            }
        }
    })?;
    Ok(rels)
}

/// Workbook relationship targets are relative to `xl/` unless absolute.
fn resolve_part(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_owned()
    } else if target.starts_with("xl/") {
        target.to_owned()
    } else {
        format!("xl/{target}")
    }
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
fn rels_part_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn for_each_element<F>(xml: &str, mut visit: F) -> Result<(), ScraperError>
where
    F: FnMut(&BytesStart<'_>),
{
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref element) | Event::Empty(ref element)) => visit(element),
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                return Err(ScraperError::Workbook(format!(
                    "malformed XML at {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }
}

/// Attribute value by local name, so `r:id` matches `id`.
fn attribute(element: &BytesStart<'_>, local_name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local_name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// `"B3"` -> `(2, 1)`; `None` for anything that is not a cell reference.
fn parse_cell_ref(cell_ref: &str) -> Option<(usize, usize)> {
    let cell_ref = cell_ref.trim().replace('$', "");
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let row: usize = digits.parse().ok()?;
    let col = letters
        .chars()
        .try_fold(0usize, |acc, c| {
            let digit = (c.to_ascii_uppercase() as usize).checked_sub('A' as usize)? + 1;
            acc.checked_mul(26)?.checked_add(digit)
        })?;
    Some((row.checked_sub(1)?, col.checked_sub(1)?))
}

/// Cells of a hyperlink `ref` that fall inside `used`.
fn expand_range(range: &str, used: CellRect) -> Vec<(usize, usize)> {
    CellRect::parse(range)
        .and_then(|rect| rect.intersect(used))
        .map(|rect| rect.cells().collect())
        .unwrap_or_default()
}
