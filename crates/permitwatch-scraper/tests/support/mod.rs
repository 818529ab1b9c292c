//! Minimal `.xlsx` packages built in memory for workbook tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Clone)]
pub enum Val {
    Blank,
    Text(String),
    Number(f64),
    /// Excel serial day number, rendered with a date number format.
    Date(u32),
}

pub fn t(text: &str) -> Val {
    Val::Text(text.to_owned())
}

pub fn n(value: f64) -> Val {
    Val::Number(value)
}

struct SheetSpec {
    name: String,
    rows: Vec<Vec<Val>>,
    hyperlinks: Vec<(String, String)>,
}

#[derive(Default)]
pub struct XlsxBuilder {
    sheets: Vec<SheetSpec>,
    active: Option<usize>,
}

impl XlsxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, name: &str, rows: Vec<Vec<Val>>) -> Self {
        self.sheets.push(SheetSpec {
            name: name.to_owned(),
            rows,
            hyperlinks: Vec::new(),
        });
        self
    }

    /// Attaches an external hyperlink to `cell_ref` of the last added sheet.
    pub fn hyperlink(mut self, cell_ref: &str, target: &str) -> Self {
        if let Some(sheet) = self.sheets.last_mut() {
            sheet
                .hyperlinks
                .push((cell_ref.to_owned(), target.to_owned()));
        }
        self
    }

    pub fn active(mut self, index: usize) -> Self {
        self.active = Some(index);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut shared: Vec<String> = Vec::new();
        let mut parts: Vec<(String, String)> = Vec::new();

        for (i, sheet) in self.sheets.iter().enumerate() {
            let number = i + 1;
            parts.push((
                format!("xl/worksheets/sheet{number}.xml"),
                sheet_xml(sheet, &mut shared),
            ));
            if !sheet.hyperlinks.is_empty() {
                parts.push((
                    format!("xl/worksheets/_rels/sheet{number}.xml.rels"),
                    sheet_rels_xml(sheet),
                ));
            }
        }

        parts.push(("[Content_Types].xml".to_owned(), content_types_xml(self.sheets.len())));
        parts.push(("_rels/.rels".to_owned(), root_rels_xml()));
        parts.push(("xl/workbook.xml".to_owned(), workbook_xml(&self.sheets, self.active)));
        parts.push((
            "xl/_rels/workbook.xml.rels".to_owned(),
            workbook_rels_xml(self.sheets.len()),
        ));
        parts.push(("xl/styles.xml".to_owned(), styles_xml()));
        parts.push(("xl/sharedStrings.xml".to_owned(), shared_strings_xml(&shared)));

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, body) in parts {
            zip.start_file(name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(char::from(b'A' + u8::try_from(index % 26).unwrap()));
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn sheet_xml(sheet: &SheetSpec, shared: &mut Vec<String>) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheetData>"#);
    for (r, row) in sheet.rows.iter().enumerate() {
        let row_number = r + 1;
        xml.push_str(&format!(r#"<row r="{row_number}">"#));
        for (c, value) in row.iter().enumerate() {
            let cell_ref = format!("{}{row_number}", column_letters(c));
            match value {
                Val::Blank => {}
                Val::Text(text) => {
                    let idx = shared.len();
                    shared.push(text.clone());
                    xml.push_str(&format!(r#"<c r="{cell_ref}" t="s"><v>{idx}</v></c>"#));
                }
                Val::Number(v) => {
                    xml.push_str(&format!(r#"<c r="{cell_ref}"><v>{v}</v></c>"#));
                }
                Val::Date(serial) => {
                    xml.push_str(&format!(r#"<c r="{cell_ref}" s="1"><v>{serial}</v></c>"#));
                }
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");
    if !sheet.hyperlinks.is_empty() {
        xml.push_str("<hyperlinks>");
        for (i, (cell_ref, _)) in sheet.hyperlinks.iter().enumerate() {
            xml.push_str(&format!(r#"<hyperlink ref="{cell_ref}" r:id="rIdH{i}"/>"#));
        }
        xml.push_str("</hyperlinks>");
    }
    xml.push_str("</worksheet>");
    xml
}

fn sheet_rels_xml(sheet: &SheetSpec) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}">"#);
    for (i, (_, target)) in sheet.hyperlinks.iter().enumerate() {
        xml.push_str(&format!(
            r#"<Relationship Id="rIdH{i}" Type="{REL_NS}/hyperlink" Target="{}" TargetMode="External"/>"#,
            escape(target)
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn workbook_xml(sheets: &[SheetSpec], active: Option<usize>) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}">"#);
    if let Some(active) = active {
        xml.push_str(&format!(
            r#"<bookViews><workbookView activeTab="{active}"/></bookViews>"#
        ));
    }
    xml.push_str("<sheets>");
    for (i, sheet) in sheets.iter().enumerate() {
        let number = i + 1;
        xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{number}" r:id="rId{number}"/>"#,
            escape(&sheet.name)
        ));
    }
    xml.push_str("</sheets></workbook>");
    xml
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}">"#);
    for number in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{number}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{number}.xml"/>"#
        ));
    }
    xml.push_str(&format!(
        r#"<Relationship Id="rIdStyles" Type="{REL_NS}/styles" Target="styles.xml"/><Relationship Id="rIdStrings" Type="{REL_NS}/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#
    ));
    xml
}

fn root_rels_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_REL_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
    )
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/><Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#,
    );
    for number in 1..=sheet_count {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{number}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }
    xml.push_str("</Types>");
    xml
}

fn styles_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="{MAIN_NS}"><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#
    )
}

fn shared_strings_xml(strings: &[String]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="{MAIN_NS}" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    );
    for s in strings {
        xml.push_str(&format!(r#"<si><t xml:space="preserve">{}</t></si>"#, escape(s)));
    }
    xml.push_str("</sst>");
    xml
}

/// The standard permit workbook used across tests: a title row, a blank row,
/// the header on row 3, then five data rows of which three carry an address.
pub fn permit_workbook() -> Vec<u8> {
    XlsxBuilder::new()
        .sheet(
            "AC 2024",
            vec![
                vec![t("LISTA AUTORIZATIILOR DE CONSTRUIRE 2024")],
                vec![],
                vec![
                    t("Nr. crt."),
                    t("Nr. AC"),
                    t("Data emiterii"),
                    t("Beneficiar"),
                    t("Adresa imobil"),
                    t("Descriere lucrare"),
                ],
                vec![
                    n(1.0),
                    t("AC 101"),
                    Val::Date(45323),
                    t("Popescu Ion"),
                    t("Str. Paris 12"),
                    t("Construire locuinta P+1"),
                ],
                vec![n(2.0), t("AC 102"), Val::Date(45324), t("SC Alfa SRL"), Val::Blank, t("Extindere")],
                vec![
                    n(3.0),
                    t("AC 103"),
                    Val::Date(45325),
                    t("Ionescu Maria"),
                    t("  Bd. Aviatorilor 5  "),
                    Val::Blank,
                ],
                vec![n(4.0), t("AC 104"), Val::Date(45326), t("SC Beta SRL"), t("   ")],
                vec![
                    n(5.0),
                    t("AC 105"),
                    Val::Date(45327),
                    t("Georgescu Dan"),
                    t("Sos. Kiseleff 30"),
                    t("Desfiintare anexa"),
                ],
            ],
        )
        .hyperlink("B4", "https://primaria.example/acte/AC-101.pdf")
        .build()
}
