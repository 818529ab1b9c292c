use std::collections::HashMap;

use permitwatch_core::{CanonicalPermitRecord, Issuer, PermitFields, ADDRESS_FALLBACK};
use serde_json::Value;

use super::types::{Feature, RawRow};

/// Output field name to table column, in output order.
const TABLE_FIELDS: [(&str, &str); 11] = [
    ("ID", "id"),
    ("Permit Number", "fld_46"),
    ("Date", "fld_47"),
    ("Street Type", "fld_48_fktext"),
    ("Street", "fld_55"),
    ("Number", "fld_56"),
    ("Sector", "fld_57"),
    ("Beneficiary", "fld_64"),
    ("Description", "fld_58"),
    ("Cadastral", "fld_65"),
    ("CU Number", "fld_63"),
];

/// Output field name to feature property, added only when truthy.
const FEATURE_FIELDS: [(&str, &str); 4] = [
    ("AC Number", "nr_ac"),
    ("Value", "valoare"),
    ("Execution Validity", "exec_valab"),
    ("Function", "functiune"),
];

const SECTOR_COLUMN: &str = "fld_57";
const DATE_FIELD: &str = "Date";

/// Id-keyed lookup over the geometry layer. Features without an id are dropped.
#[must_use]
pub fn index_features(features: Vec<Feature>) -> HashMap<String, Feature> {
    features
        .into_iter()
        .filter(|feature| !feature.id.is_null())
        .map(|feature| (stringify(Some(&feature.id)), feature))
        .collect()
}

/// Keeps rows of `target_sector`, enriches them with matching geometry and
/// sorts newest first.
///
/// The sort compares the `Date` field as plain strings, so it is only
/// chronological for sortable date formats.
#[must_use]
pub fn filter_and_merge(
    rows: &[RawRow],
    geometry: &HashMap<String, Feature>,
    target_sector: &str,
    source_url: &str,
) -> Vec<CanonicalPermitRecord> {
    let target_sector = target_sector.trim();
    let mut records: Vec<CanonicalPermitRecord> = rows
        .iter()
        .filter(|row| stringify(row.get(SECTOR_COLUMN)).trim() == target_sector)
        .map(|row| {
            let mut fields = PermitFields::new();
            for (name, column) in TABLE_FIELDS {
                fields.insert(name.to_owned(), stringify(row.get(column)));
            }
            if let Some(feature) = geometry.get(&stringify(row.get("id"))) {
                merge_feature(&mut fields, feature);
            }
            CanonicalPermitRecord::new(Issuer::Pmb, build_address(row), fields, source_url)
        })
        .collect();

    records.sort_by(|a, b| {
        let a = a.field(DATE_FIELD).unwrap_or_default();
        let b = b.field(DATE_FIELD).unwrap_or_default();
        b.cmp(a)
    });
    records
}

/// `"{street type}, {street}, nr {number}, sector {sector}"` with empty parts
/// left out, or the fallback when nothing is present.
#[must_use]
pub fn build_address(row: &RawRow) -> String {
    let part = |column: &str| stringify(row.get(column)).trim().to_owned();
    let street_type = part("fld_48_fktext");
    let street = part("fld_55");
    let number = part("fld_56");
    let sector = part(SECTOR_COLUMN);

    let mut parts = Vec::with_capacity(4);
    if !street_type.is_empty() {
        parts.push(street_type);
    }
    if !street.is_empty() {
        parts.push(street);
    }
    if !number.is_empty() {
        parts.push(format!("nr {number}"));
    }
    if !sector.is_empty() {
        parts.push(format!("sector {sector}"));
    }

    if parts.is_empty() {
        ADDRESS_FALLBACK.to_owned()
    } else {
        parts.join(", ")
    }
}

fn merge_feature(fields: &mut PermitFields, feature: &Feature) {
    let first_pair = feature
        .geometry
        .as_ref()
        .and_then(|g| g.coordinates.as_array())
        .and_then(|coords| coords.first())
        .and_then(Value::as_array)
        .filter(|pair| pair.len() == 2);
    if let Some(pair) = first_pair {
        fields.insert("Coordinates X".to_owned(), stringify(pair.first()));
        fields.insert("Coordinates Y".to_owned(), stringify(pair.get(1)));
    }

    let Some(properties) = &feature.properties else {
        return;
    };
    for (name, key) in FEATURE_FIELDS {
        if let Some(value) = properties.get(key).filter(|v| is_truthy(v)) {
            fields.insert(name.to_owned(), stringify(Some(value)));
        }
    }
}

/// Strings as-is, numbers and booleans in their JSON form, absent or null as
/// the empty string.
fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
