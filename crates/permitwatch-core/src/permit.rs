use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Issuer;

/// Address used when a source row has none of the parts an address is built from.
pub const ADDRESS_FALLBACK: &str = "N/A";

/// Human-readable field name to stringified value, in source column order.
///
/// Keys are not guaranteed to be identical across records of one issuer:
/// sparse columns only appear when the source cell is non-empty.
pub type PermitFields = IndexMap<String, String>;

/// A permit normalized to the shape shared by every issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPermitRecord {
    pub issuer: Issuer,
    /// Free-text address. Never empty: either real text or [`ADDRESS_FALLBACK`].
    pub address: String,
    pub fields: PermitFields,
    /// Provenance: the spreadsheet URL or the map-viewer URL.
    pub source_url: String,
}

impl CanonicalPermitRecord {
    /// Builds a record, substituting [`ADDRESS_FALLBACK`] for a blank address.
    #[must_use]
    pub fn new(
        issuer: Issuer,
        address: impl Into<String>,
        fields: PermitFields,
        source_url: impl Into<String>,
    ) -> Self {
        let address = address.into();
        let address = if address.trim().is_empty() {
            ADDRESS_FALLBACK.to_string()
        } else {
            address
        };
        Self {
            issuer,
            address,
            fields,
            source_url: source_url.into(),
        }
    }

    /// Value of a named field, if the source provided it.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Insert payload handed to the persistence gateway, one per permit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitInsert {
    pub issuer: Issuer,
    pub address: String,
    pub data: PermitFields,
    pub source_url: String,
}

impl From<&CanonicalPermitRecord> for PermitInsert {
    fn from(record: &CanonicalPermitRecord) -> Self {
        Self {
            issuer: record.issuer,
            address: record.address.clone(),
            data: record.fields.clone(),
            source_url: record.source_url.clone(),
        }
    }
}

impl From<CanonicalPermitRecord> for PermitInsert {
    fn from(record: CanonicalPermitRecord) -> Self {
        Self {
            issuer: record.issuer,
            address: record.address,
            data: record.fields,
            source_url: record.source_url,
        }
    }
}
