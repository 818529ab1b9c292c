use serde::Deserialize;
use serde_json::{Map, Value};

/// One row of the table API, kept as raw JSON: only a handful of columns are
/// read and their value types vary between rows.
pub type RawRow = Map<String, Value>;

/// One page of `EntityList/GetData`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TablePage {
    #[serde(rename = "Data", default)]
    pub data: Option<Vec<RawRow>>,
    #[serde(rename = "Total", default)]
    pub total: Option<u64>,
}

/// Response of the map layer `getfeature` endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Option<Vec<Feature>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Geometry {
    #[serde(default)]
    pub coordinates: Value,
}
