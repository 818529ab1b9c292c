//! Adapter for the city urbanism portal: a paginated table API joined by
//! permit id with a map geometry layer.

mod merge;
mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use permitwatch_core::{AppConfig, CanonicalPermitRecord, IngestObserver, Issuer, TracingObserver};

use crate::error::ScraperError;
use crate::http::{HttpProfile, PermitHttpClient};
use crate::source::PermitSource;

pub use merge::{build_address, filter_and_merge, index_features};
pub use types::{Feature, FeatureCollection, Geometry, RawRow, TablePage};

/// Application id the portal expects in the `x-app` header.
pub const PORTAL_APP_ID: &str = "6";

#[derive(Debug, Clone)]
pub struct PaginatedSourceConfig {
    pub table_url: String,
    pub map_url: String,
    /// Recorded as every permit's `source_url`; also sent as `Referer`.
    pub viewer_url: String,
    pub page_size: u32,
    pub page_delay: Duration,
    pub target_sector: String,
    /// Entity list id of the permits table.
    pub table_id: u32,
    pub table_filters: String,
    pub map_layer: u32,
    pub map_srs: String,
    pub map_bbox: String,
    pub map_id: u32,
}

impl PaginatedSourceConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            table_url: config.pmb_table_url.clone(),
            map_url: config.pmb_map_url.clone(),
            viewer_url: config.pmb_viewer_url.clone(),
            page_size: config.pmb_page_size,
            page_delay: Duration::from_millis(config.pmb_page_delay_ms),
            target_sector: config.pmb_target_sector.clone(),
            ..Self::default()
        }
    }
}

impl Default for PaginatedSourceConfig {
    fn default() -> Self {
        Self {
            table_url: String::new(),
            map_url: String::new(),
            viewer_url: String::new(),
            page_size: 5000,
            page_delay: Duration::from_millis(500),
            target_sector: "1".to_owned(),
            table_id: 5,
            table_filters: r#"{"fld_61":""}"#.to_owned(),
            map_layer: 11,
            map_srs: "EPSG:3844".to_owned(),
            // Stereo70 rectangle around Bucharest: min_x, min_y, max_x, max_y
            map_bbox: "573000,314000,602000,340000,EPSG:3844".to_owned(),
            map_id: 2,
        }
    }
}

pub struct PaginatedApiSource {
    client: PermitHttpClient,
    config: PaginatedSourceConfig,
    observer: Arc<dyn IngestObserver>,
}

impl PaginatedApiSource {
    #[must_use]
    pub fn new(client: PermitHttpClient, config: PaginatedSourceConfig) -> Self {
        Self {
            client,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Builds the adapter with the portal's JSON client profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let profile =
            HttpProfile::json_api(&config.pmb_viewer_url, PORTAL_APP_ID).with_app_config(config);
        let client = PermitHttpClient::new(&profile)?;
        Ok(Self::new(client, PaginatedSourceConfig::from_app_config(config)))
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Harvests every page of the table API.
    ///
    /// Stops on an empty page or once `skip + page_size` reaches the reported
    /// total. A failed request ends the harvest early with the rows gathered
    /// so far.
    pub async fn fetch_table(&self) -> Vec<RawRow> {
        let page_size = u64::from(self.config.page_size.max(1));
        let mut rows = Vec::new();
        let mut skip = 0u64;

        loop {
            let page_number = skip / page_size + 1;
            let query = [
                ("take", page_size.to_string()),
                ("skip", skip.to_string()),
                ("page", page_number.to_string()),
                ("pageSize", page_size.to_string()),
                ("id", self.config.table_id.to_string()),
                ("filters", self.config.table_filters.clone()),
            ];

            let page: TablePage = match self
                .client
                .get_json(&self.config.table_url, &query, "permit table page")
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        page = page_number,
                        rows_so_far = rows.len(),
                        error = %e,
                        "table page request failed, keeping rows fetched so far"
                    );
                    break;
                }
            };

            let total = page.total.unwrap_or(0);
            let data = page.data.unwrap_or_default();
            self.observer
                .page_fetched(Issuer::Pmb, page_number, data.len(), total);

            if data.is_empty() {
                break;
            }
            rows.extend(data);

            if skip + page_size >= total {
                break;
            }
            skip += page_size;
            if !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
        }

        tracing::info!(rows = rows.len(), "table API harvest finished");
        rows
    }

    /// Fetches the geometry layer over the fixed bounding box, keyed by
    /// feature id. A failed request yields an empty map.
    pub async fn fetch_geometry(&self) -> HashMap<String, Feature> {
        let query = [
            ("layer", self.config.map_layer.to_string()),
            ("srs", self.config.map_srs.clone()),
            ("bbox", self.config.map_bbox.clone()),
            ("idMap", self.config.map_id.to_string()),
        ];

        match self
            .client
            .get_large_json::<FeatureCollection>(&self.config.map_url, &query, "geometry layer")
            .await
        {
            Ok(collection) => {
                let features = index_features(collection.features.unwrap_or_default());
                tracing::info!(features = features.len(), "geometry layer fetched");
                features
            }
            Err(e) => {
                tracing::warn!(error = %e, "geometry layer request failed, continuing without coordinates");
                HashMap::new()
            }
        }
    }
}

#[async_trait]
impl PermitSource for PaginatedApiSource {
    fn issuer(&self) -> Issuer {
        Issuer::Pmb
    }

    async fn scrape_permits(&self) -> Result<Vec<CanonicalPermitRecord>, ScraperError> {
        let rows = self.fetch_table().await;
        if rows.is_empty() {
            return Err(ScraperError::NoPermitsFetched);
        }
        let geometry = self.fetch_geometry().await;
        let records = filter_and_merge(
            &rows,
            &geometry,
            &self.config.target_sector,
            &self.config.viewer_url,
        );
        tracing::info!(
            table_rows = rows.len(),
            permits = records.len(),
            sector = %self.config.target_sector,
            "filtered permits for target sector"
        );
        Ok(records)
    }
}
