//! Adapter for the issuer that publishes permits as spreadsheet files linked
//! from an HTML listing page.

mod discover;
mod extract;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use permitwatch_core::{AppConfig, CanonicalPermitRecord, IngestObserver, Issuer, TracingObserver};
use reqwest::Url;

use crate::error::ScraperError;
use crate::http::{HttpProfile, PermitHttpClient};
use crate::source::PermitSource;

pub use discover::{parse_listing, DiscoveredFile};
pub use extract::{extract_from_file, extract_from_sheet};

#[derive(Debug, Clone)]
pub struct TabularSourceConfig {
    pub listing_url: String,
    /// Pause between consecutive file downloads.
    pub download_delay: Duration,
}

impl TabularSourceConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            listing_url: config.ps1_listing_url.clone(),
            download_delay: Duration::from_millis(config.ps1_download_delay_ms),
        }
    }
}

pub struct TabularFileSource {
    client: PermitHttpClient,
    config: TabularSourceConfig,
    observer: Arc<dyn IngestObserver>,
}

impl TabularFileSource {
    #[must_use]
    pub fn new(client: PermitHttpClient, config: TabularSourceConfig) -> Self {
        Self {
            client,
            config,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Builds the adapter with the HTML client profile from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let client = PermitHttpClient::new(&HttpProfile::html().with_app_config(config))?;
        Ok(Self::new(client, TabularSourceConfig::from_app_config(config)))
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Fetches the listing page and returns its spreadsheet links.
    ///
    /// # Errors
    ///
    /// [`ScraperError::InvalidUrl`] for a malformed listing URL; any fetch
    /// failure of the listing page itself.
    pub async fn discover_files(&self) -> Result<Vec<DiscoveredFile>, ScraperError> {
        let page_url =
            Url::parse(&self.config.listing_url).map_err(|e| ScraperError::InvalidUrl {
                url: self.config.listing_url.clone(),
                reason: e.to_string(),
            })?;
        let html = self.client.get_text(page_url.as_str()).await?;
        Ok(parse_listing(&html, &page_url))
    }

    /// Downloads one file. Failures are logged and reported as `None`.
    pub async fn fetch_file(&self, url: &str) -> Option<Vec<u8>> {
        match self.client.get_bytes(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url, error = %e, "spreadsheet download failed, skipping");
                None
            }
        }
    }

    /// Downloads `file` into `dir` and extracts its permits. Any failure
    /// yields an empty list.
    async fn process_file(
        &self,
        dir: &Path,
        index: usize,
        file: &DiscoveredFile,
    ) -> Vec<CanonicalPermitRecord> {
        let Some(bytes) = self.fetch_file(&file.download_url).await else {
            return Vec::new();
        };

        let path = dir.join(local_filename(index, &file.original_filename));
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            tracing::warn!(path = %path.display(), error = %e, "could not store download, skipping");
            return Vec::new();
        }
        drop(bytes);

        match tokio::fs::read(&path).await {
            Ok(stored) => extract_from_file(&stored, &file.download_url),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not read download, skipping");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl PermitSource for TabularFileSource {
    fn issuer(&self) -> Issuer {
        Issuer::Ps1
    }

    async fn scrape_permits(&self) -> Result<Vec<CanonicalPermitRecord>, ScraperError> {
        let files = self.discover_files().await?;
        if files.is_empty() {
            return Err(ScraperError::NoFilesFound {
                url: self.config.listing_url.clone(),
            });
        }
        tracing::info!(files = files.len(), "found spreadsheet files to process");

        let temp_dir = tempfile::TempDir::new()?;
        let mut records = Vec::new();
        let file_count = files.len();

        for (index, file) in files.iter().enumerate() {
            if index > 0 && !self.config.download_delay.is_zero() {
                tokio::time::sleep(self.config.download_delay).await;
            }
            let extracted = self.process_file(temp_dir.path(), index, file).await;
            self.observer.file_processed(
                Issuer::Ps1,
                index + 1,
                file_count,
                &file.original_filename,
                extracted.len(),
            );
            records.extend(extracted);
        }

        if let Err(e) = temp_dir.close() {
            tracing::warn!(error = %e, "could not remove download directory");
        }
        Ok(records)
    }
}

/// Index-prefixed, path-safe name for a download inside the temp directory.
fn local_filename(index: usize, original: &str) -> String {
    let safe: String = original
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = safe.trim_start_matches('.');
    if safe.is_empty() {
        format!("{index:03}-download")
    } else {
        format!("{index:03}-{safe}")
    }
}
