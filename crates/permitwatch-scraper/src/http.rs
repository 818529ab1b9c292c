//! Configurable HTTP client profile shared by the source adapters.
//!
//! Browser-mimicking headers live here, in [`HttpProfile`] presets, so an
//! adapter only decides *which* profile it needs.

use std::time::Duration;

use permitwatch_core::AppConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::ScraperError;
use crate::rate_limit::retry_with_backoff;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Base headers, timeouts and retry policy for one family of requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProfile {
    pub user_agent: String,
    pub base_headers: Vec<(String, String)>,
    pub timeout_secs: u64,
    /// Timeout for large bodies: spreadsheet files and the geometry layer.
    pub download_timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for HttpProfile {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            base_headers: Vec::new(),
            timeout_secs: 30,
            download_timeout_secs: 60,
            max_retries: 2,
            backoff_base_ms: 500,
        }
    }
}

impl HttpProfile {
    /// Profile for fetching listing pages and files like a browser would.
    #[must_use]
    pub fn html() -> Self {
        Self {
            base_headers: vec![
                (
                    "accept".to_owned(),
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_owned(),
                ),
                (
                    "accept-language".to_owned(),
                    "ro-RO,ro;q=0.9,en-US;q=0.8,en;q=0.7".to_owned(),
                ),
            ],
            ..Self::default()
        }
    }

    /// Profile for XHR-style JSON endpoints of a map portal application.
    ///
    /// `referer` is the viewer page the portal expects requests to come from;
    /// `app_id` goes into the `x-app` header.
    #[must_use]
    pub fn json_api(referer: &str, app_id: &str) -> Self {
        Self {
            base_headers: vec![
                (
                    "accept".to_owned(),
                    "application/json, text/javascript, */*; q=0.01".to_owned(),
                ),
                ("x-requested-with".to_owned(), "XMLHttpRequest".to_owned()),
                ("x-app".to_owned(), app_id.to_owned()),
                ("referer".to_owned(), referer.to_owned()),
            ],
            ..Self::default()
        }
    }

    /// Overrides user agent, timeouts and retry policy from the environment config.
    #[must_use]
    pub fn with_app_config(mut self, config: &AppConfig) -> Self {
        self.user_agent.clone_from(&config.http_user_agent);
        self.timeout_secs = config.http_timeout_secs;
        self.download_timeout_secs = config.http_download_timeout_secs;
        self.max_retries = config.http_max_retries;
        self.backoff_base_ms = config.http_retry_backoff_base_ms;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    fn header_map(&self) -> Result<HeaderMap, ScraperError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.base_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ScraperError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| ScraperError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

/// `reqwest` client bound to one [`HttpProfile`].
///
/// Every request is retried on transient failures (network errors, 429, 5xx)
/// and non-2xx responses surface as [`ScraperError::UnexpectedStatus`].
#[derive(Debug, Clone)]
pub struct PermitHttpClient {
    client: Client,
    download_timeout: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl PermitHttpClient {
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidHeader`] for a malformed base header and
    /// [`ScraperError::Http`] if the underlying client cannot be built.
    pub fn new(profile: &HttpProfile) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(profile.timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(profile.user_agent.as_str())
            .default_headers(profile.header_map()?)
            .build()?;
        Ok(Self {
            client,
            download_timeout: Duration::from_secs(profile.download_timeout_secs),
            max_retries: profile.max_retries,
            backoff_base_ms: profile.backoff_base_ms,
        })
    }

    /// Fetches a page body as text.
    ///
    /// # Errors
    ///
    /// Network failures, non-2xx statuses after retries.
    pub async fn get_text(&self, url: &str) -> Result<String, ScraperError> {
        let body = self.fetch(url, &[], None).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Downloads a file body using the download timeout.
    ///
    /// # Errors
    ///
    /// Network failures, non-2xx statuses after retries.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ScraperError> {
        self.fetch(url, &[], Some(self.download_timeout)).await
    }

    /// Fetches and decodes a JSON document. `context` names the document in errors.
    ///
    /// # Errors
    ///
    /// Network failures, non-2xx statuses after retries, and
    /// [`ScraperError::Deserialize`] for a body that does not decode into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, ScraperError> {
        let body = self.fetch(url, query, None).await?;
        decode_json(&body, context, url)
    }

    /// Same as [`Self::get_json`] but with the download timeout, for large layers.
    ///
    /// # Errors
    ///
    /// See [`Self::get_json`].
    pub async fn get_large_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, ScraperError> {
        let body = self.fetch(url, query, Some(self.download_timeout)).await?;
        decode_json(&body, context, url)
    }

    async fn fetch(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, ScraperError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async move {
            let mut request = self.client.get(url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(timeout) = timeout {
                request = request.timeout(timeout);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);
                return Err(ScraperError::RateLimited {
                    domain: extract_domain(url),
                    retry_after_secs,
                });
            }

            if !status.is_success() {
                return Err(ScraperError::UnexpectedStatus {
                    status: status.as_u16(),
                    url: url.to_owned(),
                });
            }

            let body = response.bytes().await?;
            Ok(body.to_vec())
        })
        .await
    }
}

fn decode_json<T: DeserializeOwned>(
    body: &[u8],
    context: &str,
    url: &str,
) -> Result<T, ScraperError> {
    serde_json::from_slice(body).map_err(|e| ScraperError::Deserialize {
        context: format!("{context} from {url}"),
        source: e,
    })
}

/// Hostname of `url` for error messages; the full string if it does not parse.
fn extract_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}
