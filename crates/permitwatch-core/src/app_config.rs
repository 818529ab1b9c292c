use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Production logs go to collectors, so they carry no ANSI colors.
    #[must_use]
    pub fn colored_logs(&self) -> bool {
        !self.is_production()
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Only the commands that talk to Postgres need it; see
    /// [`AppConfig::require_database_url`].
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub http_timeout_secs: u64,
    /// Spreadsheet downloads are larger than page fetches and get their own timeout.
    pub http_download_timeout_secs: u64,
    pub http_user_agent: String,
    pub http_max_retries: u32,
    pub http_retry_backoff_base_ms: u64,
    pub ps1_listing_url: String,
    pub ps1_download_delay_ms: u64,
    pub pmb_table_url: String,
    pub pmb_map_url: String,
    /// Map-viewer URL recorded as the provenance of every PMB permit.
    pub pmb_viewer_url: String,
    pub pmb_page_size: u32,
    pub pmb_page_delay_ms: u64,
    pub pmb_target_sector: String,
    pub insert_batch_size: usize,
}

impl AppConfig {
    /// The configured database URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `DATABASE_URL` is unset.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field(
                "http_download_timeout_secs",
                &self.http_download_timeout_secs,
            )
            .field("http_user_agent", &self.http_user_agent)
            .field("http_max_retries", &self.http_max_retries)
            .field(
                "http_retry_backoff_base_ms",
                &self.http_retry_backoff_base_ms,
            )
            .field("ps1_listing_url", &self.ps1_listing_url)
            .field("ps1_download_delay_ms", &self.ps1_download_delay_ms)
            .field("pmb_table_url", &self.pmb_table_url)
            .field("pmb_map_url", &self.pmb_map_url)
            .field("pmb_viewer_url", &self.pmb_viewer_url)
            .field("pmb_page_size", &self.pmb_page_size)
            .field("pmb_page_delay_ms", &self.pmb_page_delay_ms)
            .field("pmb_target_sector", &self.pmb_target_sector)
            .field("insert_batch_size", &self.insert_batch_size)
            .finish()
    }
}
