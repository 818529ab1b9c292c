use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DEFAULT_PS1_LISTING_URL: &str = "https://primariasector1.ro/informatii-serviciul-urbanism/autorizatii-de-contruire-desfiintare/lista-autorizatiilor-de-construire/";
const DEFAULT_PMB_TABLE_URL: &str = "https://urbanism.pmb.ro/xportalurb/EntityList/GetData";
const DEFAULT_PMB_MAP_URL: &str = "https://urbanism.pmb.ro/xportalurb/map/getfeature";
const DEFAULT_PMB_VIEWER_URL: &str = "https://urbanism.pmb.ro/xportalurb/Map/MapRun?idMap=2&idApp=6";

/// One insert binds five parameters per row; Postgres allows 65535 per statement.
pub const MAX_INSERT_BATCH_SIZE: usize = 10_000;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let database_url = lookup("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty());

    let env = parse_environment(&or_default("PERMITWATCH_ENV", "development"))?;
    let log_level = or_default("PERMITWATCH_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("PERMITWATCH_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("PERMITWATCH_DB_MIN_CONNECTIONS", "1")?;
    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "PERMITWATCH_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }
    let db_acquire_timeout_secs = parse_u64("PERMITWATCH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let http_timeout_secs = parse_u64("PERMITWATCH_HTTP_TIMEOUT_SECS", "30")?;
    let http_download_timeout_secs = parse_u64("PERMITWATCH_HTTP_DOWNLOAD_TIMEOUT_SECS", "60")?;
    let http_user_agent = or_default("PERMITWATCH_HTTP_USER_AGENT", DEFAULT_USER_AGENT);
    let http_max_retries = parse_u32("PERMITWATCH_HTTP_MAX_RETRIES", "2")?;
    let http_retry_backoff_base_ms = parse_u64("PERMITWATCH_HTTP_RETRY_BACKOFF_BASE_MS", "500")?;

    let ps1_listing_url = or_default("PERMITWATCH_PS1_LISTING_URL", DEFAULT_PS1_LISTING_URL);
    let ps1_download_delay_ms = parse_u64("PERMITWATCH_PS1_DOWNLOAD_DELAY_MS", "300")?;

    let pmb_table_url = or_default("PERMITWATCH_PMB_TABLE_URL", DEFAULT_PMB_TABLE_URL);
    let pmb_map_url = or_default("PERMITWATCH_PMB_MAP_URL", DEFAULT_PMB_MAP_URL);
    let pmb_viewer_url = or_default("PERMITWATCH_PMB_VIEWER_URL", DEFAULT_PMB_VIEWER_URL);
    let pmb_page_size = require_positive(
        "PERMITWATCH_PMB_PAGE_SIZE",
        parse_u32("PERMITWATCH_PMB_PAGE_SIZE", "5000")?,
    )?;
    let pmb_page_delay_ms = parse_u64("PERMITWATCH_PMB_PAGE_DELAY_MS", "500")?;
    let pmb_target_sector = or_default("PERMITWATCH_PMB_TARGET_SECTOR", "1")
        .trim()
        .to_string();

    let insert_batch_size = require_positive(
        "PERMITWATCH_INSERT_BATCH_SIZE",
        parse_usize("PERMITWATCH_INSERT_BATCH_SIZE", "500")?,
    )?;
    if insert_batch_size > MAX_INSERT_BATCH_SIZE {
        return Err(ConfigError::InvalidEnvVar {
            var: "PERMITWATCH_INSERT_BATCH_SIZE".to_string(),
            reason: format!("must be at most {MAX_INSERT_BATCH_SIZE}"),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        http_timeout_secs,
        http_download_timeout_secs,
        http_user_agent,
        http_max_retries,
        http_retry_backoff_base_ms,
        ps1_listing_url,
        ps1_download_delay_ms,
        pmb_table_url,
        pmb_map_url,
        pmb_viewer_url,
        pmb_page_size,
        pmb_page_delay_ms,
        pmb_target_sector,
        insert_batch_size,
    })
}

fn require_positive<T>(var: &str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + From<u8>,
{
    if value < T::from(1) {
        return Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test` or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "PERMITWATCH_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
