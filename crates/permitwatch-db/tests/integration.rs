//! Offline unit tests for permitwatch-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use permitwatch_core::{AppConfig, Environment, Issuer, RefreshStatus, RunStatus};
use permitwatch_db::{
    connect_pool_from_config, issuer_lock_key, DbError, MetadataRow, PoolConfig, SearchQuery,
};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: Some("postgres://example".to_string()),
        env: Environment::Test,
        log_level: "info".to_string(),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        http_timeout_secs: 30,
        http_download_timeout_secs: 60,
        http_user_agent: "ua".to_string(),
        http_max_retries: 2,
        http_retry_backoff_base_ms: 500,
        ps1_listing_url: "https://primaria.example/lista".to_string(),
        ps1_download_delay_ms: 300,
        pmb_table_url: "https://urbanism.example/table".to_string(),
        pmb_map_url: "https://urbanism.example/map".to_string(),
        pmb_viewer_url: "https://urbanism.example/viewer".to_string(),
        pmb_page_size: 5000,
        pmb_page_delay_ms: 500,
        pmb_target_sector: "1".to_string(),
        insert_batch_size: 500,
    }
}

fn metadata_row(issuer: &str, status: &str) -> MetadataRow {
    MetadataRow {
        issuer: issuer.to_string(),
        status: status.to_string(),
        total_count: 12,
        last_scraped_at: Some(Utc::now()),
        error_message: None,
        scraped_by_username: Some("ana".to_string()),
        updated_at: Utc::now(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn metadata_row_converts_to_refresh_status() {
    let status = RefreshStatus::try_from(metadata_row("pmb", "error")).unwrap();

    assert_eq!(status.issuer, Issuer::Pmb);
    assert_eq!(status.status, RunStatus::Error);
    assert_eq!(status.total_count, 12);
    assert_eq!(status.scraped_by_username.as_deref(), Some("ana"));
}

#[test]
fn metadata_row_with_unknown_status_is_rejected() {
    let result = RefreshStatus::try_from(metadata_row("ps1", "paused"));
    assert!(matches!(result, Err(DbError::InvalidRow(_))));
}

#[test]
fn issuer_lock_keys_are_distinct() {
    assert_ne!(issuer_lock_key(Issuer::Ps1), issuer_lock_key(Issuer::Pmb));
}

#[test]
fn search_query_escapes_wildcards() {
    let search = SearchQuery::new("100%_nou", None, 10).unwrap();
    assert_eq!(search.pattern(), "%100\\%\\_nou%");
}

#[tokio::test]
async fn connecting_without_database_url_fails_before_dialing() {
    let config = AppConfig {
        database_url: None,
        ..app_config()
    };
    let result = connect_pool_from_config(&config).await;
    assert!(matches!(result, Err(DbError::MissingDatabaseUrl)));
}
