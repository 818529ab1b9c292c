//! Postgres gateway for permit storage and per-issuer refresh status.

use std::time::Duration;

use permitwatch_core::{AppConfig, Issuer};
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

// Path relative to crates/permitwatch-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Pool sizing. A refresh holds one extra connection per locked issuer, so
/// `max_connections` should leave room for both issuers running at once.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: DEFAULT_MIN_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("status of {issuer} is not '{expected_status}'")]
    InvalidStatusTransition {
        issuer: Issuer,
        expected_status: &'static str,
    },
    #[error("stored row is invalid: {0}")]
    InvalidRow(String),
    #[error("invalid search: {0}")]
    InvalidQuery(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// What `db ping` reports about the permit schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbHealth {
    /// `permits_metadata` exists, so migrations have run.
    pub migrated: bool,
    /// Issuers with a status row; zero when not migrated.
    pub seeded_issuers: i64,
}

/// Opens the permit database pool.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established within the
/// acquire timeout.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Opens the pool described by `DATABASE_URL` and the `PERMITWATCH_DB_*`
/// settings.
///
/// # Errors
///
/// Returns [`DbError::MissingDatabaseUrl`] when no URL is configured, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_config(config: &AppConfig) -> Result<PgPool, DbError> {
    let database_url = config
        .require_database_url()
        .map_err(|_| DbError::MissingDatabaseUrl)?;
    connect_pool(database_url, PoolConfig::from_app_config(config))
        .await
        .map_err(DbError::from)
}

/// Applies the permit schema migrations that have not run yet.
///
/// Returns how many were applied by this call.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    // _sqlx_migrations does not exist on a fresh database; count that as zero.
    let applied_before = applied_migrations(pool).await;
    MIGRATOR.run(pool).await?;
    let applied_after = applied_migrations(pool).await;

    let delta = (applied_after - applied_before).max(0);
    Ok(usize::try_from(delta).unwrap_or(0))
}

async fn applied_migrations(pool: &PgPool) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = true")
        .fetch_one(pool)
        .await
        .unwrap_or(0)
}

/// Checks connectivity, then whether the schema is migrated and how many
/// issuers are seeded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the database is unreachable.
pub async fn health_check(pool: &PgPool) -> Result<DbHealth, DbError> {
    let migrated: bool =
        sqlx::query_scalar("SELECT to_regclass('public.permits_metadata') IS NOT NULL")
            .fetch_one(pool)
            .await?;
    if !migrated {
        return Ok(DbHealth {
            migrated,
            seeded_issuers: 0,
        });
    }

    let seeded_issuers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permits_metadata")
        .fetch_one(pool)
        .await?;
    Ok(DbHealth {
        migrated,
        seeded_issuers,
    })
}


pub mod lock;
pub mod metadata;
pub mod permits;
pub mod seed;

pub use lock::{issuer_lock_key, try_acquire_issuer_lock, IssuerLock};
pub use metadata::{
    get_status, list_statuses, mark_error, mark_idle, mark_running, MetadataRow,
};
pub use permits::{
    count_permits, delete_permits_for_issuer, insert_permit_batch, search_permits, PermitRow,
    SearchQuery, MAX_SEARCH_LIMIT, MIN_SEARCH_QUERY_CHARS,
};
pub use seed::seed_issuers;
