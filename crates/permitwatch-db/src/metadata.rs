//! Database operations for `permits_metadata`, one status row per issuer.

use chrono::{DateTime, Utc};
use permitwatch_core::{Issuer, RefreshStatus, RunStatus};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `permits_metadata` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MetadataRow {
    pub issuer: String,
    pub status: String,
    /// The schema defines this as `INTEGER NOT NULL DEFAULT 0`.
    pub total_count: i32,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub scraped_by_username: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<MetadataRow> for RefreshStatus {
    type Error = DbError;

    fn try_from(row: MetadataRow) -> Result<Self, Self::Error> {
        let issuer = row
            .issuer
            .parse::<Issuer>()
            .map_err(|e| DbError::InvalidRow(e.to_string()))?;
        let status = row
            .status
            .parse::<RunStatus>()
            .map_err(|e| DbError::InvalidRow(e.to_string()))?;
        Ok(Self {
            issuer,
            status,
            total_count: row.total_count,
            last_scraped_at: row.last_scraped_at,
            error_message: row.error_message,
            scraped_by_username: row.scraped_by_username,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = "issuer, status, total_count, last_scraped_at, error_message, \
                              scraped_by_username, updated_at";

/// Status of one issuer.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the issuer was never seeded, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_status(pool: &PgPool, issuer: Issuer) -> Result<RefreshStatus, DbError> {
    let row = sqlx::query_as::<_, MetadataRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM permits_metadata WHERE issuer = $1"
    ))
    .bind(issuer.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    RefreshStatus::try_from(row)
}

/// Status rows of every seeded issuer, ordered by issuer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_statuses(pool: &PgPool) -> Result<Vec<RefreshStatus>, DbError> {
    let rows = sqlx::query_as::<_, MetadataRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM permits_metadata ORDER BY issuer"
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(RefreshStatus::try_from).collect()
}

/// Moves an issuer to `running`, clears its error and records who started
/// the run.
///
/// Returns the status the issuer had before, or `None` when the row did not
/// exist yet and was created. Callers hold the issuer lock, so a previous
/// `running` status is a leftover of an interrupted run.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction is
/// rolled back in that case.
pub async fn mark_running(
    pool: &PgPool,
    issuer: Issuer,
    actor: Option<&str>,
) -> Result<Option<RunStatus>, DbError> {
    let mut tx = pool.begin().await?;

    let previous: Option<String> = sqlx::query_scalar(
        "SELECT status FROM permits_metadata WHERE issuer = $1 FOR UPDATE",
    )
    .bind(issuer.as_str())
    .fetch_optional(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO permits_metadata (issuer, status, scraped_by_username, updated_at) \
         VALUES ($1, 'running', $2, NOW()) \
         ON CONFLICT (issuer) DO UPDATE SET \
             status = 'running', \
             error_message = NULL, \
             scraped_by_username = EXCLUDED.scraped_by_username, \
             updated_at = NOW()",
    )
    .bind(issuer.as_str())
    .bind(actor)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    previous
        .map(|s| {
            s.parse::<RunStatus>()
                .map_err(|e| DbError::InvalidRow(e.to_string()))
        })
        .transpose()
}

/// Marks a `running` issuer as `idle` after a successful refresh.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the issuer is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn mark_idle(pool: &PgPool, issuer: Issuer, total_count: i32) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE permits_metadata \
         SET status = 'idle', total_count = $1, last_scraped_at = NOW(), \
             error_message = NULL, updated_at = NOW() \
         WHERE issuer = $2 AND status = 'running'",
    )
    .bind(total_count)
    .bind(issuer.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            issuer,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a `running` issuer as `error`. `total_count` and `last_scraped_at`
/// keep the values of the last successful run.
///
/// # Errors
///
/// Returns [`DbError::InvalidStatusTransition`] if the issuer is not
/// `running`, or [`DbError::Sqlx`] if the update fails.
pub async fn mark_error(pool: &PgPool, issuer: Issuer, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE permits_metadata \
         SET status = 'error', error_message = $1, updated_at = NOW() \
         WHERE issuer = $2 AND status = 'running'",
    )
    .bind(error_message)
    .bind(issuer.as_str())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidStatusTransition {
            issuer,
            expected_status: "running",
        });
    }

    Ok(())
}
