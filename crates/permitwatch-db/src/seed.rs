use permitwatch_core::Issuer;
use sqlx::PgPool;

use crate::DbError;

/// Ensures every issuer has a status row, starting as `idle`.
///
/// Existing rows are left untouched. Returns the number of rows created.
/// All inserts run inside a single transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any database operation fails.
pub async fn seed_issuers(pool: &PgPool, issuers: &[Issuer]) -> Result<u64, DbError> {
    let mut tx = pool.begin().await?;
    let mut created = 0u64;

    for issuer in issuers {
        let result = sqlx::query(
            "INSERT INTO permits_metadata (issuer, status, total_count) \
             VALUES ($1, 'idle', 0) \
             ON CONFLICT (issuer) DO NOTHING",
        )
        .bind(issuer.as_str())
        .execute(&mut *tx)
        .await?;
        created += result.rows_affected();
    }

    tx.commit().await?;
    Ok(created)
}
