//! Per-issuer exclusive lock backed by a Postgres session advisory lock.
//!
//! The lock lives on one pooled connection for as long as the [`IssuerLock`]
//! is held. The connection is marked close-on-drop, so a lock that is never
//! explicitly released dies with its session instead of going back to the
//! pool still held.

use permitwatch_core::Issuer;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};

use crate::DbError;

/// High 32 bits of every issuer lock key.
const LOCK_NAMESPACE: i64 = 0x7065_726d; // "perm"

/// Advisory lock key for `issuer`. Distinct for every issuer.
#[must_use]
pub fn issuer_lock_key(issuer: Issuer) -> i64 {
    let slot: i64 = match issuer {
        Issuer::Ps1 => 1,
        Issuer::Pmb => 2,
    };
    (LOCK_NAMESPACE << 32) | slot
}

/// A held issuer lock.
#[derive(Debug)]
pub struct IssuerLock {
    conn: PoolConnection<Postgres>,
    issuer: Issuer,
}

impl IssuerLock {
    #[must_use]
    pub fn issuer(&self) -> Issuer {
        self.issuer
    }

    /// Releases the lock. The connection is closed afterwards either way.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlx`] if the unlock statement fails.
    pub async fn release(mut self) -> Result<(), DbError> {
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(issuer_lock_key(self.issuer))
            .fetch_one(&mut *self.conn)
            .await?;
        if !released {
            tracing::warn!(issuer = %self.issuer, "advisory lock was not held at release");
        }
        Ok(())
    }
}

/// Tries to take the lock for `issuer` without waiting.
///
/// Returns `None` when another session holds it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if no connection can be acquired or the lock
/// query fails.
pub async fn try_acquire_issuer_lock(
    pool: &PgPool,
    issuer: Issuer,
) -> Result<Option<IssuerLock>, DbError> {
    let mut conn = pool.acquire().await?;
    conn.close_on_drop();

    let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
        .bind(issuer_lock_key(issuer))
        .fetch_one(&mut *conn)
        .await?;

    if acquired {
        Ok(Some(IssuerLock { conn, issuer }))
    } else {
        Ok(None)
    }
}
