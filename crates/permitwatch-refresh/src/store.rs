//! Persistence seam of the refresh orchestrator.

use std::collections::HashMap;

use async_trait::async_trait;
use permitwatch_core::{Issuer, PermitInsert, RefreshStatus, RunStatus};
use permitwatch_db::{DbError, IssuerLock};
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("status of {issuer} is not '{expected_status}'")]
    InvalidTransition {
        issuer: Issuer,
        expected_status: &'static str,
    },
    #[error("no status record for {0}")]
    MissingIssuer(Issuer),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Db(DbError),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidStatusTransition {
                issuer,
                expected_status,
            } => StoreError::InvalidTransition {
                issuer,
                expected_status,
            },
            other => StoreError::Db(other),
        }
    }
}

/// Everything a refresh reads or writes.
///
/// `mark_idle` and `mark_error` only apply to an issuer that is currently
/// `running`; any other state yields [`StoreError::InvalidTransition`].
#[async_trait]
pub trait PermitStore: Send + Sync {
    /// Takes the exclusive refresh lock of `issuer` without waiting.
    /// Returns `false` when it is already held.
    async fn try_lock_issuer(&self, issuer: Issuer) -> Result<bool, StoreError>;

    async fn release_issuer(&self, issuer: Issuer) -> Result<(), StoreError>;

    async fn get_status(&self, issuer: Issuer) -> Result<RefreshStatus, StoreError>;

    async fn list_statuses(&self) -> Result<Vec<RefreshStatus>, StoreError>;

    /// Moves `issuer` to `running`, clears its error and records `actor`.
    /// Returns the previous status, if the issuer had one.
    async fn mark_running(
        &self,
        issuer: Issuer,
        actor: Option<&str>,
    ) -> Result<Option<RunStatus>, StoreError>;

    async fn mark_idle(&self, issuer: Issuer, total_count: i32) -> Result<(), StoreError>;

    async fn mark_error(&self, issuer: Issuer, message: &str) -> Result<(), StoreError>;

    async fn delete_permits(&self, issuer: Issuer) -> Result<u64, StoreError>;

    /// Stores one batch. Each call is one round trip to the backing store.
    async fn insert_permits(&self, batch: &[PermitInsert]) -> Result<u64, StoreError>;
}

/// [`PermitStore`] over Postgres. Issuer locks are session advisory locks
/// kept on dedicated connections until released.
#[derive(Debug)]
pub struct PgPermitStore {
    pool: PgPool,
    held: Mutex<HashMap<Issuer, IssuerLock>>,
}

impl PgPermitStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PermitStore for PgPermitStore {
    async fn try_lock_issuer(&self, issuer: Issuer) -> Result<bool, StoreError> {
        let mut held = self.held.lock().await;
        if held.contains_key(&issuer) {
            return Ok(false);
        }
        match permitwatch_db::try_acquire_issuer_lock(&self.pool, issuer).await? {
            Some(lock) => {
                held.insert(issuer, lock);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn release_issuer(&self, issuer: Issuer) -> Result<(), StoreError> {
        let lock = self.held.lock().await.remove(&issuer);
        match lock {
            Some(lock) => lock.release().await.map_err(StoreError::from),
            None => Ok(()),
        }
    }

    async fn get_status(&self, issuer: Issuer) -> Result<RefreshStatus, StoreError> {
        match permitwatch_db::get_status(&self.pool, issuer).await {
            Err(DbError::NotFound) => Err(StoreError::MissingIssuer(issuer)),
            other => other.map_err(StoreError::from),
        }
    }

    async fn list_statuses(&self) -> Result<Vec<RefreshStatus>, StoreError> {
        Ok(permitwatch_db::list_statuses(&self.pool).await?)
    }

    async fn mark_running(
        &self,
        issuer: Issuer,
        actor: Option<&str>,
    ) -> Result<Option<RunStatus>, StoreError> {
        Ok(permitwatch_db::mark_running(&self.pool, issuer, actor).await?)
    }

    async fn mark_idle(&self, issuer: Issuer, total_count: i32) -> Result<(), StoreError> {
        Ok(permitwatch_db::mark_idle(&self.pool, issuer, total_count).await?)
    }

    async fn mark_error(&self, issuer: Issuer, message: &str) -> Result<(), StoreError> {
        Ok(permitwatch_db::mark_error(&self.pool, issuer, message).await?)
    }

    async fn delete_permits(&self, issuer: Issuer) -> Result<u64, StoreError> {
        Ok(permitwatch_db::delete_permits_for_issuer(&self.pool, issuer).await?)
    }

    async fn insert_permits(&self, batch: &[PermitInsert]) -> Result<u64, StoreError> {
        Ok(permitwatch_db::insert_permit_batch(&self.pool, batch).await?)
    }
}
