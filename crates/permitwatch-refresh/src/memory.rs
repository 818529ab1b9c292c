//! In-process [`PermitStore`] used for dry runs and tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use permitwatch_core::{Issuer, PermitInsert, RefreshStatus, RunStatus};

use crate::store::{PermitStore, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    statuses: BTreeMap<Issuer, RefreshStatus>,
    permits: Vec<PermitInsert>,
    insert_batches: Vec<usize>,
    delete_calls: usize,
    locked: HashSet<Issuer>,
}

/// Keeps permits and status rows in memory. Starts with every issuer seeded
/// as `idle`.
#[derive(Debug)]
pub struct MemoryPermitStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryPermitStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPermitStore {
    #[must_use]
    pub fn new() -> Self {
        let statuses = Issuer::ALL
            .into_iter()
            .map(|issuer| (issuer, RefreshStatus::seeded(issuer)))
            .collect();
        Self {
            state: Mutex::new(MemoryState {
                statuses,
                ..MemoryState::default()
            }),
        }
    }

    /// Holds the issuer lock as if another refresh were in progress.
    pub fn hold_lock(&self, issuer: Issuer) {
        self.state().locked.insert(issuer);
    }

    #[must_use]
    pub fn is_locked(&self, issuer: Issuer) -> bool {
        self.state().locked.contains(&issuer)
    }

    /// Stored permits of `issuer`, in insertion order.
    #[must_use]
    pub fn permits(&self, issuer: Issuer) -> Vec<PermitInsert> {
        self.state()
            .permits
            .iter()
            .filter(|p| p.issuer == issuer)
            .cloned()
            .collect()
    }

    /// Row count of every `insert_permits` call so far.
    #[must_use]
    pub fn insert_batches(&self) -> Vec<usize> {
        self.state().insert_batches.clone()
    }

    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.state().delete_calls
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn require_running(status: &RefreshStatus) -> Result<(), StoreError> {
    if status.status == RunStatus::Running {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition {
            issuer: status.issuer,
            expected_status: "running",
        })
    }
}

#[async_trait]
impl PermitStore for MemoryPermitStore {
    async fn try_lock_issuer(&self, issuer: Issuer) -> Result<bool, StoreError> {
        Ok(self.state().locked.insert(issuer))
    }

    async fn release_issuer(&self, issuer: Issuer) -> Result<(), StoreError> {
        self.state().locked.remove(&issuer);
        Ok(())
    }

    async fn get_status(&self, issuer: Issuer) -> Result<RefreshStatus, StoreError> {
        self.state()
            .statuses
            .get(&issuer)
            .cloned()
            .ok_or(StoreError::MissingIssuer(issuer))
    }

    async fn list_statuses(&self) -> Result<Vec<RefreshStatus>, StoreError> {
        Ok(self.state().statuses.values().cloned().collect())
    }

    async fn mark_running(
        &self,
        issuer: Issuer,
        actor: Option<&str>,
    ) -> Result<Option<RunStatus>, StoreError> {
        let mut state = self.state();
        let status = state
            .statuses
            .entry(issuer)
            .or_insert_with(|| RefreshStatus::seeded(issuer));
        let previous = status.status;
        status.status = RunStatus::Running;
        status.error_message = None;
        status.scraped_by_username = actor.map(str::to_owned);
        status.updated_at = Utc::now();
        Ok(Some(previous))
    }

    async fn mark_idle(&self, issuer: Issuer, total_count: i32) -> Result<(), StoreError> {
        let mut state = self.state();
        let status = state
            .statuses
            .get_mut(&issuer)
            .ok_or(StoreError::MissingIssuer(issuer))?;
        require_running(status)?;
        let now = Utc::now();
        status.status = RunStatus::Idle;
        status.total_count = total_count;
        status.last_scraped_at = Some(now);
        status.error_message = None;
        status.updated_at = now;
        Ok(())
    }

    async fn mark_error(&self, issuer: Issuer, message: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        let status = state
            .statuses
            .get_mut(&issuer)
            .ok_or(StoreError::MissingIssuer(issuer))?;
        require_running(status)?;
        status.status = RunStatus::Error;
        status.error_message = Some(message.to_owned());
        status.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_permits(&self, issuer: Issuer) -> Result<u64, StoreError> {
        let mut state = self.state();
        state.delete_calls += 1;
        let before = state.permits.len();
        state.permits.retain(|p| p.issuer != issuer);
        Ok((before - state.permits.len()) as u64)
    }

    async fn insert_permits(&self, batch: &[PermitInsert]) -> Result<u64, StoreError> {
        let mut state = self.state();
        state.insert_batches.push(batch.len());
        state.permits.extend_from_slice(batch);
        Ok(batch.len() as u64)
    }
}
