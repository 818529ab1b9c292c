//! Drives one refresh of one issuer: lock, mark running, scrape, replace the
//! stored permits in batches, then record the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use permitwatch_core::{
    AppConfig, IngestObserver, Issuer, PermitInsert, RefreshStatus, RunStatus, TracingObserver,
};
use permitwatch_scraper::{build_source, PermitSource, ScraperError};
use thiserror::Error;

use crate::store::{PermitStore, StoreError};

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("a refresh of {} is already running", .0.label())]
    AlreadyRunning(Issuer),
    #[error("no source configured for {}", .0.label())]
    NoSource(Issuer),
    #[error("failed to scrape {}: {source}", .issuer.label())]
    Scrape {
        issuer: Issuer,
        #[source]
        source: ScraperError,
    },
    #[error("{count} permits exceed the storable total")]
    TooManyPermits { count: usize },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    pub issuer: Issuer,
    pub total_count: usize,
    /// Number of insert calls made.
    pub batches: usize,
    pub message: String,
}

pub struct RefreshOrchestrator<S: PermitStore> {
    store: S,
    sources: HashMap<Issuer, Arc<dyn PermitSource>>,
    batch_size: usize,
    observer: Arc<dyn IngestObserver>,
}

impl<S: PermitStore> RefreshOrchestrator<S> {
    /// A zero `batch_size` is treated as one.
    #[must_use]
    pub fn new(store: S, batch_size: usize) -> Self {
        Self {
            store,
            sources: HashMap::new(),
            batch_size: batch_size.max(1),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Wires a source for every issuer from `config`, sharing `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if an HTTP client cannot be built.
    pub fn from_app_config(
        store: S,
        config: &AppConfig,
        observer: Arc<dyn IngestObserver>,
    ) -> Result<Self, ScraperError> {
        let mut orchestrator =
            Self::new(store, config.insert_batch_size).with_observer(Arc::clone(&observer));
        for issuer in Issuer::ALL {
            let source = build_source(issuer, config, Arc::clone(&observer))?;
            orchestrator = orchestrator.with_source(source);
        }
        Ok(orchestrator)
    }

    /// Registers `source` for the issuer it reports, replacing any earlier one.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn PermitSource>) -> Self {
        self.sources.insert(source.issuer(), source);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn IngestObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Runs a full refresh of `issuer` on behalf of `actor`.
    ///
    /// Stored permits are deleted before the new ones are inserted, and the
    /// two steps are not atomic: if an insert batch fails, the issuer is left
    /// with the batches stored so far and an `error` status.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::AlreadyRunning`] without touching any state
    /// when another refresh of `issuer` holds the lock. Any other error has
    /// been recorded as the issuer's `error` status, best-effort.
    pub async fn trigger(
        &self,
        issuer: Issuer,
        actor: Option<&str>,
    ) -> Result<RefreshSummary, RefreshError> {
        let source = self
            .sources
            .get(&issuer)
            .cloned()
            .ok_or(RefreshError::NoSource(issuer))?;

        if !self.store.try_lock_issuer(issuer).await? {
            return Err(RefreshError::AlreadyRunning(issuer));
        }

        let result = self.run_locked(issuer, actor, source.as_ref()).await;

        if let Err(e) = self.store.release_issuer(issuer).await {
            tracing::warn!(issuer = %issuer, error = %e, "failed to release issuer lock");
        }

        result
    }

    /// # Errors
    ///
    /// Returns [`RefreshError::Store`] if the status cannot be read.
    pub async fn get_status(&self, issuer: Issuer) -> Result<RefreshStatus, RefreshError> {
        Ok(self.store.get_status(issuer).await?)
    }

    /// # Errors
    ///
    /// Returns [`RefreshError::Store`] if the statuses cannot be read.
    pub async fn list_statuses(&self) -> Result<Vec<RefreshStatus>, RefreshError> {
        Ok(self.store.list_statuses().await?)
    }

    async fn run_locked(
        &self,
        issuer: Issuer,
        actor: Option<&str>,
        source: &dyn PermitSource,
    ) -> Result<RefreshSummary, RefreshError> {
        let previous = self.store.mark_running(issuer, actor).await?;
        if previous == Some(RunStatus::Running) {
            tracing::warn!(issuer = %issuer, "overwriting stale running status");
        }
        self.observer.run_started(issuer, actor);

        match self.ingest(issuer, source).await {
            Ok(summary) => {
                self.observer.run_completed(issuer, summary.total_count);
                Ok(summary)
            }
            Err(err) => {
                let message = err.to_string();
                self.observer.run_failed(issuer, &message);
                self.mark_error_best_effort(issuer, &message).await;
                Err(err)
            }
        }
    }

    async fn ingest(
        &self,
        issuer: Issuer,
        source: &dyn PermitSource,
    ) -> Result<RefreshSummary, RefreshError> {
        let records = source
            .scrape_permits()
            .await
            .map_err(|source| RefreshError::Scrape { issuer, source })?;

        let total = records.len();
        let total_count =
            i32::try_from(total).map_err(|_| RefreshError::TooManyPermits { count: total })?;
        let inserts: Vec<PermitInsert> = records.into_iter().map(PermitInsert::from).collect();

        let deleted = self.store.delete_permits(issuer).await?;
        tracing::debug!(issuer = %issuer, deleted, "previous permits deleted");

        let batch_count = total.div_ceil(self.batch_size);
        for (index, batch) in inserts.chunks(self.batch_size).enumerate() {
            self.store.insert_permits(batch).await?;
            self.observer
                .batch_inserted(issuer, index + 1, batch_count, batch.len());
        }

        self.store.mark_idle(issuer, total_count).await?;

        Ok(RefreshSummary {
            issuer,
            total_count: total,
            batches: batch_count,
            message: format!("Successfully refreshed {total} permits from {}", issuer.label()),
        })
    }

    async fn mark_error_best_effort(&self, issuer: Issuer, message: &str) {
        if let Err(mark_err) = self.store.mark_error(issuer, message).await {
            tracing::error!(
                issuer = %issuer,
                error = %mark_err,
                "failed to record refresh error status"
            );
        }
    }
}
