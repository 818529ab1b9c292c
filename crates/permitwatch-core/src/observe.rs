//! Progress checkpoints for ingestion runs.
//!
//! Adapters and the refresh orchestrator report progress through an
//! [`IngestObserver`] rather than printing. Every method has a no-op default,
//! so an observer only overrides the checkpoints it cares about.

use crate::Issuer;

pub trait IngestObserver: Send + Sync {
    fn run_started(&self, _issuer: Issuer, _actor: Option<&str>) {}

    /// One page of the paginated table API was received.
    fn page_fetched(&self, _issuer: Issuer, _page: u64, _rows: usize, _reported_total: u64) {}

    /// One spreadsheet was processed. `records` is zero when the file was skipped.
    fn file_processed(
        &self,
        _issuer: Issuer,
        _index: usize,
        _file_count: usize,
        _filename: &str,
        _records: usize,
    ) {
    }

    fn batch_inserted(&self, _issuer: Issuer, _batch: usize, _batch_count: usize, _rows: usize) {}

    fn run_completed(&self, _issuer: Issuer, _total_count: usize) {}

    fn run_failed(&self, _issuer: Issuer, _message: &str) {}
}

/// Emits every checkpoint as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl IngestObserver for TracingObserver {
    fn run_started(&self, issuer: Issuer, actor: Option<&str>) {
        tracing::info!(issuer = %issuer, actor = actor.unwrap_or("-"), "refresh started");
    }

    fn page_fetched(&self, issuer: Issuer, page: u64, rows: usize, reported_total: u64) {
        tracing::info!(issuer = %issuer, page, rows, reported_total, "table page fetched");
    }

    fn file_processed(
        &self,
        issuer: Issuer,
        index: usize,
        file_count: usize,
        filename: &str,
        records: usize,
    ) {
        tracing::info!(
            issuer = %issuer,
            file = index,
            of = file_count,
            filename,
            records,
            "spreadsheet processed"
        );
    }

    fn batch_inserted(&self, issuer: Issuer, batch: usize, batch_count: usize, rows: usize) {
        tracing::info!(issuer = %issuer, batch, of = batch_count, rows, "permit batch inserted");
    }

    fn run_completed(&self, issuer: Issuer, total_count: usize) {
        tracing::info!(issuer = %issuer, total_count, "refresh completed");
    }

    fn run_failed(&self, issuer: Issuer, message: &str) {
        tracing::error!(issuer = %issuer, error = message, "refresh failed");
    }
}
