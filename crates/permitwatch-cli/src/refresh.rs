//! Handlers for `refresh`, `status` and `search`.

use std::sync::Arc;

use permitwatch_core::{AppConfig, IngestObserver, Issuer, RefreshStatus, TracingObserver};
use permitwatch_db::SearchQuery;
use permitwatch_refresh::{MemoryPermitStore, PgPermitStore, RefreshOrchestrator};

const DRY_RUN_SAMPLE: usize = 5;

/// Runs one refresh. A failed refresh is returned as an error so the process
/// exits non-zero.
///
/// With `dry_run` the permits are collected into memory and summarized; the
/// database is never contacted.
pub(crate) async fn run_refresh(
    config: &AppConfig,
    issuer: Issuer,
    actor: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let observer: Arc<dyn IngestObserver> = Arc::new(TracingObserver);

    if dry_run {
        let orchestrator =
            RefreshOrchestrator::from_app_config(MemoryPermitStore::new(), config, observer)?;
        let summary = orchestrator.trigger(issuer, actor).await?;
        println!(
            "[dry run] {} in {} batch(es); nothing written",
            summary.message, summary.batches
        );
        for permit in orchestrator
            .store()
            .permits(issuer)
            .iter()
            .take(DRY_RUN_SAMPLE)
        {
            println!("  {} <{}>", permit.address, permit.source_url);
        }
        return Ok(());
    }

    let pool = permitwatch_db::connect_pool_from_config(config).await?;
    let orchestrator =
        RefreshOrchestrator::from_app_config(PgPermitStore::new(pool.clone()), config, observer)?;
    let result = orchestrator.trigger(issuer, actor).await;
    pool.close().await;

    let summary = result?;
    println!("{}", summary.message);
    Ok(())
}

pub(crate) async fn run_status(config: &AppConfig, issuer: Option<Issuer>) -> anyhow::Result<()> {
    let pool = permitwatch_db::connect_pool_from_config(config).await?;
    let statuses = match issuer {
        Some(issuer) => vec![permitwatch_db::get_status(&pool, issuer).await?],
        None => permitwatch_db::list_statuses(&pool).await?,
    };
    pool.close().await;

    for status in &statuses {
        println!("{}", format_status(status));
    }
    Ok(())
}

pub(crate) async fn run_search(
    config: &AppConfig,
    query: &str,
    issuer: Option<Issuer>,
    limit: i64,
) -> anyhow::Result<()> {
    let search = SearchQuery::new(query, issuer, limit)?;
    let pool = permitwatch_db::connect_pool_from_config(config).await?;
    let permits = permitwatch_db::search_permits(&pool, &search).await?;
    pool.close().await;

    if permits.is_empty() {
        println!("no permits match '{}'", query.trim());
    }
    for permit in &permits {
        println!(
            "{}  {}  {}  <{}>",
            permit.created_at.format("%Y-%m-%d"),
            permit.issuer.label(),
            permit.address,
            permit.source_url
        );
    }
    Ok(())
}

pub(crate) fn format_status(status: &RefreshStatus) -> String {
    let last = status.last_scraped_at.map_or_else(
        || "never".to_owned(),
        |at| at.format("%Y-%m-%d %H:%M UTC").to_string(),
    );
    let by = status
        .scraped_by_username
        .as_deref()
        .map(|by| format!("  by: {by}"))
        .unwrap_or_default();
    let error = status
        .error_message
        .as_deref()
        .map(|error| format!("  error: {error}"))
        .unwrap_or_default();
    format!(
        "{:<4} {:<8} {:>7} permits  last: {last}{by}{error}",
        status.issuer.label(),
        status.status.as_str(),
        status.total_count
    )
}
