use async_trait::async_trait;
use permitwatch_core::{CanonicalPermitRecord, Issuer};

use crate::error::ScraperError;

/// One issuer's adapter: produces the full current set of permits.
///
/// A returned error is fatal to the refresh; recoverable problems (one bad
/// file, a missing geometry layer) are logged inside the adapter instead.
#[async_trait]
pub trait PermitSource: Send + Sync {
    fn issuer(&self) -> Issuer;

    async fn scrape_permits(&self) -> Result<Vec<CanonicalPermitRecord>, ScraperError>;
}
