pub mod error;
pub mod header;
pub mod http;
pub mod paginated;
pub(crate) mod rate_limit;
pub mod source;
pub mod tabular;
pub mod workbook;

use std::sync::Arc;

use permitwatch_core::{AppConfig, IngestObserver, Issuer};

pub use error::ScraperError;
pub use header::{detect_header_row, find_address_column, HeaderRow, HEADER_KEYWORDS};
pub use http::{HttpProfile, PermitHttpClient};
pub use paginated::{PaginatedApiSource, PaginatedSourceConfig};
pub use source::PermitSource;
pub use tabular::{extract_from_file, DiscoveredFile, TabularFileSource, TabularSourceConfig};
pub use workbook::{load_active_sheet, Cell, CellValue, Sheet};

/// Builds the adapter responsible for `issuer`, reporting to `observer`.
///
/// # Errors
///
/// Returns an error if the adapter's HTTP client cannot be constructed.
pub fn build_source(
    issuer: Issuer,
    config: &AppConfig,
    observer: Arc<dyn IngestObserver>,
) -> Result<Arc<dyn PermitSource>, ScraperError> {
    let source: Arc<dyn PermitSource> = match issuer {
        Issuer::Ps1 => Arc::new(TabularFileSource::from_app_config(config)?.with_observer(observer)),
        Issuer::Pmb => {
            Arc::new(PaginatedApiSource::from_app_config(config)?.with_observer(observer))
        }
    };
    Ok(source)
}
