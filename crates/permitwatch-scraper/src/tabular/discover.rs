use std::collections::HashSet;
use std::sync::LazyLock;

use reqwest::Url;
use scraper::{Html, Selector};

static ANCHOR_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("a[href]").ok());

const SPREADSHEET_EXTENSIONS: [&str; 2] = [".xls", ".xlsx"];

/// A spreadsheet linked from the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub download_url: String,
    /// Anchor text, trimmed.
    pub label: String,
    /// Last path segment of the URL, without query.
    pub original_filename: String,
}

/// Extracts spreadsheet links from a listing page in document order.
///
/// Relative hrefs resolve against `page_url`; the extension test is
/// case-insensitive on the URL path; duplicates keep their first occurrence.
#[must_use]
pub fn parse_listing(html: &str, page_url: &Url) -> Vec<DiscoveredFile> {
    let Some(selector) = ANCHOR_SELECTOR.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for anchor in document.select(selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(url) = page_url.join(href.trim()) else {
            tracing::debug!(href, "skipping unresolvable link");
            continue;
        };
        if !is_spreadsheet(&url) {
            continue;
        }
        let download_url = url.to_string();
        if !seen.insert(download_url.clone()) {
            continue;
        }

        let label = anchor
            .text()
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let original_filename = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_owned();

        files.push(DiscoveredFile {
            download_url,
            label,
            original_filename,
        });
    }

    files
}

fn is_spreadsheet(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    SPREADSHEET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
