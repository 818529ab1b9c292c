//! Integration tests for `TabularFileSource` against a local `wiremock`
//! server standing in for the city hall listing page and its files.

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use permitwatch_core::{IngestObserver, Issuer};
use permitwatch_scraper::{
    HttpProfile, PermitHttpClient, PermitSource, ScraperError, TabularFileSource,
    TabularSourceConfig,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::permit_workbook;

const LISTING_PATH: &str = "/urbanism/lista-autorizatiilor/";

fn test_source(server: &MockServer) -> TabularFileSource {
    let client = PermitHttpClient::new(&HttpProfile::html().with_retries(0, 0))
        .expect("failed to build test client");
    TabularFileSource::new(
        client,
        TabularSourceConfig {
            listing_url: format!("{}{LISTING_PATH}", server.uri()),
            download_delay: Duration::ZERO,
        },
    )
}

async fn mount_listing(server: &MockServer, html: &str) {
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

#[derive(Default)]
struct FileLog(Mutex<Vec<(usize, usize, String, usize)>>);

impl IngestObserver for FileLog {
    fn file_processed(
        &self,
        _issuer: Issuer,
        index: usize,
        file_count: usize,
        filename: &str,
        records: usize,
    ) {
        self.0
            .lock()
            .unwrap()
            .push((index, file_count, filename.to_owned(), records));
    }
}

#[tokio::test]
async fn discover_files_resolves_and_filters_links() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        r#"<html><body>
            <a href="/files/AC-2024.xlsx">Autorizatii 2024</a>
            <a href="/files/anunt.pdf">Anunt</a>
            <a href="arhiva/AC-2019.xls">Arhiva 2019</a>
        </body></html>"#,
    )
    .await;

    let files = test_source(&server).discover_files().await.unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].download_url, format!("{}/files/AC-2024.xlsx", server.uri()));
    assert_eq!(files[0].label, "Autorizatii 2024");
    assert_eq!(
        files[1].download_url,
        format!("{}{LISTING_PATH}arhiva/AC-2019.xls", server.uri())
    );
}

#[tokio::test]
async fn one_good_file_and_one_failed_download_yield_three_permits() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        r#"<ul>
            <li><a href="/files/AC-2024.xlsx">2024</a></li>
            <li><a href="/files/AC-2023.xlsx">2023</a></li>
        </ul>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/AC-2024.xlsx"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(permit_workbook()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/AC-2023.xlsx"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let log = Arc::new(FileLog::default());
    let source = test_source(&server).with_observer(log.clone());
    let records = source.scrape_permits().await.unwrap();

    assert_eq!(records.len(), 3);
    let good_url = format!("{}/files/AC-2024.xlsx", server.uri());
    assert!(records.iter().all(|r| r.source_url == good_url));
    assert!(records.iter().all(|r| !r.address.is_empty()));
    assert_eq!(records[0].address, "Str. Paris 12");

    let files = log.0.lock().unwrap().clone();
    assert_eq!(
        files,
        vec![
            (1, 2, "AC-2024.xlsx".to_owned(), 3),
            (2, 2, "AC-2023.xlsx".to_owned(), 0),
        ]
    );
}

#[tokio::test]
async fn corrupt_file_is_skipped_not_fatal() {
    let server = MockServer::start().await;
    mount_listing(
        &server,
        r#"<a href="/files/broken.xlsx">x</a><a href="/files/good.xlsx">y</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/files/broken.xlsx"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/good.xlsx"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(permit_workbook()))
        .mount(&server)
        .await;

    let records = test_source(&server).scrape_permits().await.unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn listing_without_spreadsheets_is_fatal() {
    let server = MockServer::start().await;
    mount_listing(&server, r#"<a href="/regulament.pdf">Regulament</a>"#).await;

    let result = test_source(&server).scrape_permits().await;
    assert!(
        matches!(result, Err(ScraperError::NoFilesFound { .. })),
        "expected NoFilesFound, got: {result:?}"
    );
}

#[tokio::test]
async fn listing_page_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = test_source(&server).scrape_permits().await;
    assert!(matches!(
        result,
        Err(ScraperError::UnexpectedStatus { status: 503, .. })
    ));
}
