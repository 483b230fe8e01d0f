mod common;

use common::{html_page, orchestrator, page_urls, urlset};
use policy_harvest::discovery::DiscoverySource;

const HOMEPAGE_BODY: &str = r##"
    <a href="/privacy">Privacy</a>
    <a href="/privacy">Privacy again</a>
    <a href="https://other.com/terms">Terms</a>
    <a href="mailto:legal@acme.com">Mail</a>
    <a href="#top">Top</a>
    <a href="relative/path">Relative</a>
"##;

async fn mock_homepage(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(html_page("Acme", HOMEPAGE_BODY))
        .create_async()
        .await
}

#[tokio::test]
async fn test_oversized_sitemap_falls_back_to_homepage() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    server
        .mock("GET", "/sitemap.xml")
        .with_status(200)
        .with_body(urlset(&page_urls(&base, 600)))
        .create_async()
        .await;
    let homepage = mock_homepage(&mut server).await;

    let discovery = orchestrator().discover(&base, 500).await;

    assert_eq!(discovery.source, DiscoverySource::Homepage);
    assert_eq!(discovery.sitemap_size, 600);
    assert_eq!(
        discovery.urls,
        vec![format!("{base}/privacy"), "https://other.com/terms".to_string()]
    );
    homepage.assert_async().await;
}

#[tokio::test]
async fn test_small_sitemap_is_used_without_homepage_fetch() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    let urls = page_urls(&base, 50);
    server
        .mock("GET", "/sitemap.xml")
        .with_status(200)
        .with_body(urlset(&urls))
        .create_async()
        .await;
    let homepage = server.mock("GET", "/").expect(0).create_async().await;

    let discovery = orchestrator().discover(&base, 500).await;

    assert_eq!(discovery.source, DiscoverySource::Sitemap);
    assert_eq!(discovery.urls, urls);
    homepage.assert_async().await;
}

#[tokio::test]
async fn test_missing_sitemap_falls_back_to_homepage() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    mock_homepage(&mut server).await;

    let discovery = orchestrator().discover(&base, 500).await;

    assert_eq!(discovery.source, DiscoverySource::Homepage);
    assert_eq!(discovery.sitemap_size, 0);
    assert_eq!(discovery.urls.len(), 2);
}

#[tokio::test]
async fn test_failed_homepage_yields_empty() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    server.mock("GET", "/").with_status(503).create_async().await;

    let discovery = orchestrator().discover(&base, 500).await;

    assert_eq!(discovery.source, DiscoverySource::Homepage);
    assert!(discovery.urls.is_empty());
}

#[tokio::test]
async fn test_sitemap_size_counts_distinct_page_urls() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();
    let urls = page_urls(&base, 300);
    // every entry listed twice, plus entries that are not page urls
    let mut locs: Vec<String> = urls.iter().chain(urls.iter()).cloned().collect();
    locs.push("/relative".to_string());
    locs.push("mailto:legal@acme.com".to_string());
    server
        .mock("GET", "/sitemap.xml")
        .with_status(200)
        .with_body(urlset(&locs))
        .create_async()
        .await;
    let homepage = server.mock("GET", "/").expect(0).create_async().await;

    let discovery = orchestrator().discover(&base, 500).await;

    assert_eq!(discovery.source, DiscoverySource::Sitemap);
    assert_eq!(discovery.sitemap_size, 300);
    assert_eq!(discovery.urls, urls);
    homepage.assert_async().await;
}
