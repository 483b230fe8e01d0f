//! Shared fixtures for the integration tests.

use std::sync::Arc;
use std::time::Duration;

use policy_harvest::discovery::DiscoveryOrchestrator;
use policy_harvest::fetcher::{HttpClient, PageFetcher};
use policy_harvest::sitemap::SitemapResolver;

#[allow(dead_code)]
pub fn http() -> HttpClient {
    HttpClient::new(Duration::from_secs(5))
}

#[allow(dead_code)]
pub fn orchestrator() -> DiscoveryOrchestrator {
    let fetcher: Arc<dyn PageFetcher> = Arc::new(http());
    DiscoveryOrchestrator::new(SitemapResolver::new(http()), fetcher)
}

/// A `<urlset>` in the sitemap namespace.
#[allow(dead_code)]
pub fn urlset(urls: &[String]) -> String {
    let entries: String = urls
        .iter()
        .map(|u| format!("<url><loc>{u}</loc></url>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
    )
}

/// A `<sitemapindex>` pointing at the given sub-sitemaps.
#[allow(dead_code)]
pub fn sitemap_index(urls: &[String]) -> String {
    let entries: String = urls
        .iter()
        .map(|u| format!("<sitemap><loc>{u}</loc></sitemap>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#
    )
}

#[allow(dead_code)]
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
    <meta name="description" content="{title} page">
</head>
<body>
    {body}
</body>
</html>"#
    )
}

/// `count` page URLs under `base`.
#[allow(dead_code)]
pub fn page_urls(base: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{base}/page-{i}")).collect()
}
