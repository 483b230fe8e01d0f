//! Sitemap discovery.
//!
//! Tries a fixed list of well known sitemap locations under the site root, pulls
//! every `<loc>` out of the first one that answers, and expands a sitemap index
//! exactly one level deep. Every failure along the way degrades to "no URLs".

use std::collections::HashSet;
use url::Url;

use crate::fetcher::HttpClient;

pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

pub const SITEMAP_PATHS: [&str; 3] = ["/sitemap.xml", "/sitemap_index.xml", "/sitemap-index.xml"];

/// How many leading entries are inspected when deciding whether a sitemap is an index.
const INDEX_PROBE_LEN: usize = 5;

pub struct SitemapResolver {
    http: HttpClient,
}

impl SitemapResolver {
    pub fn new(http: HttpClient) -> SitemapResolver {
        SitemapResolver { http }
    }

    /// All page URLs listed by the site's sitemap, or an empty list if it has none.
    ///
    /// Only absolute http(s) entries are returned, deduplicated in document order.
    pub async fn resolve(&self, base_url: &str) -> Vec<String> {
        let Some(root) = site_root(base_url) else {
            log::warn!("cannot resolve sitemap for invalid url {base_url}");
            return Vec::new();
        };
        let Some(content) = self.fetch_first_sitemap(&root).await else {
            log::info!("no sitemap found for {root}");
            return Vec::new();
        };

        let urls = parse_sitemap(&content);
        log::info!("parsed {} urls from sitemap", urls.len());

        if !looks_like_index(&urls) {
            return candidate_urls(urls);
        }

        log::info!("sitemap index detected, fetching {} sub-sitemaps", urls.len());
        let mut all_urls = Vec::new();
        for sitemap_url in &urls {
            match self.http.get_text(sitemap_url).await {
                // sub-sitemaps are flattened as-is, never expanded again
                Ok(body) => all_urls.extend(parse_sitemap(&body)),
                Err(e) => log::warn!("failed to fetch {sitemap_url}: {:#}", e),
            }
        }
        candidate_urls(all_urls)
    }

    async fn fetch_first_sitemap(&self, root: &Url) -> Option<String> {
        for path in SITEMAP_PATHS {
            let Ok(sitemap_url) = root.join(path) else {
                continue;
            };
            let sitemap_url = sitemap_url.to_string();
            match self.http.get_text(&sitemap_url).await {
                Ok(body) => {
                    log::info!("found sitemap: {sitemap_url}");
                    return Some(body);
                }
                Err(e) => log::debug!("no sitemap at {sitemap_url}: {:#}", e),
            }
        }
        None
    }
}

/// Extract `<loc>` values from a sitemap document.
///
/// Elements in the sitemap namespace are preferred; documents that forgot (or
/// mangled) the namespace declaration fall back to bare `<loc>` elements.
/// Malformed XML yields an empty list.
pub fn parse_sitemap(content: &str) -> Vec<String> {
    let doc = match roxmltree::Document::parse(content.trim_start()) {
        Ok(doc) => doc,
        Err(e) => {
            log::warn!("error parsing sitemap xml: {e}");
            return Vec::new();
        }
    };

    let collect = |namespace: Option<&str>| -> Vec<String> {
        doc.descendants()
            .filter(|n| {
                n.is_element()
                    && n.tag_name().name() == "loc"
                    && n.tag_name().namespace() == namespace
            })
            .filter_map(|n| n.text())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    };

    let urls = collect(Some(SITEMAP_NAMESPACE));
    if !urls.is_empty() {
        return urls;
    }
    collect(None)
}

/// Heuristic index detection: every one of the first few entries points at an `.xml` file.
///
/// This misclassifies leaf sitemaps whose first pages happen to end in `.xml`.
pub fn looks_like_index(urls: &[String]) -> bool {
    !urls.is_empty()
        && urls
            .iter()
            .take(INDEX_PROBE_LEN)
            .all(|u| is_xml_resource(u))
}

/// Root of the site `base_url` belongs to; sitemap paths are tried from here.
fn site_root(base_url: &str) -> Option<Url> {
    let parsed = Url::parse(base_url.trim()).ok()?;
    parsed.host_str()?;
    parsed.join("/").ok()
}

/// Keep absolute http(s) URLs only, first occurrence wins.
pub fn candidate_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

fn is_xml_resource(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase().ends_with(".xml"),
        Err(_) => url.to_ascii_lowercase().ends_with(".xml"),
    }
}
