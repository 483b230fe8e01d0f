use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::fetcher::PageFetcher;
use crate::links::extract_links;
use crate::sitemap::SitemapResolver;

pub const DEFAULT_MAX_SITEMAP_SIZE: usize = 500;

/// Where the candidate URLs came from. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscoverySource {
    Sitemap,
    Homepage,
}

impl fmt::Display for DiscoverySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoverySource::Sitemap => write!(f, "Sitemap"),
            DiscoverySource::Homepage => write!(f, "Homepage"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Discovery {
    pub urls: Vec<String>,
    pub source: DiscoverySource,
    /// Size of the sitemap result before any fallback, 0 when there was none.
    pub sitemap_size: usize,
}

/// Sitemap first, homepage links when the sitemap is missing or too large to classify.
pub struct DiscoveryOrchestrator {
    resolver: SitemapResolver,
    fetcher: Arc<dyn PageFetcher>,
}

impl DiscoveryOrchestrator {
    pub fn new(resolver: SitemapResolver, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { resolver, fetcher }
    }

    pub async fn discover(&self, site_url: &str, max_sitemap_size: usize) -> Discovery {
        let sitemap_urls = self.resolver.resolve(site_url).await;
        let sitemap_size = sitemap_urls.len();

        if use_sitemap(sitemap_size, max_sitemap_size) {
            log::info!("using sitemap with {sitemap_size} urls");
            return Discovery {
                urls: sitemap_urls,
                source: DiscoverySource::Sitemap,
                sitemap_size,
            };
        }

        if sitemap_size > max_sitemap_size {
            log::info!(
                "sitemap has {sitemap_size} urls (limit {max_sitemap_size}), using homepage links instead"
            );
        } else {
            log::info!("no sitemap urls, using homepage links");
        }

        Discovery {
            urls: self.homepage_links(site_url).await,
            source: DiscoverySource::Homepage,
            sitemap_size,
        }
    }

    async fn homepage_links(&self, site_url: &str) -> Vec<String> {
        let page = self.fetcher.fetch(site_url).await;
        if !page.success {
            log::warn!("failed to fetch homepage {site_url}");
            return Vec::new();
        }
        let links = extract_links(&page.html, site_url);
        log::info!("found {} links on homepage", links.len());
        links
    }
}

/// The sitemap result is used iff `0 < size <= max`.
pub fn use_sitemap(size: usize, max_sitemap_size: usize) -> bool {
    size > 0 && size <= max_sitemap_size
}
