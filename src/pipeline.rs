use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::data_models::{ExtractedPage, ScrapeSession};
use crate::discovery::{DiscoveryOrchestrator, DiscoverySource};
use crate::error::ScrapeError;
use crate::extractor::ContentExtractor;
use crate::fetcher::{HttpClient, PageFetcher};
use crate::output::{OutputFormat, OutputWriter};
use crate::sitemap::SitemapResolver;
use crate::url_filter::{FilterMode, LlmUrlClassifier, RelevanceFilter};
use crate::url_utils::{get_domain_name, is_valid_url};
use crate::vector_store::SessionStore;

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub mode: FilterMode,
    pub max_sitemap_size: usize,
    pub format: OutputFormat,
}

/// Outcome of scraping one site.
#[derive(Debug)]
pub struct ScrapeReport {
    pub session: ScrapeSession,
    pub source: DiscoverySource,
    pub pages: Vec<ExtractedPage>,
    pub files: BTreeMap<&'static str, PathBuf>,
    /// Pages written to the store, `None` when no store is attached or nothing was scraped.
    pub stored: Option<usize>,
    pub fallback_batches: usize,
}

/// Discovery, relevance filtering, extraction and output for one site at a time.
pub struct PolicyScraper {
    discovery: DiscoveryOrchestrator,
    filter: RelevanceFilter,
    extractor: ContentExtractor,
    writer: OutputWriter,
    settings: ScrapeSettings,
    store: Option<Arc<dyn SessionStore>>,
}

impl PolicyScraper {
    pub fn new(
        discovery: DiscoveryOrchestrator,
        filter: RelevanceFilter,
        extractor: ContentExtractor,
        writer: OutputWriter,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            discovery,
            filter,
            extractor,
            writer,
            settings,
            store: None,
        }
    }

    /// Wire up plain HTTP fetching and the Ollama classifier from `config`.
    pub fn from_config(config: &Config, mode: FilterMode, format: OutputFormat) -> Self {
        let http = HttpClient::new(config.fetch_timeout);
        let fetcher: Arc<dyn PageFetcher> = Arc::new(http.clone());
        let filter = RelevanceFilter::new(
            Arc::new(LlmUrlClassifier::from_config(config)),
            config.keywords.clone(),
        );

        Self::new(
            DiscoveryOrchestrator::new(SitemapResolver::new(http), fetcher.clone()),
            filter,
            ContentExtractor::new(fetcher),
            OutputWriter::new(&config.output_dir),
            ScrapeSettings {
                mode,
                max_sitemap_size: config.max_sitemap_size,
                format,
            },
        )
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn scrape(&self, url: &str) -> Result<ScrapeReport, ScrapeError> {
        let started = Instant::now();
        let url = url.trim();
        if !is_valid_url(url) {
            return Err(ScrapeError::InvalidUrl(url.to_string()));
        }

        let run_id = nanoid::nanoid!(10);
        log::info!("[{run_id}] starting scrape for {url}");
        let mut session = ScrapeSession::new(run_id.clone(), url.to_string(), get_domain_name(url));

        log::info!("[{run_id}] phase 1: url discovery");
        let discovery = self
            .discovery
            .discover(url, self.settings.max_sitemap_size)
            .await;
        session.urls_discovered = (discovery.sitemap_size > 0).then_some(discovery.sitemap_size as u32);

        let filtered = self
            .filter
            .filter_detailed(&discovery.urls, &self.settings.mode)
            .await;
        let fallback_batches = filtered.fallback_batches();
        let relevant = filtered.relevant;
        session.relevant_urls = relevant.len() as u32;

        let mut report = ScrapeReport {
            session,
            source: discovery.source,
            pages: Vec::new(),
            files: BTreeMap::new(),
            stored: None,
            fallback_batches,
        };

        if relevant.is_empty() {
            log::warn!("[{run_id}] no relevant urls found, try adjusting SEARCH_PROMPT");
            report.session.total_time_seconds = started.elapsed().as_secs_f64();
            return Ok(report);
        }
        log::info!("[{run_id}] found {} relevant urls to scrape", relevant.len());

        log::info!("[{run_id}] phase 2: content extraction");
        for (idx, target) in relevant.iter().enumerate() {
            log::debug!("[{}/{}] {}", idx + 1, relevant.len(), target);
            if let Some(page) = self.extractor.extract(target).await {
                report.pages.push(page);
            }
        }

        if report.pages.is_empty() {
            log::warn!("[{run_id}] no content extracted");
            report.session.total_time_seconds = started.elapsed().as_secs_f64();
            return Ok(report);
        }

        record_stats(&mut report.session, &report.pages);
        report.session.total_time_seconds = started.elapsed().as_secs_f64();

        log::info!("[{run_id}] phase 3: saving results");
        report.files = self
            .writer
            .save(self.settings.format, &report.pages, &report.session)?;

        if let Some(store) = &self.store {
            let stored = store.save_session(&report.session, &report.pages).await?;
            report.stored = Some(stored);
        }

        log::info!(
            "[{run_id}] scraped {} pages ({} words) in {:.2}s",
            report.session.pages_scraped,
            report.session.total_words,
            report.session.total_time_seconds
        );
        Ok(report)
    }

    /// Scrape each site in turn. A failing site is logged and skipped.
    pub async fn scrape_many(&self, urls: &[String]) -> Vec<ScrapeReport> {
        log::info!("processing {} urls", urls.len());
        let mut reports = Vec::with_capacity(urls.len());
        for url in urls {
            match self.scrape(url).await {
                Ok(report) => reports.push(report),
                Err(e) => log::error!("scrape of {url} failed: {:#}", e),
            }
        }
        reports
    }
}

fn record_stats(session: &mut ScrapeSession, pages: &[ExtractedPage]) {
    session.pages_scraped = pages.len() as u32;
    session.total_words = pages.iter().map(|p| p.word_count as u64).sum();
    session.page_types.clear();
    for page in pages {
        *session.page_types.entry(page.page_type.clone()).or_insert(0) += 1;
    }
}

/// A scrape target is a batch file when it names a `.txt` file.
pub fn is_url_file(target: &str) -> bool {
    target.ends_with(".txt")
}

/// One URL per line, blank lines ignored.
pub fn read_url_file(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
