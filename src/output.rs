use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::data_models::{ExtractedPage, ScrapeSession};

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Text,
    Markdown,
    All,
}

/// Writes scrape results below `<output_dir>/<domain_name>/`.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn site_folder(&self, domain_name: &str) -> io::Result<PathBuf> {
        let folder = self.output_dir.join(domain_name);
        fs::create_dir_all(&folder)?;
        Ok(folder)
    }

    /// Writes the requested format plus `summary.txt`. Returns `(label, path)` per file written.
    pub fn save(
        &self,
        format: OutputFormat,
        pages: &[ExtractedPage],
        session: &ScrapeSession,
    ) -> io::Result<BTreeMap<&'static str, PathBuf>> {
        let domain = session.domain_name.as_str();
        let mut written = BTreeMap::new();

        if matches!(format, OutputFormat::Json | OutputFormat::All) {
            written.insert("json", self.save_json(pages, domain)?);
        }
        if matches!(format, OutputFormat::Text | OutputFormat::All) {
            written.insert("text", self.save_text(pages, domain)?);
        }
        if matches!(format, OutputFormat::Markdown | OutputFormat::All) {
            written.insert("markdown", self.save_markdown(pages, domain)?);
        }
        written.insert("summary", self.save_summary(session)?);

        for (label, path) in &written {
            log::info!("saved {}: {}", label, path.display());
        }
        Ok(written)
    }

    pub fn save_json(&self, pages: &[ExtractedPage], domain: &str) -> io::Result<PathBuf> {
        let path = self.site_folder(domain)?.join(format!("{domain}.json"));
        let json = serde_json::to_string_pretty(pages)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn save_text(&self, pages: &[ExtractedPage], domain: &str) -> io::Result<PathBuf> {
        let path = self.site_folder(domain)?.join(format!("{domain}.txt"));
        fs::write(&path, render_text(pages, &now()))?;
        Ok(path)
    }

    pub fn save_markdown(&self, pages: &[ExtractedPage], domain: &str) -> io::Result<PathBuf> {
        let path = self.site_folder(domain)?.join(format!("{domain}.md"));
        fs::write(&path, render_markdown(pages, &now()))?;
        Ok(path)
    }

    pub fn save_summary(&self, session: &ScrapeSession) -> io::Result<PathBuf> {
        let path = self.site_folder(&session.domain_name)?.join("summary.txt");
        fs::write(&path, render_summary(session))?;
        Ok(path)
    }
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn rule(c: char) -> String {
    std::iter::repeat_n(c, RULE_WIDTH).collect()
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}

pub fn render_text(pages: &[ExtractedPage], generated: &str) -> String {
    let heavy = rule('=');
    let light = rule('-');
    let mut out = String::new();
    let _ = writeln!(out, "Scraped Data Report");
    let _ = writeln!(out, "Generated: {generated}");
    let _ = writeln!(out, "Total Pages: {}", pages.len());
    let _ = writeln!(out, "{heavy}\n");

    for (idx, page) in pages.iter().enumerate() {
        let _ = writeln!(out, "\n{heavy}");
        let _ = writeln!(out, "Page {}: {}", idx + 1, page.page_type);
        let _ = writeln!(out, "{heavy}\n");
        let _ = writeln!(out, "URL: {}", page.url);
        let _ = writeln!(out, "Title: {}", or_na(&page.title));
        let _ = writeln!(out, "Description: {}", or_na(&page.description));
        let _ = writeln!(out, "Word Count: {}", page.word_count);
        let _ = writeln!(out, "\n{light}");
        let _ = writeln!(out, "CONTENT:");
        let _ = writeln!(out, "{light}\n");
        let _ = write!(out, "{}\n\n", page.content);
    }
    out
}

pub fn render_markdown(pages: &[ExtractedPage], generated: &str) -> String {
    let mut out = String::new();
    let _ = write!(out, "# Scraped Data Report\n\n");
    let _ = writeln!(out, "**Generated:** {generated}  ");
    let _ = write!(out, "**Total Pages:** {}\n\n", pages.len());
    let _ = write!(out, "---\n\n");

    for (idx, page) in pages.iter().enumerate() {
        let _ = write!(out, "## {}. {}\n\n", idx + 1, page.page_type);
        let _ = write!(out, "**URL:** [{0}]({0})\n\n", page.url);
        let _ = writeln!(out, "**Title:** {}  ", or_na(&page.title));
        let _ = writeln!(out, "**Description:** {}  ", or_na(&page.description));
        let _ = write!(out, "**Word Count:** {}\n\n", page.word_count);
        let _ = write!(out, "### Content\n\n");
        let _ = write!(out, "{}\n\n---\n\n", page.content);
    }
    out
}

pub fn render_summary(session: &ScrapeSession) -> String {
    let heavy = rule('=');
    let scraped = DateTime::<Utc>::from_timestamp_millis(session.scraped_at.timestamp_millis())
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let discovered = session
        .urls_discovered
        .map(|n| n.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    let mut out = String::new();
    let _ = writeln!(out, "SCRAPING SUMMARY");
    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "Website: {}", session.website_url);
    let _ = writeln!(out, "Run: {}", session.run_id);
    let _ = writeln!(out, "Scraped: {scraped}");
    let _ = writeln!(out, "URLs Discovered: {discovered}");
    let _ = writeln!(out, "Relevant URLs: {}", session.relevant_urls);
    let _ = writeln!(out, "Pages Scraped: {}", session.pages_scraped);
    let _ = writeln!(out, "Total Words: {}", thousands(session.total_words));

    if !session.page_types.is_empty() {
        let _ = writeln!(out, "\nPage Types:");
        for (page_type, count) in &session.page_types {
            let _ = writeln!(out, "  - {page_type}: {count}");
        }
    }

    let _ = writeln!(out, "{heavy}");
    let _ = writeln!(out, "Total time: {:.2} seconds", session.total_time_seconds);
    out
}

/// `1234567` -> `1,234,567`
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
