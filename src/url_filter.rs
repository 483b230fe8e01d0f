//! Relevance filtering of candidate URLs.
//!
//! Two modes: a keyword heuristic, and an LLM classifier that works in batches
//! of [`BATCH_SIZE`]. A batch whose classification fails for any reason is
//! filtered with the keyword heuristic instead; the rest of the run keeps using
//! the LLM.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{Config, DEFAULT_KEYWORDS};
use crate::error::LlmError;
use crate::llm::OllamaClient;

pub const BATCH_SIZE: usize = 100;

/// How a scraping run decides relevance. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterMode {
    Llm { prompt: String },
    Keyword { keywords: Vec<String> },
}

impl FilterMode {
    pub fn llm(prompt: impl Into<String>) -> Self {
        FilterMode::Llm {
            prompt: prompt.into(),
        }
    }

    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        FilterMode::Keyword {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

/// What the classifier said about one batch.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Classification {
    #[serde(default)]
    pub relevant_urls: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

#[async_trait]
pub trait UrlClassifier: Send + Sync {
    async fn classify(&self, criterion: &str, urls: &[String]) -> Result<Classification, LlmError>;
}

/// Classifier backed by an Ollama `/api/generate` call in JSON mode.
pub struct LlmUrlClassifier {
    client: OllamaClient,
    model: String,
}

impl LlmUrlClassifier {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            OllamaClient::new(&config.ollama_base_url, config.classifier_timeout),
            config.ollama_model.clone(),
        )
    }
}

#[async_trait]
impl UrlClassifier for LlmUrlClassifier {
    async fn classify(&self, criterion: &str, urls: &[String]) -> Result<Classification, LlmError> {
        let prompt = build_classification_prompt(criterion, urls);
        let raw = self.client.generate(&self.model, &prompt, true).await?;
        parse_classification(&raw)
    }
}

pub fn build_classification_prompt(criterion: &str, urls: &[String]) -> String {
    let listing = urls
        .iter()
        .map(|u| format!("- {u}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are given a list of URLs from a website. Your task is to identify which URLs are relevant to this search criteria:\n\
         \n\
         {criterion}\n\
         \n\
         From the following URLs, select ONLY those that are relevant:\n\
         \n\
         {listing}\n\
         \n\
         Return your response as a JSON object with this exact structure:\n\
         {{\n  \"relevant_urls\": [\"url1\", \"url2\", ...],\n  \"reasoning\": \"brief explanation of why these URLs were selected\"\n}}\n\
         \n\
         Return ONLY the JSON object, no other text."
    )
}

/// Parse the JSON document the model put in its `response` field.
pub fn parse_classification(raw: &str) -> Result<Classification, LlmError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim())?;
    if !value.is_object() {
        return Err(LlmError::Malformed(format!(
            "expected a JSON object, got: {}",
            truncate(raw, 80)
        )));
    }
    Ok(serde_json::from_value(value)?)
}

/// Case-insensitive substring match of any keyword against the URL.
pub fn keyword_match<'a>(urls: &'a [String], keywords: &[String]) -> Vec<&'a String> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    urls.iter()
        .filter(|url| {
            let url_lower = url.to_lowercase();
            keywords
                .iter()
                .any(|k| !k.is_empty() && url_lower.contains(k.as_str()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchMethod {
    Keyword,
    Llm { reasoning: String },
    KeywordFallback { reason: String },
}

#[derive(Debug, Clone)]
pub struct BatchDecision {
    pub index: usize,
    pub size: usize,
    pub selected: usize,
    pub method: BatchMethod,
}

#[derive(Debug, Clone, Default)]
pub struct FilterReport {
    pub relevant: Vec<String>,
    pub batches: Vec<BatchDecision>,
}

impl FilterReport {
    pub fn fallback_batches(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| matches!(b.method, BatchMethod::KeywordFallback { .. }))
            .count()
    }
}

pub struct RelevanceFilter {
    classifier: Arc<dyn UrlClassifier>,
    fallback_keywords: Vec<String>,
    batch_size: usize,
}

impl RelevanceFilter {
    /// `fallback_keywords` is used by failed LLM batches; an empty list means the defaults.
    pub fn new(classifier: Arc<dyn UrlClassifier>, fallback_keywords: Vec<String>) -> Self {
        let fallback_keywords = if fallback_keywords.is_empty() {
            DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
        } else {
            fallback_keywords
        };
        Self {
            classifier,
            fallback_keywords,
            batch_size: BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Relevant URLs, deduplicated, in first-seen input order.
    pub async fn filter(&self, urls: &[String], mode: &FilterMode) -> Vec<String> {
        self.filter_detailed(urls, mode).await.relevant
    }

    pub async fn filter_detailed(&self, urls: &[String], mode: &FilterMode) -> FilterReport {
        let mut report = FilterReport::default();
        if urls.is_empty() {
            return report;
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut keep = |selected: Vec<&String>, relevant: &mut Vec<String>| -> usize {
            let before = relevant.len();
            for url in selected {
                if seen.insert(url.clone()) {
                    relevant.push(url.clone());
                }
            }
            relevant.len() - before
        };

        match mode {
            FilterMode::Keyword { keywords } => {
                let keywords = if keywords.is_empty() {
                    &self.fallback_keywords
                } else {
                    keywords
                };
                let selected = keyword_match(urls, keywords);
                let count = selected.len();
                keep(selected, &mut report.relevant);
                log::info!("keyword filter matched {count} of {} urls", urls.len());
                report.batches.push(BatchDecision {
                    index: 0,
                    size: urls.len(),
                    selected: count,
                    method: BatchMethod::Keyword,
                });
            }
            FilterMode::Llm { prompt } => {
                for (index, batch) in urls.chunks(self.batch_size).enumerate() {
                    let (selected, method) = match self.classifier.classify(prompt, batch).await {
                        Ok(classification) => {
                            let returned: HashSet<&str> = classification
                                .relevant_urls
                                .iter()
                                .map(|u| u.trim())
                                .collect();
                            // only URLs that were actually offered count, the model may invent others
                            let selected: Vec<&String> = batch
                                .iter()
                                .filter(|u| returned.contains(u.as_str()))
                                .collect();
                            log::info!(
                                "llm selected {} urls from batch {}",
                                selected.len(),
                                index + 1
                            );
                            if !classification.reasoning.is_empty() {
                                log::debug!("reasoning: {}", truncate(&classification.reasoning, 100));
                            }
                            (
                                selected,
                                BatchMethod::Llm {
                                    reasoning: classification.reasoning,
                                },
                            )
                        }
                        Err(e) => {
                            log::warn!("llm filtering failed for batch {}: {:#}", index + 1, e);
                            let selected = keyword_match(batch, &self.fallback_keywords);
                            log::info!("fallback: matched {} urls by keywords", selected.len());
                            (
                                selected,
                                BatchMethod::KeywordFallback {
                                    reason: e.to_string(),
                                },
                            )
                        }
                    };
                    let count = selected.len();
                    keep(selected, &mut report.relevant);
                    report.batches.push(BatchDecision {
                        index,
                        size: batch.len(),
                        selected: count,
                        method,
                    });
                }
            }
        }

        report
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
