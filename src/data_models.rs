use std::collections::BTreeMap;

use mongodb::bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// Cleaned content of one policy page, as produced by the content extractor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub url: String,
    pub title: String,
    pub description: String,
    pub page_type: String,
    pub content: String,
    pub word_count: usize,
}

/// A page persisted together with its content embedding.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredPage {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub session_id: ObjectId,
    pub url: String,
    pub title: String,
    pub description: String,
    pub page_type: String,
    pub content: String,
    pub word_count: u32,
    /// Absent when the embedding model was unavailable at store time.
    pub embedding: Option<Vec<f32>>,
    pub stored_at: DateTime,
}

impl StoredPage {
    pub fn new(session_id: ObjectId, page: &ExtractedPage, embedding: Option<Vec<f32>>) -> StoredPage {
        StoredPage {
            id: ObjectId::new(),
            session_id,
            url: page.url.clone(),
            title: page.title.clone(),
            description: page.description.clone(),
            page_type: page.page_type.clone(),
            content: page.content.clone(),
            word_count: page.word_count as u32,
            embedding,
            stored_at: DateTime::now(),
        }
    }
}

/// One scraping run of one website.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScrapeSession {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    /// Short human friendly handle, printed in logs and summaries.
    pub run_id: String,
    pub website_url: String,
    pub domain_name: String,
    pub urls_discovered: Option<u32>,
    pub relevant_urls: u32,
    pub pages_scraped: u32,
    pub total_words: u64,
    pub page_types: BTreeMap<String, u32>,
    pub total_time_seconds: f64,
    pub scraped_at: DateTime,
}

impl ScrapeSession {
    pub fn new(run_id: String, website_url: String, domain_name: String) -> ScrapeSession {
        ScrapeSession {
            id: ObjectId::new(),
            run_id,
            website_url,
            domain_name,
            urls_discovered: None,
            relevant_urls: 0,
            pages_scraped: 0,
            total_words: 0,
            page_types: BTreeMap::new(),
            total_time_seconds: 0.0,
            scraped_at: DateTime::now(),
        }
    }
}

/// A stored document matched against a query. Produced fresh for every search.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub id: String,
    pub url: String,
    pub title: String,
    pub page_type: String,
    pub content: String,
    pub similarity: f32,
}
