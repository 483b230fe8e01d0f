use serde::{Deserialize, Serialize};

use crate::data_models::SimilarityMatch;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<PageResult>,
    pub total_results: usize,
    pub processing_time_ms: u128,
}

#[derive(Debug, Serialize)]
pub struct PageResult {
    pub id: String,
    pub url: String,
    pub title: String,
    pub page_type: String,
    pub snippet: String,
    pub similarity: f32,
}

const SNIPPET_CHARS: usize = 200;

impl From<SimilarityMatch> for PageResult {
    fn from(m: SimilarityMatch) -> Self {
        let snippet = match m.content.char_indices().nth(SNIPPET_CHARS) {
            Some((idx, _)) => format!("{}...", &m.content[..idx]),
            None => m.content,
        };
        PageResult {
            id: m.id,
            url: m.url,
            title: m.title,
            page_type: m.page_type,
            snippet,
            similarity: m.similarity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}
