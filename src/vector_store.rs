//! Similarity search over stored documents.
//!
//! The router and the search surfaces only see [`SimilarityStore`]; the MongoDB
//! implementation lives in `db`, an in-memory one lives here.

use async_trait::async_trait;
use std::sync::RwLock;

use crate::data_models::{ExtractedPage, ScrapeSession, SimilarityMatch};
use crate::embedder::Embedder;
use crate::error::StoreError;

/// Maximum number of characters sent to the embedding model.
pub const MAX_EMBED_CHARS: usize = 5000;

#[async_trait]
pub trait SimilarityStore: Send + Sync {
    /// Up to `limit` documents with `similarity >= threshold`, most similar first.
    async fn search(
        &self,
        query_text: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityMatch>, StoreError>;
}

/// Persists the pages of a finished scrape so later searches can find them.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the number of pages stored.
    async fn save_session(
        &self,
        session: &ScrapeSession,
        pages: &[ExtractedPage],
    ) -> Result<usize, StoreError>;
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Map cosine similarity from [-1, 1] into the [0, 1] range the router works with.
pub fn normalized_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity(a, b).clamp(0.0, 1.0)
}

/// Apply threshold, order by descending similarity and truncate.
pub fn rank_matches(mut scored: Vec<SimilarityMatch>, threshold: f32, limit: usize) -> Vec<SimilarityMatch> {
    scored.retain(|m| m.similarity >= threshold);
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(limit);
    scored
}

pub fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBED_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

struct MemoryEntry {
    doc: SimilarityMatch,
    embedding: Vec<f32>,
}

/// In-memory store for tests and local experiments. Data is lost on drop.
pub struct MemorySimilarityStore<E: Embedder> {
    embedder: E,
    entries: RwLock<Vec<MemoryEntry>>,
}

impl<E: Embedder> MemorySimilarityStore<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    pub async fn insert(
        &self,
        url: &str,
        title: &str,
        page_type: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        let embedding = self.embedder.embed(truncate_for_embedding(content)).await?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))?;
        let id = entries.len().to_string();
        entries.push(MemoryEntry {
            doc: SimilarityMatch {
                id,
                url: url.to_string(),
                title: title.to_string(),
                page_type: page_type.to_string(),
                content: content.to_string(),
                similarity: 0.0,
            },
            embedding,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<E: Embedder> SimilarityStore for MemorySimilarityStore<E> {
    async fn search(
        &self,
        query_text: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityMatch>, StoreError> {
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(truncate_for_embedding(query_text)).await?;
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Other("memory store lock poisoned".to_string()))?;

        let scored = entries
            .iter()
            .map(|entry| SimilarityMatch {
                similarity: normalized_similarity(&query, &entry.embedding),
                ..entry.doc.clone()
            })
            .collect();
        Ok(rank_matches(scored, threshold, limit))
    }
}

#[async_trait]
impl<E: Embedder> SessionStore for MemorySimilarityStore<E> {
    async fn save_session(
        &self,
        _session: &ScrapeSession,
        pages: &[ExtractedPage],
    ) -> Result<usize, StoreError> {
        for page in pages {
            self.insert(&page.url, &page.title, &page.page_type, &page.content)
                .await?;
        }
        Ok(pages.len())
    }
}
