use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{
    Client, Collection, Database as MongoDatabase,
    bson::{Document, doc, oid::ObjectId},
};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

use crate::config::Config;
use crate::data_models::{ExtractedPage, ScrapeSession, SimilarityMatch, StoredPage};
use crate::embedder::Embedder;
use crate::error::StoreError;
use crate::vector_store::{
    SessionStore, SimilarityStore, normalized_similarity, rank_matches, truncate_for_embedding,
};

/// Collection names as constants for consistency
pub mod collections {
    pub const PAGES: &str = "pages";
    pub const SESSIONS: &str = "scrape_sessions";
}

/// Main database wrapper providing connection management and collection access
#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    db: MongoDatabase,
}

impl Database {
    /// Connect and ping. Fails fast when the server is unreachable.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self> {
        let client_options = ClientOptions::parse(uri)
            .await
            .context("Failed to parse MongoDB connection string")?;

        let client =
            Client::with_options(client_options).context("Failed to create MongoDB client")?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .context("Failed to connect to MongoDB")?;

        log::info!("Connected to MongoDB database: {}", db_name);

        let db = client.database(db_name);

        Ok(Self { client, db })
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.mongo_uri, &config.mongo_db_name).await
    }

    /// Get a typed collection by name
    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.db.collection(name)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn pages(&self) -> Collection<StoredPage> {
        self.collection(collections::PAGES)
    }

    pub fn sessions(&self) -> Collection<ScrapeSession> {
        self.collection(collections::SESSIONS)
    }
}

// =============================================================================
// Generic CRUD operations
// =============================================================================

pub struct Repository<T>
where
    T: Send + Sync,
{
    collection: Collection<T>,
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    pub fn new(collection: Collection<T>) -> Self {
        Self { collection }
    }

    /// Insert a single document
    pub async fn insert(&self, doc: &T) -> Result<ObjectId> {
        let result = self
            .collection
            .insert_one(doc)
            .await
            .context("Failed to insert document")?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| anyhow::anyhow!("Failed to get inserted ObjectId"))
    }

    /// Insert multiple documents
    pub async fn insert_many(&self, docs: &[T]) -> Result<Vec<ObjectId>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }
        let result = self
            .collection
            .insert_many(docs)
            .await
            .context("Failed to insert documents")?;

        Ok(result
            .inserted_ids
            .values()
            .filter_map(|id| id.as_object_id())
            .collect())
    }

    /// Find all documents matching a filter, optionally sorted
    pub async fn find(&self, filter: Document, sort: Option<Document>) -> Result<Vec<T>> {
        let options = FindOptions::builder().sort(sort).build();
        let cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .context("Failed to execute find query")?;

        cursor
            .try_collect()
            .await
            .context("Failed to collect results")
    }

    pub async fn count(&self, filter: Document) -> Result<u64> {
        self.collection
            .count_documents(filter)
            .await
            .context("Failed to count documents")
    }
}

// =============================================================================
// Page and session repositories
// =============================================================================

pub struct PageRepo {
    repo: Repository<StoredPage>,
}

impl PageRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            repo: Repository::new(db.pages()),
        }
    }

    pub async fn insert_many(&self, pages: &[StoredPage]) -> Result<Vec<ObjectId>> {
        self.repo.insert_many(pages).await
    }

    /// Pages that carry an embedding, i.e. the searchable corpus.
    pub async fn list_embedded(&self) -> Result<Vec<StoredPage>> {
        self.repo
            .find(doc! { "embedding": { "$type": "array" } }, None)
            .await
    }

    pub async fn count(&self) -> Result<u64> {
        self.repo.count(doc! {}).await
    }
}

pub struct SessionRepo {
    repo: Repository<ScrapeSession>,
}

impl SessionRepo {
    pub fn new(db: &Database) -> Self {
        Self {
            repo: Repository::new(db.sessions()),
        }
    }

    pub async fn insert(&self, session: &ScrapeSession) -> Result<ObjectId> {
        self.repo.insert(session).await
    }

    /// Most recent first.
    pub async fn list_recent(&self) -> Result<Vec<ScrapeSession>> {
        self.repo
            .find(doc! {}, Some(doc! { "scraped_at": -1 }))
            .await
    }
}

// =============================================================================
// Similarity search over stored pages
// =============================================================================

/// MongoDB-backed corpus. Embeddings are stored with each page and scored in process.
pub struct MongoSimilarityStore {
    pages: PageRepo,
    sessions: SessionRepo,
    embedder: Arc<dyn Embedder>,
}

impl MongoSimilarityStore {
    pub fn new(db: &Database, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            pages: PageRepo::new(db),
            sessions: SessionRepo::new(db),
            embedder,
        }
    }

    pub fn sessions(&self) -> &SessionRepo {
        &self.sessions
    }

    pub fn pages(&self) -> &PageRepo {
        &self.pages
    }

    async fn embed_page(&self, page: &ExtractedPage) -> Option<Vec<f32>> {
        if page.content.is_empty() {
            return None;
        }
        match self.embedder.embed(truncate_for_embedding(&page.content)).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                log::warn!("could not generate embedding for {}: {:#}", page.url, e);
                None
            }
        }
    }
}

#[async_trait]
impl SimilarityStore for MongoSimilarityStore {
    async fn search(
        &self,
        query_text: &str,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityMatch>, StoreError> {
        let corpus = self.pages.list_embedded().await?;
        if corpus.is_empty() {
            return Ok(Vec::new());
        }
        let query = self.embedder.embed(truncate_for_embedding(query_text)).await?;

        let scored = corpus
            .into_iter()
            .filter_map(|page| {
                let embedding = page.embedding?;
                Some(SimilarityMatch {
                    id: page.id.to_hex(),
                    similarity: normalized_similarity(&query, &embedding),
                    url: page.url,
                    title: page.title,
                    page_type: page.page_type,
                    content: page.content,
                })
            })
            .collect();

        Ok(rank_matches(scored, threshold, limit))
    }
}

#[async_trait]
impl SessionStore for MongoSimilarityStore {
    async fn save_session(
        &self,
        session: &ScrapeSession,
        pages: &[ExtractedPage],
    ) -> Result<usize, StoreError> {
        let session_id = self.sessions.insert(session).await?;

        log::info!("generating embeddings for {} pages", pages.len());
        let mut rows = Vec::with_capacity(pages.len());
        for (idx, page) in pages.iter().enumerate() {
            let embedding = self.embed_page(page).await;
            rows.push(StoredPage::new(session_id, page, embedding));
            if (idx + 1) % 10 == 0 || idx + 1 == pages.len() {
                log::debug!("generated {}/{} embeddings", idx + 1, pages.len());
            }
        }

        let ids = self.pages.insert_many(&rows).await?;
        log::info!("saved {} pages to database", ids.len());
        Ok(ids.len())
    }
}

// =============================================================================
// Test utilities
// =============================================================================
