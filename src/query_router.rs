//! Decide whether a question can be answered from the stored corpus.
//!
//! Two independent knobs are involved. `routing_threshold` gates the binary
//! answer-or-defer decision on the best similarity found; `retrieval_threshold`
//! decides which of the retrieved documents are used as context. Nothing forces
//! `retrieval_threshold <= routing_threshold`; a combination that leaves no
//! context despite a positive routing decision is reported as
//! [`RouteOutcome::ThresholdMismatch`].

use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::Config;
use crate::data_models::SimilarityMatch;
use crate::error::{LlmError, RouteError};
use crate::llm::OllamaClient;
use crate::vector_store::SimilarityStore;

/// Characters of each document included in the generation context.
pub const CONTEXT_CHARS_PER_DOC: usize = 1500;

pub const ANSWER_TEMPLATE: &str = "You are a helpful assistant that answers questions based on company policy documents.

Use the following context from policy documents to answer the question.

Context:
{context}

Question: {question}

Instructions:
- Answer based ONLY on the provided context
- If the context doesn't contain enough information, say so clearly
- Be concise but informative
- Mention which document(s) or company policies you're referencing
- If you find contradictions between documents, point them out

Answer:";

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, question: &str, context: &str) -> Result<String, LlmError>;
}

pub struct OllamaAnswerGenerator {
    client: OllamaClient,
    model: String,
}

impl OllamaAnswerGenerator {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl AnswerGenerator for OllamaAnswerGenerator {
    async fn generate(&self, question: &str, context: &str) -> Result<String, LlmError> {
        let prompt = ANSWER_TEMPLATE
            .replace("{context}", context)
            .replace("{question}", question);
        let answer = self.client.generate(&self.model, &prompt, false).await?;
        Ok(answer.trim().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterSettings {
    pub retrieval_threshold: f32,
    pub routing_threshold: f32,
    pub limit: usize,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            retrieval_threshold: 0.5,
            routing_threshold: 0.75,
            limit: 5,
        }
    }
}

impl From<&Config> for RouterSettings {
    fn from(config: &Config) -> Self {
        Self {
            retrieval_threshold: config.retrieval_threshold,
            routing_threshold: config.routing_threshold,
            limit: config.retrieval_limit.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    UseCorpus,
    DeferToSearch,
}

/// Inclusive: a best match exactly at the threshold is answerable.
pub fn decide(highest_similarity: f32, routing_threshold: f32) -> RoutingDecision {
    if highest_similarity >= routing_threshold {
        RoutingDecision::UseCorpus
    } else {
        RoutingDecision::DeferToSearch
    }
}

pub fn highest_similarity(docs: &[SimilarityMatch]) -> Option<f32> {
    docs.iter().map(|d| d.similarity).reduce(f32::max)
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// The store holds no documents at all.
    EmptyCorpus,
    /// Best match is below the routing threshold; an external search should answer this.
    DeferToSearch {
        highest: f32,
        routing_threshold: f32,
        candidates: Vec<SimilarityMatch>,
    },
    /// Routing said answerable but nothing passed the retrieval threshold.
    ThresholdMismatch {
        highest: f32,
        routing_threshold: f32,
        retrieval_threshold: f32,
        candidates: Vec<SimilarityMatch>,
    },
    Answered {
        highest: f32,
        answer: String,
        sources: Vec<SimilarityMatch>,
    },
}

pub struct QueryRouter {
    store: Arc<dyn SimilarityStore>,
    generator: Arc<dyn AnswerGenerator>,
    settings: RouterSettings,
}

impl QueryRouter {
    pub fn new(
        store: Arc<dyn SimilarityStore>,
        generator: Arc<dyn AnswerGenerator>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            store,
            generator,
            settings,
        }
    }

    pub async fn route(&self, question: &str) -> Result<RouteOutcome, RouteError> {
        let RouterSettings {
            retrieval_threshold,
            routing_threshold,
            limit,
        } = self.settings;
        // a zero limit would make every corpus look empty
        let limit = limit.max(1);

        // no similarity floor: this retrieval only discovers the best score available
        let retrieved = self.store.search(question, 0.0, limit).await?;
        let Some(highest) = highest_similarity(&retrieved) else {
            log::info!("no documents found in knowledge base");
            return Ok(RouteOutcome::EmptyCorpus);
        };

        log::info!(
            "retrieved {} documents, highest similarity {highest:.4}, routing threshold {routing_threshold:.4}",
            retrieved.len()
        );

        if decide(highest, routing_threshold) == RoutingDecision::DeferToSearch {
            log::info!("routing to external search: {highest:.4} < {routing_threshold:.4}");
            return Ok(RouteOutcome::DeferToSearch {
                highest,
                routing_threshold,
                candidates: retrieved,
            });
        }

        let context_docs = select_context(&retrieved, retrieval_threshold);
        if context_docs.is_empty() {
            log::warn!(
                "similarity {highest:.4} passes routing threshold {routing_threshold:.4} but no document reaches retrieval threshold {retrieval_threshold:.4}"
            );
            return Ok(RouteOutcome::ThresholdMismatch {
                highest,
                routing_threshold,
                retrieval_threshold,
                candidates: retrieved,
            });
        }

        log::info!("answering from {} documents", context_docs.len());
        let context = format_context(&context_docs);
        let answer = self.generator.generate(question, &context).await?;

        Ok(RouteOutcome::Answered {
            highest,
            answer,
            sources: context_docs,
        })
    }
}

/// Retrieved documents at or above the retrieval threshold, order kept.
pub fn select_context(docs: &[SimilarityMatch], retrieval_threshold: f32) -> Vec<SimilarityMatch> {
    docs.iter()
        .filter(|d| d.similarity >= retrieval_threshold)
        .cloned()
        .collect()
}

pub fn format_context(docs: &[SimilarityMatch]) -> String {
    let mut out = String::new();
    for (i, doc) in docs.iter().enumerate() {
        let content: String = doc.content.chars().take(CONTEXT_CHARS_PER_DOC).collect();
        let _ = writeln!(
            out,
            "--- Document {}: {} ---\nSource: {}\nType: {}\nSimilarity: {:.2}%\nContent: {}",
            i + 1,
            doc.title,
            doc.url,
            doc.page_type,
            doc.similarity * 100.0,
            content
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStore {
        docs: Vec<SimilarityMatch>,
        requests: Mutex<Vec<(f32, usize)>>,
    }

    impl FixedStore {
        fn new(similarities: &[f32]) -> Self {
            let docs = similarities
                .iter()
                .enumerate()
                .map(|(i, s)| SimilarityMatch {
                    id: i.to_string(),
                    url: format!("https://x.com/doc-{i}"),
                    title: format!("Doc {i}"),
                    page_type: "Privacy Policy".to_string(),
                    content: "we keep your data safe".to_string(),
                    similarity: *s,
                })
                .collect();
            Self {
                docs,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SimilarityStore for FixedStore {
        async fn search(
            &self,
            _query_text: &str,
            threshold: f32,
            limit: usize,
        ) -> Result<Vec<SimilarityMatch>, StoreError> {
            self.requests.lock().unwrap().push((threshold, limit));
            Ok(self
                .docs
                .iter()
                .filter(|d| d.similarity >= threshold)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct CountingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AnswerGenerator for CountingGenerator {
        async fn generate(&self, _question: &str, context: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("answer from {} chars of context", context.len()))
        }
    }

    fn router(
        store: Arc<FixedStore>,
        generator: Arc<CountingGenerator>,
        retrieval_threshold: f32,
        routing_threshold: f32,
    ) -> QueryRouter {
        QueryRouter::new(
            store,
            generator,
            RouterSettings {
                retrieval_threshold,
                routing_threshold,
                limit: 5,
            },
        )
    }

    #[test]
    fn test_routing_boundary_is_inclusive() {
        assert_eq!(decide(0.75, 0.75), RoutingDecision::UseCorpus);
        assert_eq!(decide(0.7499, 0.75), RoutingDecision::DeferToSearch);
        assert_eq!(decide(0.9, 0.75), RoutingDecision::UseCorpus);
    }

    #[test]
    fn test_highest_similarity() {
        let store = FixedStore::new(&[0.3, 0.8, 0.5]);
        assert_eq!(highest_similarity(&store.docs), Some(0.8));
        assert_eq!(highest_similarity(&[]), None);
    }

    #[test]
    fn test_format_context_enumerates_and_truncates() {
        let mut store = FixedStore::new(&[0.8123, 0.6]);
        store.docs[1].content = "x".repeat(CONTEXT_CHARS_PER_DOC + 50);
        let context = format_context(&store.docs);
        assert!(context.contains("--- Document 1: Doc 0 ---"));
        assert!(context.contains("Source: https://x.com/doc-1"));
        assert!(context.contains("Similarity: 81.23%"));
        assert!(!context.contains(&"x".repeat(CONTEXT_CHARS_PER_DOC + 1)));
    }

    #[tokio::test]
    async fn test_empty_corpus_makes_no_generation_call() {
        let store = Arc::new(FixedStore::new(&[]));
        let generator = Arc::new(CountingGenerator::default());
        let outcome = router(store.clone(), generator.clone(), 0.5, 0.75)
            .route("what is the refund policy?")
            .await
            .unwrap();
        assert!(matches!(outcome, RouteOutcome::EmptyCorpus));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(*store.requests.lock().unwrap(), vec![(0.0, 5)]);
    }

    #[tokio::test]
    async fn test_zero_limit_still_sees_the_corpus() {
        let store = Arc::new(FixedStore::new(&[0.8, 0.6]));
        let generator = Arc::new(CountingGenerator::default());
        let router = QueryRouter::new(
            store.clone(),
            generator.clone(),
            RouterSettings {
                limit: 0,
                ..RouterSettings::default()
            },
        );

        match router.route("q").await.unwrap() {
            RouteOutcome::Answered { highest, sources, .. } => {
                assert_eq!(highest, 0.8);
                assert_eq!(sources.len(), 1);
            }
            other => panic!("expected an answer, got {other:?}"),
        }
        assert_eq!(*store.requests.lock().unwrap(), vec![(0.0, 1)]);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_settings_from_config_keep_a_positive_limit() {
        let config = Config {
            retrieval_limit: 0,
            ..Config::default()
        };
        assert_eq!(RouterSettings::from(&config).limit, 1);
    }

    #[tokio::test]
    async fn test_exact_threshold_uses_corpus() {
        let store = Arc::new(FixedStore::new(&[0.75, 0.4]));
        let generator = Arc::new(CountingGenerator::default());
        let outcome = router(store, generator.clone(), 0.5, 0.75)
            .route("q")
            .await
            .unwrap();
        match outcome {
            RouteOutcome::Answered { highest, sources, .. } => {
                assert_eq!(highest, 0.75);
                assert_eq!(sources.len(), 1);
                assert_eq!(sources[0].url, "https://x.com/doc-0");
            }
            other => panic!("expected an answer, got {other:?}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_just_below_threshold_defers() {
        let store = Arc::new(FixedStore::new(&[0.7499, 0.2]));
        let generator = Arc::new(CountingGenerator::default());
        let outcome = router(store, generator.clone(), 0.5, 0.75)
            .route("latest phone model?")
            .await
            .unwrap();
        match outcome {
            RouteOutcome::DeferToSearch { highest, candidates, .. } => {
                assert_eq!(highest, 0.7499);
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected deferral, got {other:?}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_misconfigured_thresholds_are_surfaced() {
        let store = Arc::new(FixedStore::new(&[0.6]));
        let generator = Arc::new(CountingGenerator::default());
        let outcome = router(store, generator.clone(), 0.9, 0.5)
            .route("q")
            .await
            .unwrap();
        match outcome {
            RouteOutcome::ThresholdMismatch {
                highest,
                routing_threshold,
                retrieval_threshold,
                ..
            } => {
                assert_eq!(highest, 0.6);
                assert_eq!(routing_threshold, 0.5);
                assert_eq!(retrieval_threshold, 0.9);
            }
            other => panic!("expected threshold mismatch, got {other:?}"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_only_includes_documents_above_retrieval_threshold() {
        let store = Arc::new(FixedStore::new(&[0.9, 0.55, 0.45]));
        let generator = Arc::new(CountingGenerator::default());
        let outcome = router(store, generator, 0.5, 0.75)
            .route("q")
            .await
            .unwrap();
        let RouteOutcome::Answered { sources, .. } = outcome else {
            panic!("expected an answer");
        };
        let similarities: Vec<f32> = sources.iter().map(|s| s.similarity).collect();
        assert_eq!(similarities, vec![0.9, 0.55]);
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_value(RouteOutcome::EmptyCorpus).unwrap();
        assert_eq!(json["outcome"], "empty_corpus");
    }
}
