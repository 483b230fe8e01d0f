use axum::{Router, routing::post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::query_router::QueryRouter;
use crate::vector_store::SimilarityStore;

pub mod handlers;
pub mod models;

/// Shared by every handler.
pub struct AppState {
    pub store: Arc<dyn SimilarityStore>,
    pub router: Arc<QueryRouter>,
    /// Used by `/api/search` when the request does not set its own.
    pub search_threshold: f32,
    pub search_limit: usize,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/search", post(handlers::search_handler))
        .route("/api/ask", post(handlers::ask_handler))
        .with_state(state)
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::error::LlmError;
    use crate::query_router::{AnswerGenerator, RouterSettings};
    use crate::vector_store::MemorySimilarityStore;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct EchoGenerator;

    #[async_trait]
    impl AnswerGenerator for EchoGenerator {
        async fn generate(&self, question: &str, _context: &str) -> Result<String, LlmError> {
            Ok(format!("answer to: {question}"))
        }
    }

    async fn app() -> Router {
        let store = Arc::new(MemorySimilarityStore::new(HashingEmbedder::default()));
        store
            .insert(
                "https://acme.com/refunds",
                "Refunds",
                "Legal",
                "refund policy refunds are issued within thirty days",
            )
            .await
            .unwrap();
        store
            .insert("https://acme.com/jobs", "Jobs", "General", "we are hiring engineers")
            .await
            .unwrap();

        let router = QueryRouter::new(
            store.clone(),
            Arc::new(EchoGenerator),
            RouterSettings {
                retrieval_threshold: 0.3,
                routing_threshold: 0.5,
                limit: 5,
            },
        );
        create_router(Arc::new(AppState {
            store,
            router: Arc::new(router),
            search_threshold: 0.0,
            search_limit: 10,
        }))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_search_returns_ranked_results() {
        let response = app()
            .await
            .oneshot(post_json(
                "/api/search",
                serde_json::json!({ "query": "refund policy", "limit": 1 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["total_results"], 1);
        assert_eq!(body["results"][0]["url"], "https://acme.com/refunds");
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let response = app()
            .await
            .oneshot(post_json("/api/search", serde_json::json!({ "query": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app()
            .await
            .oneshot(post_json("/api/ask", serde_json::json!({ "question": "" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ask_answers_from_corpus() {
        let response = app()
            .await
            .oneshot(post_json(
                "/api/ask",
                serde_json::json!({ "question": "refund policy refunds" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["outcome"], "answered");
        assert_eq!(body["answer"], "answer to: refund policy refunds");
        assert_eq!(body["sources"][0]["url"], "https://acme.com/refunds");
    }
}
