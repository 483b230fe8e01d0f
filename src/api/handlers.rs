use axum::{Json, extract::State, http::StatusCode};
use std::sync::Arc;
use std::time::Instant;

use crate::query_router::RouteOutcome;

use super::AppState;
use super::models::{AskRequest, PageResult, SearchRequest, SearchResponse};

pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = Instant::now();

    if request.query.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query cannot be empty".to_string()));
    }

    let threshold = request.threshold.unwrap_or(state.search_threshold);
    let limit = request.limit.unwrap_or(state.search_limit);

    let matches = state
        .store
        .search(&request.query, threshold, limit)
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Search error: {}", e),
            )
        })?;

    let results: Vec<PageResult> = matches.into_iter().map(PageResult::from).collect();
    let total_results = results.len();
    let processing_time_ms = start.elapsed().as_millis();

    Ok(Json(SearchResponse {
        query: request.query,
        results,
        total_results,
        processing_time_ms,
    }))
}

pub async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<RouteOutcome>, (StatusCode, String)> {
    if request.question.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question cannot be empty".to_string()));
    }

    let outcome = state.router.route(&request.question).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Routing error: {}", e),
        )
    })?;

    Ok(Json(outcome))
}
