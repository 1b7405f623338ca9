//! Router assembly: quiz API endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - quiz API under `/api/v1/...`
/// - CORS (allow any origin/method/headers), the game client is served elsewhere
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Player-facing
        .route("/api/v1/quiz", get(http::http_get_quiz))
        .route("/api/v1/quiz/answer", post(http::http_post_answer))
        .route("/api/v1/quiz/bonus", get(http::http_get_bonus))
        // Operator-facing
        .route("/api/v1/quiz/metrics", get(http::http_get_metrics))
        .route("/api/v1/quiz/metrics/reset", post(http::http_reset_metrics))
        .route("/api/v1/quiz/cache/stats", get(http::http_cache_stats))
        .route("/api/v1/quiz/cache/clear", post(http::http_cache_clear))
        .route("/api/v1/quiz/quality", post(http::http_post_quality))
        .route("/api/v1/quiz/analytics/quality", get(http::http_question_quality))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
