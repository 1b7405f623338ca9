//! InfraQuiz · quiz generation backend
//!
//! - Axum HTTP API for quizzes, answers and pipeline metrics
//! - vLLM (OpenAI-compatible) completion endpoint for generation
//! - Pre-generated quiz pool with background refill
//!
//! Important env variables:
//!   PORT                         : u16 (default 3000)
//!   VLLM_ENDPOINT                : completion server (default "http://localhost:8000")
//!   VLLM_MODEL_NAME              : model name sent with each request
//!   VLLM_TIMEOUT_MS              : per-call timeout
//!   VLLM_API_KEY                 : optional bearer token
//!   LLM_QUIZ_ENABLED             : "false" serves the fallback bank only
//!   QUIZ_CACHE_POOL_SIZE         : target quizzes per difficulty
//!   QUIZ_CACHE_REFRESH_THRESHOLD : refill when a pool drops below this
//!   QUIZ_CACHE_MIN_QUALITY       : quality gate for generated quizzes
//!   QUIZ_CONFIG_PATH             : path to TOML config (pipeline, prompts, quiz bank)
//!   DOCS_ENDPOINT                : optional reference-docs service
//!   LOG_LEVEL                    : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT                   : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use infraquiz::config::load_config_from_env;
use infraquiz::routes::build_router;
use infraquiz::state::AppState;
use infraquiz::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let config = load_config_from_env();
  let port = config.port;

  // Repository, cache pool, refill worker, generator.
  let state = Arc::new(AppState::from_config(config).await?);

  let app = build_router(state.clone());

  let addr = SocketAddr::from(([0, 0, 0, 0], port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "infraquiz", %addr, model = %state.model, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "infraquiz", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "infraquiz", error = %e, "Could not listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "infraquiz", "Shutdown requested");
}
