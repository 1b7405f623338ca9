//! Minimal OpenAI-compatible completion client (vLLM serving a local model).
//!
//! We only call `/v1/completions` with a single prompt and return the raw text;
//! turning that text into a quiz is the generator's job. Calls are instrumented
//! and log model name, latency and response size (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::LlmSettings;
use crate::error::CompletionError;

/// Anything that turns a prompt into raw text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
  async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;

  /// Human-readable model identifier for logs.
  fn model_name(&self) -> &str {
    "unknown"
  }

  /// Whether the upstream looks reachable.
  async fn health_check(&self) -> bool {
    true
  }
}

#[derive(Clone)]
pub struct VllmClient {
  client: reqwest::Client,
  endpoint: String,
  model: String,
  api_key: Option<String>,
  timeout_ms: u64,
  max_retries: u32,
}

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;
const TOP_P: f32 = 0.9;
const BACKOFF_STEP_MS: u64 = 500;

impl VllmClient {
  pub fn new(settings: &LlmSettings) -> Result<Self, CompletionError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_millis(settings.timeout_ms))
      .build()?;
    Ok(Self {
      client,
      endpoint: settings.endpoint.trim_end_matches('/').to_string(),
      model: settings.model.clone(),
      api_key: settings.api_key.clone(),
      timeout_ms: settings.timeout_ms,
      max_retries: settings.max_retries,
    })
  }

  pub fn endpoint(&self) -> &str {
    &self.endpoint
  }

  async fn complete_once(&self, prompt: &str) -> Result<String, CompletionError> {
    let url = format!("{}/v1/completions", self.endpoint);
    let req = CompletionRequest {
      model: &self.model,
      prompt,
      max_tokens: MAX_TOKENS,
      temperature: TEMPERATURE,
      top_p: TOP_P,
      stop: ["---", "\n\n\n"],
    };

    let mut builder = self.client.post(&url)
      .header(USER_AGENT, "infraquiz-backend/0.1")
      .header(CONTENT_TYPE, "application/json");
    if let Some(key) = &self.api_key {
      builder = builder.header(AUTHORIZATION, format!("Bearer {}", key));
    }

    let res = builder.json(&req).send().await.map_err(|e| {
      if e.is_timeout() { CompletionError::Timeout(self.timeout_ms) } else { CompletionError::from(e) }
    })?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_provider_error(&body).unwrap_or(body);
      return Err(CompletionError::Status { status, message });
    }

    let body: CompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(target: "quiz", prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, "vLLM usage");
    }
    let text = body.choices.into_iter().next().map(|c| c.text).unwrap_or_default();
    if text.trim().is_empty() {
      return Err(CompletionError::Empty);
    }
    Ok(text)
  }
}

#[async_trait]
impl CompletionClient for VllmClient {
  /// One logical completion: up to `1 + max_retries` HTTP calls with linear
  /// backoff between them.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
    let start = Instant::now();
    let mut attempt = 0u32;
    loop {
      attempt += 1;
      match self.complete_once(prompt).await {
        Ok(text) => {
          info!(target: "quiz", elapsed = ?start.elapsed(), attempt, resp_len = text.len(), "Model response received");
          return Ok(text);
        }
        Err(e) if attempt <= self.max_retries => {
          warn!(target: "quiz", attempt, error = %e, "Completion call failed; retrying");
          tokio::time::sleep(Duration::from_millis(BACKOFF_STEP_MS * attempt as u64)).await;
        }
        Err(e) => return Err(e),
      }
    }
  }

  fn model_name(&self) -> &str {
    &self.model
  }

  /// GET {endpoint}/health; true on any 2xx.
  #[instrument(level = "debug", skip(self), fields(endpoint = %self.endpoint))]
  async fn health_check(&self) -> bool {
    let url = format!("{}/health", self.endpoint);
    match self.client.get(&url).send().await {
      Ok(res) => res.status().is_success(),
      Err(e) => {
        debug!(target: "quiz", error = %e, "vLLM health check failed");
        false
      }
    }
  }
}

// --- Completion DTOs ---

#[derive(Serialize)]
struct CompletionRequest<'a> {
  model: &'a str,
  prompt: &'a str,
  max_tokens: u32,
  temperature: f32,
  top_p: f32,
  stop: [&'static str; 2],
}

#[derive(Deserialize)]
struct CompletionResponse {
  #[serde(default)] choices: Vec<CompletionChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct CompletionChoice { #[serde(default)] text: String }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_provider_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn provider_error_message_is_extracted() {
    let body = r#"{"error":{"message":"model overloaded","type":"server_error"}}"#;
    assert_eq!(extract_provider_error(body).as_deref(), Some("model overloaded"));
    assert_eq!(extract_provider_error("plain text"), None);
  }

  #[test]
  fn request_carries_sampling_parameters() {
    let req = CompletionRequest {
      model: "m",
      prompt: "p",
      max_tokens: MAX_TOKENS,
      temperature: TEMPERATURE,
      top_p: TOP_P,
      stop: ["---", "\n\n\n"],
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["max_tokens"], 1000);
    assert_eq!(v["stop"][0], "---");
    assert_eq!(v["stop"][1], "\n\n\n");
  }

  #[test]
  fn trailing_slash_is_trimmed_from_endpoint() {
    let settings = LlmSettings { endpoint: "http://vllm:8000/".into(), ..LlmSettings::default() };
    let client = VllmClient::new(&settings).unwrap();
    assert_eq!(client.endpoint(), "http://vllm:8000");
    assert_eq!(client.model_name(), "openai/gpt-oss-20b");
  }
}
