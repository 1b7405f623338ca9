//! Loading pipeline configuration (settings, prompts, fallback bank) from TOML
//! and environment variables.
//!
//! Precedence is defaults < TOML file (`QUIZ_CONFIG_PATH`) < environment.
//! A broken TOML file is logged and ignored; broken bank entries are skipped
//! one by one so a single typo doesn't cost the whole bank.

use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::{Difficulty, Quiz, QuizSource, QuizType};

#[derive(Clone, Debug)]
pub struct QuizConfig {
  pub pipeline: PipelineSettings,
  pub llm: LlmSettings,
  pub prompts: Prompts,
  pub quizzes: Vec<QuizCfg>,
  pub port: u16,
  /// Base URL of the reference-content service; `None` means static fallbacks only.
  pub docs_endpoint: Option<String>,
}

impl Default for QuizConfig {
  fn default() -> Self {
    Self {
      pipeline: PipelineSettings::default(),
      llm: LlmSettings::default(),
      prompts: Prompts::default(),
      quizzes: Vec::new(),
      port: 3000,
      docs_endpoint: None,
    }
  }
}

/// Knobs of the generate/validate/score/cache pipeline.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
  pub enabled: bool,
  pub pool_size: usize,
  pub refresh_threshold: usize,
  pub min_quality_score: u32,
  pub max_attempts: u32,
  pub warm_cache: bool,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      enabled: true,
      pool_size: 10,
      refresh_threshold: 5,
      min_quality_score: 60,
      max_attempts: 3,
      warm_cache: true,
    }
  }
}

/// OpenAI-compatible completion endpoint (vLLM in production).
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
  pub endpoint: String,
  pub model: String,
  pub timeout_ms: u64,
  pub max_retries: u32,
  pub api_key: Option<String>,
}

impl Default for LlmSettings {
  fn default() -> Self {
    Self {
      endpoint: "http://localhost:8000".into(),
      model: "openai/gpt-oss-20b".into(),
      timeout_ms: 3000,
      max_retries: 1,
      api_key: None,
    }
  }
}

/// Fallback-bank entry accepted in TOML (`[[quizzes]]`).
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizCfg {
  #[serde(default)] pub id: Option<Uuid>,
  #[serde(rename = "type")] pub quiz_type: QuizType,
  pub difficulty: Difficulty,
  pub question: String,
  #[serde(default)] pub options: Option<Vec<String>>,
  #[serde(alias = "answer")] pub correct_answer: String,
  pub explanation: String,
  #[serde(default)] pub infra_context: Vec<String>,
  #[serde(default)] pub source: Option<QuizSource>,
}

impl QuizCfg {
  pub fn into_quiz(self) -> Quiz {
    let mut quiz = Quiz::new(self.quiz_type, self.difficulty, self.source.unwrap_or(QuizSource::Fallback))
      .with_question(self.question)
      .with_answer(self.correct_answer)
      .with_explanation(self.explanation)
      .with_infra(self.infra_context);
    quiz.options = self.options;
    if let Some(id) = self.id {
      quiz.id = id;
    }
    quiz
  }
}

/// Prompt templates. `{system}`, `{difficulty}`, `{guide}`, `{infra}` and
/// `{reference}` are substituted at render time. Any field can be overridden
/// in the `[prompts]` table.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub multiple_choice_template: String,
  pub ox_template: String,
  pub easy_guide: String,
  pub medium_guide: String,
  pub hard_guide: String,
  pub reference_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "당신은 AWS 클라우드 아키텍처 교육 전문가입니다.
플레이어가 AWS 서비스와 인프라 설계를 학습할 수 있도록 퀴즈를 생성합니다.

퀴즈 생성 규칙:
1. 질문은 명확하고 구체적이어야 합니다 (50-300자)
2. 현재 게임의 인프라 컨텍스트와 관련성이 있어야 합니다
3. 해설은 \"왜 이것이 정답인지\" 교육적으로 설명해야 합니다 (100-500자)
4. 난이도에 맞는 문제를 생성해야 합니다:
   - EASY: 기본 개념, 서비스 정의 (턴 1-10)
   - MEDIUM: 서비스 비교, 적절한 선택 (턴 11-20)
   - HARD: 복잡한 시나리오, 아키텍처 설계 (턴 21-25)

4지선다 문제:
- 서로 겹치지 않는 4개의 선택지, 정답은 A, B, C, D 중 하나
- 오답도 그럴듯해야 합니다

OX 퀴즈:
- 참/거짓 판단이 명확한 문장, 정답은 'true' 또는 'false'

JSON 형식으로만 응답하세요 (다른 텍스트 없이).".into(),
      multiple_choice_template: "{system}

문제 유형: 4지선다 (Multiple Choice)
난이도: {difficulty}
{guide}
인프라 컨텍스트: {infra}

위 조건에 맞는 4지선다 퀴즈를 생성하세요.

응답 형식:
{
  \"question\": \"질문 내용 (50-300자)\",
  \"options\": [\"A 선택지\", \"B 선택지\", \"C 선택지\", \"D 선택지\"],
  \"correctAnswer\": \"A\",
  \"explanation\": \"정답 해설 (100-500자)\"
}".into(),
      ox_template: "{system}

문제 유형: OX 퀴즈 (True/False)
난이도: {difficulty}
{guide}
인프라 컨텍스트: {infra}

위 조건에 맞는 OX 퀴즈를 생성하세요.

응답 형식:
{
  \"question\": \"참/거짓 판단 문장 (50-300자)\",
  \"correctAnswer\": \"true\",
  \"explanation\": \"정답 해설 (100-500자)\"
}".into(),
      easy_guide: "- 기본 개념 중심 (예: EC2란 무엇인가?)
- 단순 정의나 특징 묻기
- 턴 1-10에 적합한 초기 단계 지식".into(),
      medium_guide: "- 서비스 비교/선택 중심 (예: Aurora vs RDS)
- 상황에 맞는 적절한 선택
- 턴 11-20에 적합한 성장 단계 지식".into(),
      hard_guide: "- 복잡한 아키텍처 설계 (예: Multi-region DR)
- 트레이드오프 이해 필요
- 턴 21-25에 적합한 고급 지식".into(),
      reference_template: "참고 자료 (AWS 공식 문서 요약, 사실 확인용):
{reference}".into(),
    }
  }
}

/// Load configuration: defaults, then the TOML file named by QUIZ_CONFIG_PATH
/// (if any), then environment overrides.
pub fn load_config_from_env() -> QuizConfig {
  let mut cfg = match std::env::var("QUIZ_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match parse_toml(&s) {
        Ok(cfg) => {
          info!(target: "infraquiz", %path, bank = cfg.quizzes.len(), "Loaded quiz config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "infraquiz", %path, error = %e, "Failed to parse TOML config; using defaults");
          QuizConfig::default()
        }
      },
      Err(e) => {
        error!(target: "infraquiz", %path, error = %e, "Failed to read TOML config file; using defaults");
        QuizConfig::default()
      }
    },
    Err(_) => QuizConfig::default(),
  };
  cfg.apply_env(|k| std::env::var(k).ok());
  cfg
}

/// Parse a TOML document. Section-level type errors fail the whole file; bank
/// entries are checked individually and skipped when malformed.
pub fn parse_toml(s: &str) -> Result<QuizConfig, String> {
  let doc: toml::Table = toml::from_str(s).map_err(|e| e.to_string())?;
  let mut cfg = QuizConfig::default();

  if let Some(v) = doc.get("pipeline") {
    cfg.pipeline = v.clone().try_into().map_err(|e| format!("[pipeline]: {e}"))?;
  }
  if let Some(v) = doc.get("llm") {
    cfg.llm = v.clone().try_into().map_err(|e| format!("[llm]: {e}"))?;
  }
  if let Some(v) = doc.get("prompts") {
    cfg.prompts = v.clone().try_into().map_err(|e| format!("[prompts]: {e}"))?;
  }
  if let Some(port) = doc.get("port").and_then(|v| v.as_integer()) {
    cfg.port = u16::try_from(port).map_err(|e| format!("port: {e}"))?;
  }
  if let Some(url) = doc.get("docs_endpoint").and_then(|v| v.as_str()) {
    cfg.docs_endpoint = Some(url.to_string());
  }

  if let Some(items) = doc.get("quizzes").and_then(|v| v.as_array()) {
    for (idx, item) in items.iter().enumerate() {
      match item.clone().try_into::<QuizCfg>() {
        Ok(q) => cfg.quizzes.push(q),
        Err(e) => warn!(target: "infraquiz", idx, error = %e, "Skipping malformed bank quiz"),
      }
    }
  }
  Ok(cfg)
}

impl QuizConfig {
  /// Apply environment overrides through `lookup`. Unparseable values are
  /// logged and the previous value kept.
  pub fn apply_env<F>(&mut self, lookup: F)
  where
    F: Fn(&str) -> Option<String>,
  {
    fn set<T: std::str::FromStr>(slot: &mut T, key: &str, raw: Option<String>) {
      if let Some(raw) = raw {
        match raw.trim().parse::<T>() {
          Ok(v) => *slot = v,
          Err(_) => warn!(target: "infraquiz", key, value = %raw, "Ignoring unparseable env override"),
        }
      }
    }

    let p = &mut self.pipeline;
    set(&mut p.enabled, "LLM_QUIZ_ENABLED", lookup("LLM_QUIZ_ENABLED"));
    set(&mut p.pool_size, "QUIZ_CACHE_POOL_SIZE", lookup("QUIZ_CACHE_POOL_SIZE"));
    set(&mut p.refresh_threshold, "QUIZ_CACHE_REFRESH_THRESHOLD", lookup("QUIZ_CACHE_REFRESH_THRESHOLD"));
    set(&mut p.min_quality_score, "QUIZ_CACHE_MIN_QUALITY", lookup("QUIZ_CACHE_MIN_QUALITY"));
    set(&mut p.max_attempts, "QUIZ_MAX_ATTEMPTS", lookup("QUIZ_MAX_ATTEMPTS"));
    set(&mut p.warm_cache, "QUIZ_CACHE_WARM", lookup("QUIZ_CACHE_WARM"));

    let l = &mut self.llm;
    set(&mut l.endpoint, "VLLM_ENDPOINT", lookup("VLLM_ENDPOINT"));
    set(&mut l.model, "VLLM_MODEL_NAME", lookup("VLLM_MODEL_NAME"));
    set(&mut l.timeout_ms, "VLLM_TIMEOUT_MS", lookup("VLLM_TIMEOUT_MS"));
    set(&mut l.max_retries, "VLLM_MAX_RETRIES", lookup("VLLM_MAX_RETRIES"));
    if let Some(key) = lookup("VLLM_API_KEY").filter(|k| !k.trim().is_empty()) {
      l.api_key = Some(key);
    }

    set(&mut self.port, "PORT", lookup("PORT"));
    if let Some(url) = lookup("DOCS_ENDPOINT").filter(|u| !u.trim().is_empty()) {
      self.docs_endpoint = Some(url);
    }
  }
}
