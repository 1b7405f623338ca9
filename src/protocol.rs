//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and game client independently.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Difficulty, Quiz, QuizSource, QuizType};
use crate::metrics::MetricsSnapshot;
use crate::reference::ReferenceMetrics;
use crate::scorer::QualityScore;
use crate::validator::ValidationResult;

/// Quiz as shown to a player: no answer, no explanation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOut {
    pub quiz_id: Uuid,
    #[serde(rename = "type")]
    pub quiz_type: QuizType,
    pub difficulty: Difficulty,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub infra_context: Vec<String>,
    pub source: QuizSource,
    pub quality_score: Option<u32>,
}

/// Convert full `Quiz` (internal) to the public DTO.
pub fn to_out(q: &Quiz) -> QuizOut {
    QuizOut {
        quiz_id: q.id,
        quiz_type: q.quiz_type,
        difficulty: q.difficulty,
        question: q.question.clone(),
        options: q.options.clone(),
        infra_context: q.infra_context.clone(),
        source: q.source,
        quality_score: q.quality_score,
    }
}

//
// HTTP request/response DTOs
//

/// `GET /api/v1/quiz?difficulty=EASY&infra=EC2,ALB&turn=7&exclude=<id>,<id>`
#[derive(Debug, Default, Deserialize)]
pub struct QuizQuery {
    pub difficulty: Option<String>,
    pub infra: Option<String>,
    pub turn: Option<u32>,
    pub exclude: Option<String>,
}

/// Split a comma-separated query value, dropping blanks.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerIn {
    pub quiz_id: Uuid,
    pub answer: String,
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub correct: bool,
    pub correct_answer: String,
    pub explanation: String,
    pub accuracy_rate: f64,
}

/// Candidate submitted for scoring; nothing is stored.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIn {
    #[serde(rename = "type")]
    pub quiz_type: QuizType,
    pub difficulty: Difficulty,
    pub question: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(alias = "answer")]
    pub correct_answer: String,
    pub explanation: String,
    #[serde(default)]
    pub infra_context: Vec<String>,
}

impl QualityIn {
    pub fn into_quiz(self) -> Quiz {
        let mut quiz = Quiz::new(self.quiz_type, self.difficulty, QuizSource::Manual)
            .with_question(self.question)
            .with_answer(self.correct_answer)
            .with_explanation(self.explanation)
            .with_infra(self.infra_context);
        quiz.options = self.options;
        quiz
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityOut {
    pub validation: ValidationResult,
    pub quality: QualityScore,
    pub grade: &'static str,
    pub report: String,
}

#[derive(Serialize)]
pub struct MetricsOut {
    pub generation: MetricsSnapshot,
    pub reference: ReferenceMetrics,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthOut {
    pub ok: bool,
    pub generation_enabled: bool,
    pub model: String,
    /// Only probed while generation is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_reachable: Option<bool>,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: &'static str,
    pub message: String,
}
