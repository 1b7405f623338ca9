//! Domain models used by the pipeline: quiz kinds, difficulty bands, provenance,
//! the quiz entity itself and the raw shape a model is asked to return.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// What kind of question is presented to the player?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizType {
  /// Four options, answer is one of A/B/C/D.
  MultipleChoice,
  /// True/false statement, answer is "true" or "false".
  Ox,
}

impl QuizType {
  pub fn as_str(&self) -> &'static str {
    match self {
      QuizType::MultipleChoice => "MULTIPLE_CHOICE",
      QuizType::Ox => "OX",
    }
  }
}

impl fmt::Display for QuizType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
  Easy,
  Medium,
  Hard,
}

impl Difficulty {
  pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "EASY",
      Difficulty::Medium => "MEDIUM",
      Difficulty::Hard => "HARD",
    }
  }

  pub(crate) fn index(&self) -> usize {
    match self {
      Difficulty::Easy => 0,
      Difficulty::Medium => 1,
      Difficulty::Hard => 2,
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Difficulty {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_uppercase().as_str() {
      "EASY" => Ok(Difficulty::Easy),
      "MEDIUM" => Ok(Difficulty::Medium),
      "HARD" => Ok(Difficulty::Hard),
      other => Err(format!("unknown difficulty '{other}' (expected EASY, MEDIUM or HARD)")),
    }
  }
}

/// Where did the quiz come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuizSource {
  Llm,      // generated and accepted by the pipeline
  Fallback, // curated bank served when generation is exhausted
  Manual,   // hand-written, never served as fallback
}

/// Quiz entity, either a freshly generated candidate or a persisted row.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
  #[serde(rename = "quizId")]
  pub id: Uuid,
  #[serde(rename = "type")]
  pub quiz_type: QuizType,
  pub difficulty: Difficulty,
  pub question: String,
  /// Exactly four entries for multiple choice, `None` for OX.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<Vec<String>>,
  pub correct_answer: String,
  pub explanation: String,
  #[serde(default)]
  pub infra_context: Vec<String>,
  #[serde(default)]
  pub turn_range_start: Option<u32>,
  #[serde(default)]
  pub turn_range_end: Option<u32>,
  pub source: QuizSource,
  #[serde(default)]
  pub quality_score: Option<u32>,
  #[serde(default)]
  pub usage_count: u32,
  #[serde(default)]
  pub correct_answer_count: u32,
  #[serde(default)]
  pub total_answer_count: u32,
  #[serde(default = "default_active")]
  pub is_active: bool,
  #[serde(default = "Utc::now")]
  pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
  true
}

impl Quiz {
  /// Blank quiz of the given kind; fill in content with the `with_*` builders.
  pub fn new(quiz_type: QuizType, difficulty: Difficulty, source: QuizSource) -> Self {
    let (start, end) = crate::prompt::turn_range(difficulty);
    Self {
      id: Uuid::new_v4(),
      quiz_type,
      difficulty,
      question: String::new(),
      options: None,
      correct_answer: String::new(),
      explanation: String::new(),
      infra_context: Vec::new(),
      turn_range_start: Some(start),
      turn_range_end: Some(end),
      source,
      quality_score: None,
      usage_count: 0,
      correct_answer_count: 0,
      total_answer_count: 0,
      is_active: true,
      created_at: Utc::now(),
    }
  }

  pub fn with_question(mut self, question: impl Into<String>) -> Self {
    self.question = question.into();
    self
  }

  pub fn with_options<I, S>(mut self, options: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.options = Some(options.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
    self.correct_answer = answer.into();
    self
  }

  pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
    self.explanation = explanation.into();
    self
  }

  pub fn with_infra<I, S>(mut self, infra: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.infra_context = infra.into_iter().map(Into::into).collect();
    self
  }

  /// Build an entity from parsed model output. Text is trimmed, the answer is
  /// normalised per type (A-D upper case, true/false lower case) and options are
  /// dropped for OX.
  pub fn from_generated(
    raw: GeneratedQuiz,
    quiz_type: QuizType,
    difficulty: Difficulty,
    infra_context: &[String],
  ) -> Self {
    let answer = raw.correct_answer.trim();
    let answer = match quiz_type {
      QuizType::MultipleChoice => answer.to_uppercase(),
      QuizType::Ox => answer.to_lowercase(),
    };
    let options = match quiz_type {
      QuizType::MultipleChoice => raw
        .options
        .map(|opts| opts.into_iter().map(|o| o.trim().to_string()).collect()),
      QuizType::Ox => None,
    };

    let mut quiz = Quiz::new(quiz_type, difficulty, QuizSource::Llm)
      .with_question(raw.question.trim())
      .with_answer(answer)
      .with_explanation(raw.explanation.trim())
      .with_infra(infra_context.iter().cloned());
    quiz.options = options;
    quiz
  }

  /// Index of the correct option (A=0 .. D=3) for multiple choice.
  pub fn correct_index(&self) -> Option<usize> {
    match self.correct_answer.trim().to_ascii_uppercase().as_str() {
      "A" => Some(0),
      "B" => Some(1),
      "C" => Some(2),
      "D" => Some(3),
      _ => None,
    }
  }

  pub fn accuracy_rate(&self) -> f64 {
    accuracy_rate(self.correct_answer_count, self.total_answer_count)
  }
}

/// Percentage of correct answers (0-100). Zero answers yields 0.
pub fn accuracy_rate(correct: u32, total: u32) -> f64 {
  if total == 0 {
    return 0.0;
  }
  correct as f64 / total as f64 * 100.0
}

/// Answers a quiz needs before its accuracy is judged.
pub const MIN_ANSWERS_FOR_FLAG: u32 = 10;

/// How players actually fare on a quiz.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFlag {
  TooEasy,
  TooHard,
  Balanced,
  InsufficientData,
}

impl QualityFlag {
  /// At least 85% correct is too easy, at most 25% too hard.
  pub fn classify(correct: u32, total: u32) -> Self {
    if total < MIN_ANSWERS_FOR_FLAG {
      return QualityFlag::InsufficientData;
    }
    let rate = accuracy_rate(correct, total);
    if rate >= 85.0 {
      QualityFlag::TooEasy
    } else if rate <= 25.0 {
      QualityFlag::TooHard
    } else {
      QualityFlag::Balanced
    }
  }
}

/// JSON object a model is asked to return. Missing fields deserialize as empty
/// so that the validator, not the parser, reports them.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuiz {
  #[serde(default)]
  pub question: String,
  #[serde(default)]
  pub options: Option<Vec<String>>,
  #[serde(default, alias = "correct_answer", alias = "answer", deserialize_with = "answer_text")]
  pub correct_answer: String,
  #[serde(default)]
  pub explanation: String,
}

// Models sometimes emit `true` instead of "true" for OX answers.
fn answer_text<'de, D>(de: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Answer {
    Text(String),
    Flag(bool),
  }
  Ok(match Answer::deserialize(de)? {
    Answer::Text(s) => s,
    Answer::Flag(b) => b.to_string(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn difficulty_parses_case_insensitively() {
    assert_eq!("easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
    assert_eq!(" Hard ".parse::<Difficulty>().unwrap(), Difficulty::Hard);
    assert!("legendary".parse::<Difficulty>().is_err());
  }

  #[test]
  fn quality_flag_bands() {
    assert_eq!(QualityFlag::classify(9, 9), QualityFlag::InsufficientData);
    assert_eq!(QualityFlag::classify(0, 0), QualityFlag::InsufficientData);
    assert_eq!(QualityFlag::classify(10, 10), QualityFlag::TooEasy);
    assert_eq!(QualityFlag::classify(17, 20), QualityFlag::TooEasy);
    assert_eq!(QualityFlag::classify(16, 20), QualityFlag::Balanced);
    assert_eq!(QualityFlag::classify(6, 20), QualityFlag::Balanced);
    assert_eq!(QualityFlag::classify(5, 20), QualityFlag::TooHard);
    assert_eq!(QualityFlag::classify(0, 10), QualityFlag::TooHard);
  }

  #[test]
  fn accuracy_rate_handles_zero_total() {
    assert_eq!(accuracy_rate(0, 0), 0.0);
    assert_eq!(accuracy_rate(3, 4), 75.0);
  }

  #[test]
  fn generated_ox_answer_accepts_bool_and_drops_options() {
    let raw: GeneratedQuiz = serde_json::from_str(
      r#"{"question":" q ","options":["a","b"],"correctAnswer":true,"explanation":"e"}"#,
    )
    .unwrap();
    let quiz = Quiz::from_generated(raw, QuizType::Ox, Difficulty::Easy, &["EC2".to_string()]);
    assert_eq!(quiz.correct_answer, "true");
    assert_eq!(quiz.question, "q");
    assert!(quiz.options.is_none());
    assert_eq!(quiz.source, QuizSource::Llm);
    assert_eq!(quiz.turn_range_start, Some(1));
  }

  #[test]
  fn quiz_serializes_with_wire_names() {
    let quiz = Quiz::new(QuizType::MultipleChoice, Difficulty::Medium, QuizSource::Fallback)
      .with_answer("c");
    let v = serde_json::to_value(&quiz).unwrap();
    assert_eq!(v["type"], "MULTIPLE_CHOICE");
    assert_eq!(v["difficulty"], "MEDIUM");
    assert_eq!(v["source"], "FALLBACK");
    assert!(v.get("quizId").is_some());
    assert_eq!(quiz.correct_index(), Some(2));
  }
}
