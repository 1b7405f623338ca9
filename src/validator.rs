//! Three-stage quiz validation.
//!
//! - structure: blocking. Required fields, lengths, option set, answer format, markup.
//! - balance: advisory only. Option-length leakage, obvious keywords, complexity vs difficulty.
//! - content: mixed. Language ratio, safety and explanation overlap block; style checks warn.
//!
//! All three stages always run; a structural failure does not hide balance or
//! content findings.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::domain::{Difficulty, Quiz, QuizType};
use crate::util::{char_len, hangul_ratio, trunc_for_log};

#[derive(Clone, Debug)]
pub struct ValidationLimits {
  pub question: (usize, usize),
  pub option: (usize, usize),
  pub explanation: (usize, usize),
  pub option_length_std_dev: f64,
  pub hangul_ratio_min: f64,
}

impl Default for ValidationLimits {
  fn default() -> Self {
    Self {
      question: (50, 300),
      option: (5, 100),
      explanation: (100, 500),
      option_length_std_dev: 30.0,
      hangul_ratio_min: 0.5,
    }
  }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct StageResult {
  pub passed: bool,
  pub issues: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct ValidationBreakdown {
  pub structure: StageResult,
  pub balance: StageResult,
  pub content: StageResult,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
  pub is_valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
  pub breakdown: ValidationBreakdown,
}

/// Service names counted by the complexity heuristic (exact, case-sensitive).
pub const AWS_SERVICES: &[&str] = &[
  "EC2", "S3", "Lambda", "RDS", "Aurora", "EKS", "CloudFront", "Route53", "VPC", "DynamoDB",
  "ElastiCache", "CloudWatch", "Auto Scaling", "ECS", "Karpenter", "Bedrock", "SageMaker", "ALB",
  "ELB", "Redis", "MySQL", "PostgreSQL", "API Gateway", "SNS", "SQS", "Kinesis", "Glue", "Athena",
  "QuickSight",
];

const ADVANCED_KEYWORDS: &[&str] = &[
  "멀티리전", "Multi-Region", "고가용성", "HA", "장애 복구", "DR", "성능 최적화", "비용 최적화",
  "오토스케일링", "마이크로서비스", "MSA", "서버리스", "Serverless",
];

const CONDITIONAL_MARKERS: &[&str] = &["만약", "경우", "상황", "시나리오"];

const FORBIDDEN_WORDS: &[&str] = &[
  "씨발", "개새끼", "병신", "좆", "엿먹어", "지랄", "닥쳐", "꺼져", "염병", "미친",
];

const OBVIOUS_KEYWORDS: &[&str] = &[
  "항상", "절대", "무조건", "반드시", "절대로", "확실히", "100%", "모든", "전부",
];

const REASONING_MARKERS: &[&str] = &[
  "권장", "추천", "이유", "때문", "Best Practice", "성능", "확장성", "비용", "보안", "가용성",
];

const HARMFUL_CLUSTERS: &[&[&str]] = &[&["삭제", "제거", "파괴", "손상"], &["해킹", "크랙", "불법"]];

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
// Injection markers only; plain words such as "subscription" must pass.
static SCRIPT: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)<\s*script|javascript\s*:|\bon(?:error|click|load)\s*=").expect("valid regex"));

static PERSONAL_INFO: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  [
    r"\b[\w.-]+@[\w.-]+\.\w+\b",
    r"\b\d{3}-\d{3,4}-\d{4}\b",
    r"\b\d{6}-\d{7}\b",
    r"(?i)(?:비밀번호|password|passwd|token|secret|api[_-]?key)\s*[:=]\s*\S+",
  ]
  .iter()
  .map(|p| Regex::new(p).expect("valid regex"))
  .collect()
});

// (pattern, preferred spelling)
static TERMINOLOGY: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
  [
    (r"(?i)ec2 server|EC2 서버", "EC2 인스턴스"),
    (r"(?i)amazon aurora|아마존 aurora", "Aurora"),
    (r"aws rds|AWS RDS", "Amazon RDS 또는 RDS"),
    (r"(?i)람다 함수|lambda function", "Lambda 함수 또는 람다"),
  ]
  .iter()
  .map(|(p, fix)| (Regex::new(p).expect("valid regex"), *fix))
  .collect()
});

/// Stateless validator. Cheap to clone and share.
#[derive(Clone, Debug, Default)]
pub struct QuizValidator {
  limits: ValidationLimits,
}

impl QuizValidator {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_limits(limits: ValidationLimits) -> Self {
    Self { limits }
  }

  pub fn validate(&self, quiz: &Quiz) -> ValidationResult {
    let structure = self.validate_structure(quiz);
    let balance = self.validate_balance(quiz);
    let (blocking, advisory) = self.validate_content(quiz);

    let mut errors = structure.issues.clone();
    errors.extend(blocking.iter().cloned());
    let mut warnings = balance.issues.clone();
    warnings.extend(advisory.iter().cloned());

    let content = StageResult {
      passed: blocking.is_empty(),
      issues: blocking.into_iter().chain(advisory).collect(),
    };

    let is_valid = errors.is_empty();
    if is_valid {
      debug!(target: "quiz", quiz_type = %quiz.quiz_type, difficulty = %quiz.difficulty, question = %trunc_for_log(&quiz.question, 30), warnings = warnings.len(), "Quiz passed validation");
    } else {
      debug!(target: "quiz", quiz_type = %quiz.quiz_type, difficulty = %quiz.difficulty, errors = ?errors, "Quiz failed validation");
    }

    ValidationResult {
      is_valid,
      errors,
      warnings,
      breakdown: ValidationBreakdown { structure, balance, content },
    }
  }

  /// Structural checks. Most checks stop at the first failure; per-option
  /// length problems are collected together before the duplicate check.
  fn validate_structure(&self, quiz: &Quiz) -> StageResult {
    let issues = match self.structure_issues(quiz) {
      Ok(()) => Vec::new(),
      Err(issues) => issues,
    };
    StageResult { passed: issues.is_empty(), issues }
  }

  fn structure_issues(&self, quiz: &Quiz) -> Result<(), Vec<String>> {
    let fail = |msg: String| -> Result<(), Vec<String>> { Err(vec![msg]) };
    let l = &self.limits;

    let question = quiz.question.trim();
    if question.is_empty() {
      return fail("question is missing or blank".into());
    }
    let qlen = char_len(question);
    if qlen < l.question.0 || qlen > l.question.1 {
      return fail(format!(
        "question length out of range (current: {qlen} chars, allowed: {}-{})",
        l.question.0, l.question.1
      ));
    }
    if HTML_TAG.is_match(question) {
      return fail("question contains HTML tags".into());
    }
    if SCRIPT.is_match(question) {
      return fail("question contains script code".into());
    }

    match (quiz.quiz_type, &quiz.options) {
      (QuizType::MultipleChoice, None) => return fail("multiple-choice quiz has no options".into()),
      (QuizType::MultipleChoice, Some(options)) => {
        if options.len() != 4 {
          return fail(format!(
            "multiple-choice quiz needs exactly 4 options (current: {})",
            options.len()
          ));
        }
        let mut issues = Vec::new();
        for (i, opt) in options.iter().enumerate() {
          let opt = opt.trim();
          if opt.is_empty() {
            issues.push(format!("option {} is blank", i + 1));
            continue;
          }
          let len = char_len(opt);
          if len < l.option.0 || len > l.option.1 {
            issues.push(format!(
              "option {} length out of range (current: {len} chars, allowed: {}-{})",
              i + 1,
              l.option.0,
              l.option.1
            ));
          }
        }
        let unique: HashSet<&str> = options.iter().map(|o| o.trim()).collect();
        if unique.len() != options.len() {
          issues.push("duplicate options".into());
          return Err(issues);
        }
        if !issues.is_empty() {
          return Err(issues);
        }
      }
      (QuizType::Ox, Some(_)) => return fail("OX quiz must not carry options".into()),
      (QuizType::Ox, None) => {}
    }

    let answer = quiz.correct_answer.trim();
    if answer.is_empty() {
      return fail("correct answer is missing".into());
    }
    match quiz.quiz_type {
      QuizType::MultipleChoice if quiz.correct_index().is_none() => {
        return fail(format!("multiple-choice answer must be one of A, B, C, D (current: {answer})"));
      }
      QuizType::Ox if !matches!(answer.to_lowercase().as_str(), "true" | "false") => {
        return fail(format!("OX answer must be 'true' or 'false' (current: {answer})"));
      }
      _ => {}
    }

    let explanation = quiz.explanation.trim();
    if explanation.is_empty() {
      return fail("explanation is missing or blank".into());
    }
    let elen = char_len(explanation);
    if elen < l.explanation.0 || elen > l.explanation.1 {
      return fail(format!(
        "explanation length out of range (current: {elen} chars, allowed: {}-{})",
        l.explanation.0, l.explanation.1
      ));
    }
    if HTML_TAG.is_match(explanation) {
      return fail("explanation contains HTML tags".into());
    }
    if SCRIPT.is_match(explanation) {
      return fail("explanation contains script code".into());
    }
    Ok(())
  }

  /// Advisory checks; `passed` is always true.
  fn validate_balance(&self, quiz: &Quiz) -> StageResult {
    let mut issues = Vec::new();

    if let (QuizType::MultipleChoice, Some(options)) = (quiz.quiz_type, &quiz.options) {
      if !options.is_empty() {
        let lengths: Vec<f64> = options.iter().map(|o| char_len(o.trim()) as f64).collect();
        let n = lengths.len() as f64;
        let mean = lengths.iter().sum::<f64>() / n;
        let std_dev = (lengths.iter().map(|len| (len - mean).powi(2)).sum::<f64>() / n).sqrt();

        if std_dev > self.limits.option_length_std_dev {
          issues.push(format!(
            "option lengths vary too much (std dev {std_dev:.1}, allowed {:.0}); keep options similar in length",
            self.limits.option_length_std_dev
          ));
        }

        if let Some(ci) = quiz.correct_index().filter(|&i| i < options.len()) {
          let unique_longest = lengths.iter().enumerate().all(|(i, &len)| i == ci || len < lengths[ci]);
          if unique_longest && lengths[ci] > mean * 1.5 {
            issues.push("correct option is much longer than the others (answer may be obvious)".into());
          }

          let correct = &options[ci];
          let exclusive = OBVIOUS_KEYWORDS.iter().find(|kw| {
            correct.contains(**kw)
              && !options.iter().enumerate().any(|(i, o)| i != ci && o.contains(**kw))
          });
          if let Some(kw) = exclusive {
            issues.push(format!("only the correct option contains the absolutist keyword \"{kw}\""));
          }
        }
      }
    }

    if !quiz.question.trim().is_empty() {
      let complexity = assess_question_complexity(&quiz.question);
      let mismatch = match quiz.difficulty {
        Difficulty::Easy if complexity > 3 => {
          Some("question too complex for EASY (focus on basic service concepts)")
        }
        Difficulty::Medium if !(2..=6).contains(&complexity) => {
          Some("question complexity does not fit MEDIUM (focus on architecture decisions)")
        }
        Difficulty::Hard if complexity < 4 => {
          Some("question too simple for HARD (focus on advanced optimisation or multi-region)")
        }
        _ => None,
      };
      if let Some(msg) = mismatch {
        issues.push(format!("{msg}; complexity {complexity}/10"));
      }
    }

    StageResult { passed: true, issues }
  }

  /// Returns (blocking, advisory) content issues.
  fn validate_content(&self, quiz: &Quiz) -> (Vec<String>, Vec<String>) {
    let mut blocking = Vec::new();
    let mut advisory = Vec::new();

    let mut parts = vec![quiz.question.as_str(), quiz.explanation.as_str()];
    if let Some(options) = &quiz.options {
      parts.extend(options.iter().map(String::as_str));
    }
    let all_text = parts.join(" ");

    let ratio = hangul_ratio(&all_text);
    if ratio < self.limits.hangul_ratio_min {
      blocking.push(format!(
        "Korean text ratio too low (current: {:.1}%, minimum: {:.0}%)",
        ratio * 100.0,
        self.limits.hangul_ratio_min * 100.0
      ));
    }

    let question = quiz.question.trim();
    if !question.is_empty() && !question.ends_with('?') {
      advisory.push("question does not end with a question mark".into());
    }

    for (re, fix) in TERMINOLOGY.iter() {
      if re.is_match(&all_text) {
        advisory.push(format!("AWS terminology: prefer \"{fix}\""));
      }
    }

    let explanation = quiz.explanation.trim();
    if !question.is_empty() && !explanation.is_empty() {
      if explanation_overlap(question, explanation) > 0.8 {
        blocking.push("explanation mostly repeats the question (no educational value)".into());
      }
      if !REASONING_MARKERS.iter().any(|m| explanation.contains(m)) {
        advisory.push("explanation lacks reasoning, best practice or concept markers".into());
      }
    }

    for word in FORBIDDEN_WORDS {
      if all_text.contains(word) {
        blocking.push(format!("inappropriate word found: \"{word}\""));
      }
    }

    if PERSONAL_INFO.iter().any(|re| re.is_match(&all_text)) {
      blocking.push("text may contain personal information".into());
    }

    let harmful = HARMFUL_CLUSTERS
      .iter()
      .any(|cluster| cluster.iter().map(|w| all_text.matches(w).count()).sum::<usize>() > 2);
    if harmful {
      advisory.push("text may contain harmful instructions".into());
    }

    (blocking, advisory)
  }
}

/// Share of the question's distinct tokens (longer than two chars) that also
/// appear in the explanation.
fn explanation_overlap(question: &str, explanation: &str) -> f64 {
  let tokens = |s: &str| -> HashSet<String> {
    s.to_lowercase()
      .split_whitespace()
      .filter(|w| char_len(w) > 2)
      .map(str::to_string)
      .collect()
  };
  let q = tokens(question);
  if q.is_empty() {
    return 0.0;
  }
  let e = tokens(explanation);
  q.intersection(&e).count() as f64 / q.len() as f64
}

/// 0-10 complexity heuristic: service mentions, advanced concepts (x2), length
/// and conditional phrasing.
pub fn assess_question_complexity(question: &str) -> u32 {
  let services = AWS_SERVICES.iter().filter(|s| question.contains(**s)).count() as u32;
  let advanced = ADVANCED_KEYWORDS.iter().filter(|k| question.contains(**k)).count() as u32;
  let mut score = services + advanced * 2;

  let len = char_len(question);
  if len > 150 {
    score += 1;
  }
  if len > 200 {
    score += 1;
  }
  if CONDITIONAL_MARKERS.iter().any(|m| question.contains(m)) {
    score += 1;
  }
  score.min(10)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::QuizSource;
  use crate::seeds::seed_quizzes;

  fn quiz_with_question(q: &str) -> Quiz {
    let mut quiz = seed_quizzes()
      .into_iter()
      .find(|q| q.quiz_type == QuizType::MultipleChoice)
      .expect("seed multiple-choice quiz");
    quiz.question = q.to_string();
    quiz
  }

  #[test]
  fn seed_bank_is_valid() {
    let v = QuizValidator::new();
    for quiz in seed_quizzes() {
      let r = v.validate(&quiz);
      assert!(r.is_valid, "seed {} rejected: {:?}", quiz.question, r.errors);
      assert!(r.breakdown.balance.passed);
    }
  }

  #[test]
  fn question_length_boundary() {
    let v = QuizValidator::new();
    let body = "가".repeat(48);
    let q49 = format!("{body}?");
    assert_eq!(char_len(&q49), 49);
    let r = v.validate(&quiz_with_question(&q49));
    assert!(!r.breakdown.structure.passed);
    assert!(r.breakdown.structure.issues[0].contains("question length out of range"));

    let q50 = format!("{body}가?");
    let r = v.validate(&quiz_with_question(&q50));
    assert!(
      r.breakdown.structure.issues.iter().all(|i| !i.contains("question length")),
      "{:?}",
      r.breakdown.structure.issues
    );
  }

  #[test]
  fn multiple_choice_options_must_be_four_distinct_in_range() {
    let v = QuizValidator::new();
    let base = quiz_with_question(&seed_quizzes()[0].question);
    assert!(v.validate(&base).breakdown.structure.passed);

    let mut three = base.clone();
    three.options.as_mut().unwrap().pop();
    assert!(!v.validate(&three).breakdown.structure.passed);

    let mut dup = base.clone();
    let first = dup.options.as_ref().unwrap()[0].clone();
    dup.options.as_mut().unwrap()[1] = format!("  {first} ");
    let r = v.validate(&dup);
    assert!(r.breakdown.structure.issues.iter().any(|i| i.contains("duplicate")));

    let mut short = base.clone();
    short.options.as_mut().unwrap()[2] = "짧음".into();
    let r = v.validate(&short);
    assert!(!r.is_valid);
    assert!(r.errors.iter().any(|i| i.contains("option 3 length")));

    let mut bad_answer = base;
    bad_answer.correct_answer = "E".into();
    assert!(!v.validate(&bad_answer).breakdown.structure.passed);
  }

  #[test]
  fn ox_answer_is_case_insensitive_and_rejects_options() {
    let v = QuizValidator::new();
    let mut ox = seed_quizzes()
      .into_iter()
      .find(|q| q.quiz_type == QuizType::Ox)
      .expect("seed OX quiz");
    ox.correct_answer = "TRUE".into();
    assert!(v.validate(&ox).breakdown.structure.passed);

    ox.correct_answer = "yes".into();
    assert!(!v.validate(&ox).breakdown.structure.passed);

    ox.correct_answer = "false".into();
    ox.options = Some(vec!["a".into()]);
    assert!(!v.validate(&ox).breakdown.structure.passed);
  }

  #[test]
  fn markup_is_rejected() {
    let v = QuizValidator::new();
    let q = format!("{}<b>굵게</b>?", "가".repeat(50));
    let r = v.validate(&quiz_with_question(&q));
    assert_eq!(r.breakdown.structure.issues, vec!["question contains HTML tags".to_string()]);
  }

  #[test]
  fn stages_run_even_when_structure_fails() {
    let v = QuizValidator::new();
    let quiz = Quiz::new(QuizType::MultipleChoice, Difficulty::Easy, QuizSource::Llm)
      .with_question("short english question")
      .with_explanation("short");
    let r = v.validate(&quiz);
    assert!(!r.is_valid);
    assert!(!r.breakdown.structure.passed);
    assert!(!r.breakdown.content.passed, "Korean ratio should block");
    assert!(r.breakdown.balance.passed);
    assert!(r.warnings.iter().any(|w| w.contains("question mark")));
  }

  #[test]
  fn personal_info_and_forbidden_words_block() {
    let v = QuizValidator::new();
    let mut quiz = seed_quizzes().remove(0);
    quiz.explanation = format!("{} 문의는 admin@example.com 으로 보내세요.", quiz.explanation);
    let r = v.validate(&quiz);
    assert!(!r.breakdown.content.passed);
    assert!(r.errors.iter().any(|e| e.contains("personal information")));

    let mut quiz = seed_quizzes().remove(0);
    quiz.explanation = format!("{} 지랄", quiz.explanation);
    assert!(!v.validate(&quiz).is_valid);
  }

  #[test]
  fn balance_flags_are_advisory() {
    let v = QuizValidator::new();
    let mut quiz = seed_quizzes().remove(0);
    let ci = quiz.correct_index().unwrap();
    let opts = quiz.options.as_mut().unwrap();
    opts[ci] = format!("항상 {}", "매우 긴 정답 선택지 설명 ".repeat(6).trim());
    let r = v.validate(&quiz);
    assert!(r.breakdown.balance.passed);
    assert!(r.warnings.iter().any(|w| w.contains("much longer")));
    assert!(r.warnings.iter().any(|w| w.contains("\"항상\"")));
    assert!(r.errors.iter().all(|e| !e.contains("longer")));
  }

  #[test]
  fn complexity_heuristic_counts_and_caps() {
    assert_eq!(assess_question_complexity("EC2란 무엇인가요?"), 1);
    assert_eq!(assess_question_complexity("만약 EKS와 Aurora로 멀티리전 구성을 한다면?"), 5);
    let heavy = "EC2 S3 Lambda RDS Aurora EKS 멀티리전 고가용성 서버리스";
    assert_eq!(assess_question_complexity(heavy), 10);
  }

  fn easy_seed() -> Quiz {
    seed_quizzes().remove(0)
  }

  #[test]
  fn aws_words_containing_script_are_allowed() {
    let v = QuizValidator::new();
    let mut quiz = easy_seed();
    quiz.explanation = format!("{} 알림은 SNS 구독(subscription)으로 전달되며 TypeScript SDK로도 설정할 수 있습니다.", quiz.explanation);
    let r = v.validate(&quiz);
    assert!(r.is_valid, "{:?}", r.errors);
  }

  #[test]
  fn script_injection_is_rejected() {
    let v = QuizValidator::new();
    let mut quiz = easy_seed();
    quiz.question = quiz.question.replace("무엇인가요?", "javascript:alert(1) 무엇인가요?");
    let r = v.validate(&quiz);
    assert_eq!(r.breakdown.structure.issues, vec!["question contains script code".to_string()]);

    let mut quiz = easy_seed();
    quiz.explanation = format!("{} onerror=alert(1)", quiz.explanation);
    let r = v.validate(&quiz);
    assert!(!r.is_valid);
    assert!(r.errors.iter().any(|e| e == "explanation contains script code"));
  }

  #[test]
  fn explanation_repeating_the_question_blocks() {
    let v = QuizValidator::new();
    let mut quiz = easy_seed();
    quiz.explanation = format!("{} 이 문장은 질문을 거의 그대로 반복하고 있습니다.", quiz.question);
    let r = v.validate(&quiz);
    assert!(r.breakdown.structure.passed, "{:?}", r.breakdown.structure.issues);
    assert!(!r.is_valid);
    assert!(r.errors.iter().any(|e| e.contains("mostly repeats the question")));
  }

  #[test]
  fn phone_numbers_and_credentials_block() {
    let v = QuizValidator::new();
    for leak in ["담당자 연락처는 010-1234-5678 입니다.", "설정 값은 api_key=abcd1234efgh 입니다."] {
      let mut quiz = easy_seed();
      quiz.explanation = format!("{} {leak}", quiz.explanation);
      let r = v.validate(&quiz);
      assert!(!r.is_valid, "{leak}");
      assert!(r.errors.iter().any(|e| e.contains("personal information")), "{leak}");
    }
  }

  #[test]
  fn harmful_keyword_cluster_warns() {
    let v = QuizValidator::new();
    let mut quiz = easy_seed();
    quiz.explanation = format!("{} 데이터를 삭제하고 제거하고 파괴하는 절차입니다.", quiz.explanation);
    let r = v.validate(&quiz);
    assert!(r.is_valid, "{:?}", r.errors);
    assert!(r.warnings.iter().any(|w| w.contains("harmful instructions")));
  }

  #[test]
  fn uneven_option_lengths_warn() {
    let v = QuizValidator::new();
    let mut quiz = easy_seed();
    quiz.options = Some(vec![
      "첫번째 선택지".into(),
      "두번째 선택지".into(),
      "세번째 선택지".into(),
      "가".repeat(90),
    ]);
    quiz.correct_answer = "A".into();
    let r = v.validate(&quiz);
    assert!(r.is_valid, "{:?}", r.errors);
    assert!(r.warnings.iter().any(|w| w.contains("option lengths vary too much")));
  }

  #[test]
  fn complexity_mismatch_warns_for_declared_difficulty() {
    let v = QuizValidator::new();
    let mut easy = easy_seed();
    easy.question = "만약 EKS와 Aurora로 멀티리전 구성을 한다면 어떤 점을 고려해야 할까요?".into();
    let r = v.validate(&easy);
    assert!(r.breakdown.balance.passed);
    assert!(r.warnings.iter().any(|w| w.contains("too complex for EASY")));

    let mut hard = seed_quizzes()
      .into_iter()
      .find(|q| q.difficulty == Difficulty::Hard)
      .expect("seed HARD quiz");
    hard.question = "EC2란 무엇인가요?".into();
    let r = v.validate(&hard);
    assert!(r.warnings.iter().any(|w| w.contains("too simple for HARD")));
  }

  #[test]
  fn terminology_hints_are_advisory() {
    let v = QuizValidator::new();
    let mut quiz = easy_seed();
    quiz.explanation = format!("{} EC2 서버를 늘리는 것만으로는 부족합니다.", quiz.explanation);
    let r = v.validate(&quiz);
    assert!(r.is_valid, "{:?}", r.errors);
    assert!(r.warnings.iter().any(|w| w.contains("\"EC2 인스턴스\"")));
  }

  #[test]
  fn overlap_counts_question_tokens() {
    assert_eq!(explanation_overlap("abc def ghi", "ABC def xyz"), 2.0 / 3.0);
    assert_eq!(explanation_overlap("a b", "a b"), 0.0);
  }
}
