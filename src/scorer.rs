//! Four-dimension quality scoring (clarity, relevance, difficulty, educational).
//!
//! Each dimension is 0-25 and built from weighted keyword/length heuristics;
//! the total is their sum. Scoring is a pure function of the quiz and the
//! requested infra context, so identical input always scores identically.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::domain::{Difficulty, Quiz, QuizType};
use crate::util::{char_len, normalize_tags, trunc_for_log};

/// Minimum total for `QualityScore::passed`.
pub const PASSING_SCORE: u32 = 60;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubScore {
  pub score: u32,
  pub max_score: u32,
  pub details: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct QualityScore {
  pub clarity: u32,
  pub relevance: u32,
  pub difficulty: u32,
  pub educational: u32,
  pub total: u32,
  pub breakdown: BTreeMap<&'static str, SubScore>,
  pub passed: bool,
  pub suggestions: Vec<String>,
}

impl QualityScore {
  /// Letter grade: S >= 90, A >= 80, B >= 70, C >= 60, else D.
  pub fn grade(&self) -> &'static str {
    match self.total {
      90.. => "S",
      80.. => "A",
      70.. => "B",
      60.. => "C",
      _ => "D",
    }
  }

  fn sub(&self, key: &str) -> u32 {
    self.breakdown.get(key).map(|s| s.score).unwrap_or(0)
  }
}

static AWS_SERVICE_NAMES: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?i)EC2|S3|Lambda|RDS|Aurora|EKS|CloudFront|Route53|VPC|DynamoDB|ElastiCache|ALB|NLB|CloudWatch|IAM|KMS|SNS|SQS|ECS|Fargate|Kinesis|Glue|Athena|QuickSight|Bedrock|SageMaker|Karpenter|EBS|EFS|FSx",
  )
  .expect("valid regex")
});
static EXCESSIVE_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[!?]{2,}").expect("valid regex"));
static QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)[0-9]+\s*(GB|TB|Mbps|Gbps|ms|초|분|개|대|%)").expect("valid regex")
});

const AMBIGUOUS_WORDS: &[&str] = &["보통", "일반적으로", "대부분", "어느 정도", "아마도", "가능하면"];
const INCORRECT_TERMS: &[&str] = &[
  "AWS Lambda Function", "EC2 Instance Server", "RDS Database Server", "S3 Storage Bucket",
];
const PRACTICAL_KEYWORDS: &[&str] = &[
  "스타트업", "서비스", "사용자", "고객", "트래픽", "장애", "비용", "성능", "확장", "운영", "배포",
  "모니터링", "최적화",
];
const ACADEMIC_KEYWORDS: &[&str] = &["정의", "개념", "이론", "원리", "역사"];
const COMPARISON_MARKERS: &[&str] = &["그리고", "또는", "동시에", "반면", "비교", "차이", "장단점"];
const ADVANCED_SERVICES: &[&str] = &[
  "EKS", "Karpenter", "Aurora Global", "Bedrock", "SageMaker", "QuickSight", "Glue",
];
const ARCHITECTURE_CONCEPTS: &[&str] = &[
  "Multi-AZ", "Multi-Region", "Auto Scaling", "로드밸런싱", "캐싱", "CDN", "DR", "장애조치", "복제",
];
const BASIC_CONCEPTS: &[&str] = &["생성", "시작", "중지", "삭제", "저장", "업로드", "다운로드"];
const ADVANCED_CONCEPTS: &[&str] = &[
  "최적화", "확장", "복제", "장애조치", "다중화", "캐싱", "모니터링", "자동화",
];
const WEAK_DISTRACTOR_MARKERS: &[&str] = &["없음", "전혀", "절대", "모름", "알 수 없음"];
const BEST_PRACTICES: &[&str] = &[
  "베스트 프랙티스", "권장", "최적화", "효율", "보안", "안정성", "확장성", "가용성", "비용 절감",
  "성능 향상",
];
const IMPORTANT_CONCEPTS: &[&str] = &[
  "Auto Scaling", "Load Balancing", "다중 AZ", "Multi-Region", "캐싱", "CDN", "백업", "복구",
  "모니터링", "암호화",
];
const TRIVIA_MARKERS: &[&str] = &["몇", "언제", "누가", "어디"];
const REASONING_MARKERS: &[&str] = &["왜냐하면", "때문에", "이유는", "따라서", "그래서", "그러므로"];
const CONTEXT_MARKERS: &[&str] = &["경우", "상황", "시나리오", "예를 들어"];
const ACTION_KEYWORDS: &[&str] = &[
  "설정", "구성", "활성화", "배포", "적용", "선택", "사용", "구현", "마이그레이션", "전환", "변경",
];
const GAME_RELEVANT: &[&str] = &["인프라", "비용", "성능", "확장", "장애", "트래픽", "사용자"];

fn count_in(text: &str, words: &[&str]) -> usize {
  words.iter().filter(|w| text.contains(**w)).count()
}

fn any_in(text: &str, words: &[&str]) -> bool {
  words.iter().any(|w| text.contains(w))
}

// One dimension: named sub-scores summed and clamped to 0-25.
struct Dimension {
  parts: Vec<(&'static str, SubScore)>,
}

impl Dimension {
  fn new() -> Self {
    Self { parts: Vec::with_capacity(3) }
  }

  fn add(&mut self, key: &'static str, score: u32, max_score: u32, details: impl Into<String>) {
    self.parts.push((key, SubScore { score, max_score, details: details.into() }));
  }

  fn total(&self) -> u32 {
    self.parts.iter().map(|(_, s)| s.score).sum::<u32>().min(25)
  }
}

/// Stateless scorer.
#[derive(Clone, Debug, Default)]
pub struct QualityScorer;

impl QualityScorer {
  pub fn new() -> Self {
    Self
  }

  /// Score a quiz. `infra_context` is the caller's current infra; an empty
  /// slice means "not provided".
  pub fn score(&self, quiz: &Quiz, infra_context: &[String]) -> QualityScore {
    let clarity = self.score_clarity(quiz);
    let relevance = self.score_relevance(quiz, infra_context);
    let (difficulty, _) = self.score_difficulty(quiz);
    let educational = self.score_educational(quiz);

    let (c, r, d, e) = (clarity.total(), relevance.total(), difficulty.total(), educational.total());
    let total = c + r + d + e;

    let breakdown: BTreeMap<&'static str, SubScore> = [clarity, relevance, difficulty, educational]
      .into_iter()
      .flat_map(|dim| dim.parts)
      .collect();

    let mut score = QualityScore {
      clarity: c,
      relevance: r,
      difficulty: d,
      educational: e,
      total,
      breakdown,
      passed: total >= PASSING_SCORE,
      suggestions: Vec::new(),
    };
    score.suggestions = suggestions(quiz, &score);

    debug!(
      target: "quiz",
      question = %trunc_for_log(&quiz.question, 50),
      total, clarity = c, relevance = r, difficulty = d, educational = e,
      "Quality scored"
    );
    score
  }

  fn score_clarity(&self, quiz: &Quiz) -> Dimension {
    let mut dim = Dimension::new();
    let qlen = char_len(&quiz.question);

    let (score, details) = if qlen < 20 {
      (3, "question far too short")
    } else if qlen < 40 {
      (6, "question short, somewhat unclear")
    } else if qlen > 300 {
      (7, "question too long to read comfortably")
    } else if any_in(&quiz.question, AMBIGUOUS_WORDS) {
      (7, "question uses vague wording")
    } else {
      (10, "clear and specific question")
    };
    dim.add("questionClarity", score, 10, details);

    let (score, details) = match (quiz.quiz_type, &quiz.options) {
      (QuizType::Ox, _) => (10, "OX quiz (options not scored)"),
      (QuizType::MultipleChoice, None) => (0, "not enough options"),
      (QuizType::MultipleChoice, Some(opts)) if opts.len() < 2 => (0, "not enough options"),
      (QuizType::MultipleChoice, Some(opts)) if opts.len() < 4 => (5, "fewer than four options"),
      (QuizType::MultipleChoice, Some(opts)) => {
        let unique: HashSet<String> = opts.iter().map(|o| o.trim().to_lowercase()).collect();
        let lengths: Vec<f64> = opts.iter().map(|o| char_len(o) as f64).collect();
        let mean = lengths.iter().sum::<f64>() / lengths.len() as f64;
        let max_dev = lengths.iter().map(|l| (l - mean).abs()).fold(0.0, f64::max);
        if unique.len() < opts.len() {
          (3, "duplicate or near-identical options")
        } else if max_dev > mean * 0.8 {
          (7, "option lengths unbalanced (may leak the answer)")
        } else if opts.iter().any(|o| char_len(o) < 3) {
          (6, "some options are too short")
        } else {
          (10, "options clear and balanced")
        }
      }
    };
    dim.add("optionClarity", score, 10, details);

    let (score, details) = if has_repeated_word(&quiz.question) {
      (2, "repeated word")
    } else if EXCESSIVE_PUNCTUATION.is_match(&quiz.question) {
      (3, "excessive punctuation")
    } else if qlen < 30 {
      (3, "question is simplistic")
    } else {
      (5, "grammatical and professional")
    };
    dim.add("languageQuality", score, 5, details);
    dim
  }

  fn score_relevance(&self, quiz: &Quiz, infra_context: &[String]) -> Dimension {
    let mut dim = Dimension::new();

    let quiz_infra = normalize_tags(&quiz.infra_context);
    let request = normalize_tags(infra_context);
    let (score, details) = if !request.is_empty() {
      let request: HashSet<&String> = request.iter().collect();
      let shared: Vec<&str> = quiz_infra.iter().filter(|t| request.contains(t)).map(String::as_str).collect();
      if shared.is_empty() {
        (3, "unrelated to current infra (generic question)".to_string())
      } else if shared.len() == quiz_infra.len() {
        (10, format!("directly about current infra ({})", shared.join(", ")))
      } else {
        (7, format!("partly about current infra ({})", shared.join(", ")))
      }
    } else if quiz_infra.is_empty() {
      (5, "no infra context".to_string())
    } else {
      (7, format!("infra related ({})", quiz_infra.join(", ")))
    };
    dim.add("infraContextMatch", score, 10, details);

    let options = quiz.options.as_ref().map(|o| o.join(" ")).unwrap_or_default();
    let all_text = format!("{} {} {}", quiz.question, options, quiz.explanation);
    let services: HashSet<String> =
      AWS_SERVICE_NAMES.find_iter(&all_text).map(|m| m.as_str().to_uppercase()).collect();
    let (score, details) = if any_in(&all_text, INCORRECT_TERMS) {
      (4, "incorrect AWS terminology".to_string())
    } else if services.is_empty() {
      (3, "no AWS service mentioned".to_string())
    } else if services.len() >= 3 {
      (10, format!("mentions {} AWS services", services.len()))
    } else {
      (7, format!("mentions {} AWS service(s)", services.len()))
    };
    dim.add("awsAccuracy", score, 10, details);

    let practical = count_in(&all_text, PRACTICAL_KEYWORDS);
    let (score, details) = if practical == 0 || any_in(&quiz.question, ACADEMIC_KEYWORDS) {
      (1, "academic or theoretical")
    } else if practical >= 3 {
      (5, "grounded in a practical scenario")
    } else {
      (3, "some practical elements")
    };
    dim.add("practicalApplicability", score, 5, details);
    dim
  }

  /// Returns the dimension and the raw 0-10 complexity used for alignment.
  fn score_difficulty(&self, quiz: &Quiz) -> (Dimension, u32) {
    let mut dim = Dimension::new();
    let options = quiz.options.as_ref().map(|o| o.join(" ")).unwrap_or_default();
    let all_text = format!("{} {}", quiz.question, options);

    let mut complexity = 0u32;
    if any_in(&all_text, COMPARISON_MARKERS) {
      complexity += 2;
    }
    if QUANTITY.is_match(&all_text) {
      complexity += 2;
    }
    if any_in(&all_text, ADVANCED_SERVICES) {
      complexity += 3;
    }
    if any_in(&all_text, ARCHITECTURE_CONCEPTS) {
      complexity += 2;
    }
    if char_len(&quiz.question) > 150 {
      complexity += 1;
    }

    let expected = expected_complexity(quiz.difficulty);
    let deviation = complexity.abs_diff(expected);
    let score = match deviation {
      0..=1 => 15,
      2 => 12,
      3..=4 => 8,
      _ => 4,
    };
    dim.add(
      "difficultyAlignment",
      score,
      15,
      format!("complexity {complexity}/10, expected {expected} (deviation {deviation})"),
    );

    let basic = any_in(&all_text, BASIC_CONCEPTS);
    let advanced = any_in(&all_text, ADVANCED_CONCEPTS);
    let (score, details) = match quiz.difficulty {
      Difficulty::Easy if basic && !advanced => (5, "basic concepts fit EASY"),
      Difficulty::Easy if advanced => (2, "too advanced for EASY"),
      Difficulty::Easy => (3, "adequate for EASY"),
      Difficulty::Medium if advanced => (5, "intermediate concepts fit MEDIUM"),
      Difficulty::Medium if basic => (3, "somewhat easy for MEDIUM"),
      Difficulty::Medium => (4, "adequate for MEDIUM"),
      Difficulty::Hard if advanced && complexity >= 7 => (5, "advanced knowledge fits HARD"),
      Difficulty::Hard => (2, "not deep enough for HARD"),
    };
    dim.add("knowledgeRequirement", score, 5, details);

    let (score, details) = match (quiz.quiz_type, &quiz.options) {
      (QuizType::Ox, _) => (5, "OX quiz (distractors not scored)"),
      (QuizType::MultipleChoice, Some(opts)) if opts.len() >= 4 => match quiz.correct_index() {
        None => (0, "correct answer index unknown"),
        Some(ci) => {
          let weak = opts
            .iter()
            .enumerate()
            .filter(|(i, o)| *i != ci && (char_len(o) < 5 || any_in(o, WEAK_DISTRACTOR_MARKERS)))
            .count();
          match weak {
            0 => (5, "all distractors plausible"),
            1 => (3, "one distractor obviously wrong"),
            _ => (1, "several distractors obviously wrong"),
          }
        }
      },
      (QuizType::MultipleChoice, _) => (0, "not enough options"),
    };
    dim.add("distractorQuality", score, 5, details);
    (dim, complexity)
  }

  fn score_educational(&self, quiz: &Quiz) -> Dimension {
    let mut dim = Dimension::new();
    let all_text = format!("{} {}", quiz.question, quiz.explanation);

    let best = count_in(&all_text, BEST_PRACTICES);
    let concepts = count_in(&all_text, IMPORTANT_CONCEPTS);
    let (score, details) = if concepts >= 2 && best >= 1 {
      (10, "key AWS concepts with best practices")
    } else if concepts >= 1 || best >= 1 {
      (7, "covers an AWS concept or best practice")
    } else if any_in(&quiz.question, TRIVIA_MARKERS) {
      (3, "trivia recall (low learning value)")
    } else {
      (5, "general AWS knowledge")
    };
    dim.add("learningValue", score, 10, details);

    let explanation = &quiz.explanation;
    let elen = char_len(explanation);
    let (score, details) = if elen < 20 {
      (2, "explanation missing or far too short")
    } else if elen < 50 {
      (5, "explanation short, lacks reasoning")
    } else if elen > 500 {
      (7, "explanation too long")
    } else {
      match (any_in(explanation, REASONING_MARKERS), any_in(explanation, CONTEXT_MARKERS)) {
        (true, true) => (10, "explains why, with context"),
        (true, false) | (false, true) => (8, "explains why or gives context"),
        (false, false) => (6, "basic explanation"),
      }
    };
    dim.add("explanationQuality", score, 10, details);

    let actions = count_in(&all_text, ACTION_KEYWORDS);
    let relevant = count_in(&all_text, GAME_RELEVANT);
    let (score, details) = if actions >= 2 && relevant >= 2 {
      (5, "directly applicable to in-game decisions")
    } else if actions >= 1 || relevant >= 1 {
      (3, "useful for later decisions")
    } else {
      (1, "theoretical, little to act on")
    };
    dim.add("actionableKnowledge", score, 5, details);
    dim
  }
}

fn expected_complexity(d: Difficulty) -> u32 {
  match d {
    Difficulty::Easy => 2,
    Difficulty::Medium => 5,
    Difficulty::Hard => 8,
  }
}

// A word immediately repeated, optionally with a particle attached
// ("EC2 EC2를").
fn has_repeated_word(text: &str) -> bool {
  let words: Vec<&str> = text.split_whitespace().collect();
  words.windows(2).any(|w| w[1].starts_with(w[0]))
}

fn suggestions(quiz: &Quiz, s: &QualityScore) -> Vec<String> {
  let mc = quiz.quiz_type == QuizType::MultipleChoice;
  let mut out = Vec::new();
  let mut push = |cond: bool, msg: String| {
    if cond {
      out.push(msg);
    }
  };

  push(s.sub("questionClarity") < 7, "Make the question more specific and unambiguous".into());
  push(mc && s.sub("optionClarity") < 7, "Make the options clearer and more distinct".into());
  push(s.sub("languageQuality") < 4, "Improve grammar and phrasing".into());
  push(s.sub("infraContextMatch") < 7, "Tie the question to the player's current infrastructure".into());
  push(s.sub("awsAccuracy") < 7, "Use AWS service names and terminology precisely".into());
  push(s.sub("practicalApplicability") < 4, "Rebuild the question around a practical scenario".into());
  push(
    s.sub("difficultyAlignment") < 10,
    format!("Adjust question complexity to fit {}", quiz.difficulty),
  );
  push(mc && s.sub("distractorQuality") < 4, "Make wrong options more plausible".into());
  push(s.sub("learningValue") < 7, "Include AWS best practices or key concepts".into());
  push(s.sub("explanationQuality") < 7, "Add reasoning and context to the explanation".into());
  push(s.sub("actionableKnowledge") < 4, "Cover knowledge the player can act on in game".into());
  out
}

/// Multi-line human-readable report for operators.
pub fn quality_report(quiz: &Quiz, score: &QualityScore) -> String {
  let label = match score.grade() {
    "S" => "S (Excellent)",
    "A" => "A (Good)",
    "B" => "B (Fair)",
    "C" => "C (Pass)",
    _ => "D (Fail)",
  };
  let mut out = String::new();
  out.push_str("=== Quiz Quality Report ===\n\n");
  out.push_str(&format!("Question: {}\n", trunc_for_log(&quiz.question, 80)));
  out.push_str(&format!("Type: {}\nDifficulty: {}\n\n", quiz.quiz_type, quiz.difficulty));
  out.push_str("Scores:\n");
  out.push_str(&format!("- Clarity:      {}/25\n", score.clarity));
  out.push_str(&format!("- Relevance:    {}/25\n", score.relevance));
  out.push_str(&format!("- Difficulty:   {}/25\n", score.difficulty));
  out.push_str(&format!("- Educational:  {}/25\n", score.educational));
  out.push_str("----------------------------------------\n");
  out.push_str(&format!("Total:          {}/100\n\n", score.total));
  out.push_str(&format!("Grade: {label}\n\n"));
  out.push_str(if score.passed { "PASSED quality gate (>= 60)" } else { "FAILED quality gate (< 60)" });
  if !score.suggestions.is_empty() {
    out.push_str("\n\nSuggestions:");
    for (i, s) in score.suggestions.iter().enumerate() {
      out.push_str(&format!("\n{}. {}", i + 1, s));
    }
  }
  out
}
