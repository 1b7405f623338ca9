//! Prompt rendering and JSON extraction for quiz generation.
//!
//! Templates live in `config::Prompts` (overridable from TOML); this module
//! only fills them in and pulls the JSON object back out of raw model text.

use crate::config::Prompts;
use crate::domain::{Difficulty, QuizType};
use crate::util::{char_len, fill_template};

/// Upper bound on the reference section appended to a prompt, in chars.
pub const MAX_REFERENCE_CHARS: usize = 1000;

/// Render the full generation prompt for one attempt.
pub fn build_prompt(
  prompts: &Prompts,
  quiz_type: QuizType,
  difficulty: Difficulty,
  infra_context: &[String],
  reference: Option<&str>,
) -> String {
  let guide = match difficulty {
    Difficulty::Easy => &prompts.easy_guide,
    Difficulty::Medium => &prompts.medium_guide,
    Difficulty::Hard => &prompts.hard_guide,
  };
  let template = match quiz_type {
    QuizType::MultipleChoice => &prompts.multiple_choice_template,
    QuizType::Ox => &prompts.ox_template,
  };
  let infra = infra_context.join(", ");

  let mut out = fill_template(
    template,
    &[
      ("system", prompts.system.as_str()),
      ("difficulty", difficulty.as_str()),
      ("guide", guide.as_str()),
      ("infra", infra.as_str()),
    ],
  );

  if let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) {
    let bounded: String = if char_len(reference) > MAX_REFERENCE_CHARS {
      reference.chars().take(MAX_REFERENCE_CHARS).collect()
    } else {
      reference.to_string()
    };
    out.push_str("\n\n");
    out.push_str(&fill_template(&prompts.reference_template, &[("reference", bounded.as_str())]));
  }
  out
}

/// Difficulty band for a game turn. Missing (or zero) turns default to MEDIUM.
pub fn infer_difficulty_from_turn(turn: Option<u32>) -> Difficulty {
  match turn {
    None | Some(0) => Difficulty::Medium,
    Some(t) if t <= 10 => Difficulty::Easy,
    Some(t) if t <= 20 => Difficulty::Medium,
    Some(_) => Difficulty::Hard,
  }
}

/// Inclusive turn range a difficulty is meant for.
pub fn turn_range(difficulty: Difficulty) -> (u32, u32) {
  match difficulty {
    Difficulty::Easy => (1, 10),
    Difficulty::Medium => (11, 20),
    Difficulty::Hard => (21, 25),
  }
}

/// Isolate the first well-formed JSON object in free-form model output.
///
/// Code fences and chatter around the object are ignored. Each `{` is tried in
/// order; the scan tracks string literals so braces inside strings don't count.
pub fn extract_json(raw: &str) -> Result<&str, String> {
  let bytes = raw.as_bytes();
  let mut from = 0;
  while let Some(rel) = raw[from..].find('{') {
    let start = from + rel;
    if let Some(end) = balanced_end(bytes, start) {
      let candidate = &raw[start..=end];
      if serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(candidate).is_ok() {
        return Ok(candidate);
      }
    }
    from = start + 1;
  }
  Err(format!("no JSON object found in model output ({} chars)", char_len(raw)))
}

// Byte index of the `}` closing the object opened at `start`.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
  let mut depth = 0usize;
  let mut in_str = false;
  let mut escaped = false;
  for (i, &b) in bytes.iter().enumerate().skip(start) {
    if in_str {
      match b {
        _ if escaped => escaped = false,
        b'\\' => escaped = true,
        b'"' => in_str = false,
        _ => {}
      }
      continue;
    }
    match b {
      b'"' => in_str = true,
      b'{' => depth += 1,
      b'}' => {
        depth = depth.checked_sub(1)?;
        if depth == 0 {
          return Some(i);
        }
      }
      _ => {}
    }
  }
  None
}
