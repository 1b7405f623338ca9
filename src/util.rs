//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// True if the char is a precomposed Hangul syllable (가..힣).
pub fn is_hangul(ch: char) -> bool {
  ('\u{AC00}'..='\u{D7A3}').contains(&ch)
}

/// Share of Hangul syllables among the non-whitespace chars of `s`.
/// Empty or whitespace-only input yields 0.0.
pub fn hangul_ratio(s: &str) -> f64 {
  let mut hangul = 0usize;
  let mut total = 0usize;
  for ch in s.chars() {
    if ch.is_whitespace() { continue; }
    total += 1;
    if is_hangul(ch) { hangul += 1; }
  }
  if total == 0 { 0.0 } else { hangul as f64 / total as f64 }
}

/// Length in chars (not bytes). Every length rule in the pipeline counts chars.
pub fn char_len(s: &str) -> usize {
  s.chars().count()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge prompts or model payloads.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let total = char_len(s);
  if total <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} chars total)", head, total)
  }
}

/// Lowercased, trimmed copy of every tag. Infra tags compare case-insensitively.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
  tags.iter().map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty()).collect()
}
