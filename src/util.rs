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

/// Log-safe truncation for large strings (char-boundary aware).
/// Avoids spamming logs with whole extracted PDFs.
pub fn trunc_for_log(s: &str, max_chars: usize) -> String {
  let total = s.chars().count();
  if total <= max_chars {
    s.to_string()
  } else {
    let head: String = s.chars().take(max_chars).collect();
    format!("{}… ({} chars total)", head, total)
  }
}

/// Trimmed, non-empty value of an optional request field.
pub fn required(v: Option<&str>) -> Option<String> {
  v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fill_template_replaces_all_keys() {
    let out = fill_template("You are an expert {subject} tutor. {subject}!", &[("subject", "Physics")]);
    assert_eq!(out, "You are an expert Physics tutor. Physics!");
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    assert_eq!(trunc_for_log("héllo", 10), "héllo");
    assert_eq!(trunc_for_log("héllo", 2), "hé… (5 chars total)");
  }

  #[test]
  fn required_trims() {
    assert_eq!(required(Some("  BSc ")), Some("BSc".to_string()));
    assert_eq!(required(Some("   ")), None);
    assert_eq!(required(None), None);
  }
}
