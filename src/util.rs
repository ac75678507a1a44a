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

/// Log-safe truncation for large strings, cut on a char boundary.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

/// Trim and drop empty strings; used when coercing optional model fields.
pub fn non_empty(s: Option<&str>) -> Option<String> {
  s.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_fills_every_occurrence() {
    let out = fill_template("zh: {zh}\nen: {en}\n{zh}", &[("zh", "你好"), ("en", "hi")]);
    assert_eq!(out, "zh: 你好\nen: hi\n你好");
  }

  #[test]
  fn truncation_respects_multibyte_chars() {
    let s = "批改批改批改";
    let t = trunc_for_log(s, 4);
    assert!(t.starts_with("批…"));
    assert_eq!(trunc_for_log("short", 10), "short");
  }

  #[test]
  fn non_empty_trims() {
    assert_eq!(non_empty(Some("  a ")), Some("a".into()));
    assert_eq!(non_empty(Some("   ")), None);
    assert_eq!(non_empty(None), None);
  }
}
