//! Small string helpers shared by the prompt builder, report, and logs.

/// Replaces occurrences of `{key}` in the template with provided values.
/// No nesting or conditionals.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Escape a string for safe HTML insertion.
pub fn html_escape(s: &str) -> String {
  s.replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
    .replace('\'', "&#x27;")
}

/// First `max` chars of `s`, for log fields.
pub fn preview(s: &str, max: usize) -> String {
  let mut out: String = s.chars().take(max).collect();
  if s.chars().count() > max {
    out.push('…');
  }
  out
}

/// Keep `[A-Za-z0-9_-]`, map everything else to `_`. Blank input yields `fallback`.
pub fn sanitize_file_stem(s: &str, fallback: &str) -> String {
  let trimmed = s.trim();
  if trimmed.is_empty() {
    return fallback.to_string();
  }
  trimmed
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_all_placeholders() {
    let out = fill_template("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and y and x");
  }

  #[test]
  fn escapes_html_specials() {
    assert_eq!(html_escape(r#"<b>"Tom" & 'Jo'</b>"#), "&lt;b&gt;&quot;Tom&quot; &amp; &#x27;Jo&#x27;&lt;/b&gt;");
  }

  #[test]
  fn preview_is_char_safe() {
    assert_eq!(preview("héllo wörld", 5), "héllo…");
    assert_eq!(preview("short", 10), "short");
  }

  #[test]
  fn sanitizes_file_stems() {
    assert_eq!(sanitize_file_stem("Asha K.", "student"), "Asha_K_");
    assert_eq!(sanitize_file_stem("  ", "student"), "student");
    assert_eq!(sanitize_file_stem("../etc", "student"), "___etc");
  }
}
