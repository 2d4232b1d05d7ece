//! Utility functions for string manipulation.
//!
//! - Character-safe truncation for prompt payloads and log previews
//! - Markdown code-fence stripping for model replies

use once_cell::sync::Lazy;
use regex::Regex;

static FENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_-]*[ \t]*\r?\n?").expect("static regex"));

/// Truncate `s` to at most `max` characters (not bytes).
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_chars("héllo", 2), "hé");
/// ```
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` characters with an ellipsis and
/// byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let head = truncate_chars(s, max);
    if head.len() == s.len() {
        head
    } else {
        format!("{}…(+{} bytes)", head, s.len() - head.len())
    }
}

/// Remove markdown code-fence lines (```` ``` ```` or ```` ```html ````)
/// that models like to wrap HTML in, and trim the result.
pub fn strip_code_fences(text: &str) -> String {
    FENCE_LINE.replace_all(text, "").trim().to_string()
}
