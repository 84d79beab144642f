//! Free-text sanitization applied to every outgoing text field except
//! passwords.
//!
//! The rule is removal, not escaping: markup-significant characters are
//! stripped and surrounding whitespace trimmed, which makes the function
//! idempotent — sanitizing already-sanitized text yields no further change.

/// Strip `<`/`>` and trim surrounding whitespace.
pub fn sanitize(input: &str) -> String {
    input.replace(['<', '>'], "").trim().to_string()
}

/// Sanitize an optional field, mapping empty results to `None`.
pub fn sanitize_opt(input: Option<&str>) -> Option<String> {
    input.map(sanitize).filter(|s| !s.is_empty())
}
