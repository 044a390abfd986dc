//! Unwrapping the value expression from embedded script text.

use regex::Regex;
use std::sync::OnceLock;

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:(?:var|let|const)\s+)?[A-Za-z_$][\w$]*(?:\s*\.\s*[A-Za-z_$][\w$]*)*\s*=\s*")
            .unwrap()
    })
}

/// Strip an assignment prefix and trailing statement terminators from
/// embedded script text, leaving only the value expression.
///
/// Never fails; text that carries no wrapper is returned trimmed.
pub fn sanitize(raw: &str) -> String {
    let body = match assignment_re().find(raw) {
        // `a == b` is a comparison, not an assignment
        Some(m) if !raw[m.end()..].starts_with('=') => &raw[m.end()..],
        _ => raw,
    };

    let mut body = body.trim();
    while let Some(rest) = body.strip_suffix(';') {
        body = rest.trim_end();
    }
    body.to_string()
}
