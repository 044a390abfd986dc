//! Ordered parse strategies for the embedded state literal.
//!
//! Each strategy turns text into a value; the engine accepts the first
//! value that passes the schema check and deserializes into
//! [`PreloadData`]. A strategy that parses but yields an invalid shape is
//! a failure like any other and the next strategy runs.

use super::decode::decode;
use super::relaxed::{self, Dialect, ParseError};
use super::sanitize::sanitize;
use super::schema::{self, SchemaViolation};
use crate::model::PreloadData;

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// A named way of turning literal text into a value.
pub struct Strategy {
    pub name: &'static str,
    pub parse: fn(&str) -> Result<Value, Rejection>,
}

/// Strategies in the order they are tried.
pub static STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "script-literal",
        parse: script_literal,
    },
    Strategy {
        name: "relaxed-literal",
        parse: relaxed_literal,
    },
    Strategy {
        name: "pattern-fallback",
        parse: pattern_fallback,
    },
];

/// Strategies the pattern fallback retries on each candidate span.
fn literal_strategies() -> &'static [Strategy] {
    &STRATEGIES[..2]
}

/// Why a strategy's output was not accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Parse(ParseError),
    Schema(SchemaViolation),
    /// Valid shape, but a required field has an unusable type
    Shape(String),
    NoCandidate,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Parse(e) => write!(f, "parse error: {}", e),
            Rejection::Schema(v) => write!(f, "schema violation: {}", v),
            Rejection::Shape(msg) => write!(f, "unusable payload: {}", msg),
            Rejection::NoCandidate => f.write_str("no candidate span found"),
        }
    }
}

/// Outcome of running one strategy.
#[derive(Debug)]
pub enum Attempt {
    Accepted(Box<PreloadData>),
    Rejected { strategy: &'static str, reason: Rejection },
}

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("embedded state violates schema: {0}")]
    Schema(SchemaViolation),
    #[error("no strategy produced a usable payload ({})", summarize(.rejections))]
    Exhausted { rejections: Vec<(&'static str, Rejection)> },
}

fn summarize(rejections: &[(&'static str, Rejection)]) -> String {
    rejections
        .iter()
        .map(|(strategy, reason)| format!("{}: {}", strategy, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Turn sanitized literal text into the embedded state.
pub fn extract(text: &str) -> Result<PreloadData, ExtractionError> {
    let mut rejections = Vec::new();

    for strategy in STRATEGIES {
        match attempt(strategy, text) {
            Attempt::Accepted(data) => {
                debug!(strategy = strategy.name, "Extracted embedded state");
                return Ok(*data);
            }
            Attempt::Rejected { strategy, reason } => {
                debug!(strategy, reason = %reason, "Strategy rejected");
                rejections.push((strategy, reason));
            }
        }
    }

    let violation = rejections.iter().find_map(|(_, reason)| match reason {
        Rejection::Schema(v) => Some(v.clone()),
        _ => None,
    });
    let unusable = rejections
        .iter()
        .any(|(_, reason)| matches!(reason, Rejection::Shape(_)));

    match violation {
        Some(v) if !unusable => Err(ExtractionError::Schema(v)),
        _ => Err(ExtractionError::Exhausted { rejections }),
    }
}

/// Run one strategy and check its output.
pub fn attempt(strategy: &Strategy, text: &str) -> Attempt {
    match (strategy.parse)(text).and_then(accept) {
        Ok(data) => Attempt::Accepted(Box::new(data)),
        Err(reason) => Attempt::Rejected {
            strategy: strategy.name,
            reason,
        },
    }
}

fn validated(value: Value) -> Result<Value, Rejection> {
    schema::validate(&value).map_err(Rejection::Schema)?;
    Ok(value)
}

fn accept(value: Value) -> Result<PreloadData, Rejection> {
    let value = validated(value)?;
    serde_json::from_value(value).map_err(|e| Rejection::Shape(e.to_string()))
}

fn script_literal(text: &str) -> Result<Value, Rejection> {
    relaxed::parse(text, Dialect::Script).map_err(Rejection::Parse)
}

fn relaxed_literal(text: &str) -> Result<Value, Rejection> {
    relaxed::parse(text, Dialect::Lenient)
        .map(decode)
        .map_err(Rejection::Parse)
}

fn pattern_fallback(text: &str) -> Result<Value, Rejection> {
    let mut violation = None;
    let mut last = Rejection::NoCandidate;

    for (pattern, span) in candidate_spans(text) {
        let candidate = sanitize(span);
        for strategy in literal_strategies() {
            // A span that only deserializes badly must not end the search
            let usable = (strategy.parse)(&candidate).and_then(|value| {
                accept(value.clone())?;
                Ok(value)
            });
            match usable {
                Ok(value) => {
                    debug!(pattern, strategy = strategy.name, "Recovered literal from candidate span");
                    return Ok(value);
                }
                Err(Rejection::Schema(v)) => {
                    violation.get_or_insert(v);
                }
                Err(reason) => last = reason,
            }
        }
    }

    Err(violation.map(Rejection::Schema).unwrap_or(last))
}

/// Candidate literal spans, most specific first, without duplicates.
pub fn candidate_spans(text: &str) -> Vec<(&'static str, &str)> {
    static ASSIGNMENT: OnceLock<Regex> = OnceLock::new();
    let assignment = ASSIGNMENT.get_or_init(|| Regex::new(r"[A-Za-z_$][\w$.]*\s*=\s*").unwrap());

    let candidates = [
        ("balanced-braces", largest_balanced_span(text)),
        (
            "after-assignment",
            assignment
                .find_iter(text)
                .find(|m| !text[m.end()..].starts_with('='))
                .map(|m| &text[m.end()..]),
        ),
        (
            "outer-braces",
            text.find('{')
                .zip(text.rfind('}'))
                .filter(|(start, end)| start < end)
                .map(|(start, end)| &text[start..=end]),
        ),
    ];

    let mut spans: Vec<(&'static str, &str)> = Vec::new();
    for (name, span) in candidates {
        let Some(span) = span.map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };
        if !spans.iter().any(|(_, existing)| *existing == span) {
            spans.push((name, span));
        }
    }

    spans
}

/// Longest `{...}` span with balanced braces, ignoring braces in strings.
fn largest_balanced_span(text: &str) -> Option<&str> {
    let mut best: Option<(usize, usize)> = None;
    let mut depth = 0usize;
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' if depth > 0 => quote = Some(c),
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 && best.map_or(true, |(s, e)| i + 1 - start > e - s) {
                    best = Some((start, i + 1));
                }
            }
            _ => {}
        }
    }

    best.map(|(s, e)| &text[s..e])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MonitorKind, Theme};

    const STRICT: &str = r#"{
        "config": {
            "slug": "main", "title": "Acme Status", "description": "All systems",
            "icon": "/icon.svg", "theme": "dark", "published": true,
            "showTags": true, "footerText": null
        },
        "incident": null,
        "publicGroupList": [
            { "id": 1, "name": "Services", "weight": 1, "monitorList": [
                { "id": 7, "name": "API", "type": "http", "url": "https://api.example.com" },
                { "id": 8, "name": "Worker \"A\"", "type": "push" }
            ] }
        ],
        "maintenanceList": []
    }"#;

    const SINGLE_QUOTED: &str = r#"{
        config: {
            slug: 'main', title: 'Acme Status', description: 'All systems',
            icon: '/icon.svg', theme: 'dark', published: true,
            showTags: true, footerText: null,
        },
        incident: null,
        publicGroupList: [
            { id: 1, name: 'Services', weight: 1, monitorList: [
                { id: 7, name: 'API', type: 'http', url: 'https://api.example.com', },
                { id: 8, name: 'Worker "A"', type: 'push' },
            ], },
        ],
        maintenanceList: [],
    }"#;

    #[test]
    fn test_single_quoted_matches_strict() {
        let strict: Value = serde_json::from_str(STRICT).unwrap();
        assert_eq!(script_literal(SINGLE_QUOTED).unwrap(), strict);

        let relaxed = extract(SINGLE_QUOTED).unwrap();
        assert_eq!(relaxed, extract(STRICT).unwrap());
        assert_eq!(relaxed.config.theme, Theme::Dark);
        assert_eq!(relaxed.public_group_list[0].monitor_list[1].kind, MonitorKind::Push);
    }

    #[test]
    fn test_relaxed_strategy_decodes_leftovers() {
        let text = SINGLE_QUOTED.replace("'Acme Status'", r"'Caf\u00e9 &amp; Bar \x'");
        match attempt(&STRATEGIES[0], &text) {
            Attempt::Rejected { reason: Rejection::Parse(_), .. } => {}
            other => panic!("expected parse rejection, got {:?}", other),
        }

        let data = extract(&text).unwrap();
        assert_eq!(data.config.title, "Caf\u{e9} & Bar \\x");
    }

    #[test]
    fn test_pattern_fallback_recovers_noisy_text() {
        let noisy = format!("/* bootstrap */ if (x) {{ y() }} window.preloadData = {}; init();", SINGLE_QUOTED);
        assert!(matches!(attempt(&STRATEGIES[1], &noisy), Attempt::Rejected { .. }));

        let data = extract(&noisy).unwrap();
        assert_eq!(data.config.slug, "main");
        assert_eq!(data.public_group_list[0].monitor_list.len(), 2);
    }

    #[test]
    fn test_pattern_fallback_skips_mistyped_span() {
        // The largest balanced span passes the schema but has an object slug
        let text = "junk {config: {slug: {x: 1}, title: 't', description: 'd', icon: 'i', \
                    theme: 'dark', published: true}, publicGroupList: []} \
                    data = {config: {slug: 's', title: 't', description: 'd', icon: 'i', \
                    theme: 'dark', published: true}, publicGroupList: []};";

        let spans = candidate_spans(text);
        assert_eq!(spans[0].0, "balanced-braces");
        assert!(spans[0].1.contains("{x: 1}"));

        match attempt(&STRATEGIES[2], text) {
            Attempt::Accepted(data) => assert_eq!(data.config.slug, "s"),
            other => panic!("expected later span to be accepted, got {:?}", other),
        }
        assert_eq!(extract(text).unwrap().config.title, "t");
    }

    #[test]
    fn test_schema_failure_is_reported() {
        let text = SINGLE_QUOTED.replace("publicGroupList", "groups");
        match extract(&text) {
            Err(ExtractionError::Schema(SchemaViolation::NotAnArray("publicGroupList"))) => {}
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_exhausts_every_strategy() {
        match extract("<html>nothing here</html>") {
            Err(ExtractionError::Exhausted { rejections }) => {
                let names: Vec<_> = rejections.iter().map(|(name, _)| *name).collect();
                assert_eq!(names, vec!["script-literal", "relaxed-literal", "pattern-fallback"]);
                assert_eq!(rejections[2].1, Rejection::NoCandidate);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_candidate_spans() {
        let text = "a = {x: '}'} + {y: 1, z: {w: 2}}";
        let spans = candidate_spans(text);
        assert_eq!(spans[0], ("balanced-braces", "{y: 1, z: {w: 2}}"));
        assert_eq!(spans[1], ("after-assignment", "{x: '}'} + {y: 1, z: {w: 2}}"));
        assert_eq!(spans.len(), 2);
    }
}
