//! Timestamp normalization.
//!
//! The upstream emits naive timestamps that are implicitly UTC. Everything
//! leaving the pipeline carries an explicit `±HHMM` offset instead.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use regex::Regex;
use std::sync::OnceLock;

const INSTANT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%dT%H:%M%z",
];

fn timestamp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<body>\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)\s*(?P<offset>[Zz]|[+-]\d{2}:?\d{2})?$",
        )
        .unwrap()
    })
}

/// The UTC offset.
pub fn utc() -> FixedOffset {
    Utc.fix()
}

/// Attach a UTC offset to a naive timestamp, or canonicalize an existing one.
pub fn normalize(s: &str) -> String {
    normalize_with_offset(s, utc())
}

/// Like [`normalize`], with `default` used for naive timestamps.
///
/// Strings that are not recognizable timestamps are returned unchanged.
pub fn normalize_with_offset(s: &str, default: FixedOffset) -> String {
    let Some(caps) = timestamp_re().captures(s.trim()) else {
        return s.to_string();
    };

    let body = &caps["body"];
    let offset = match caps.name("offset") {
        Some(explicit) => canonical_offset(explicit.as_str()),
        None => format_offset(default),
    };

    format!("{}{}", body, offset)
}

/// Parse a timestamp into an absolute instant; naive values are read as UTC.
pub fn parse_instant(s: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = normalize(s);
    INSTANT_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s.trim()).ok())
}

/// Parse `+08:00`, `+0800`, `Z` or `UTC` into an offset.
pub fn parse_offset(s: &str) -> Option<FixedOffset> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(?P<sign>[+-])(?P<h>\d{2}):?(?P<m>\d{2})$").unwrap());

    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Some(utc());
    }

    let caps = re.captures(s)?;
    let hours: i32 = caps["h"].parse().ok()?;
    let minutes: i32 = caps["m"].parse().ok()?;
    let seconds = hours * 3600 + minutes * 60;
    let signed = if &caps["sign"] == "-" { -seconds } else { seconds };
    FixedOffset::east_opt(signed)
}

/// Drop a trailing UTC marker (`Z`, `+0000`, `+00:00`) from a timestamp.
pub fn strip_utc_marker(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed
        .strip_suffix("+0000")
        .or_else(|| trimmed.strip_suffix("+00:00"))
    {
        return rest.trim_end();
    }
    match trimmed.strip_suffix(['Z', 'z']) {
        Some(rest) if rest.ends_with(|c: char| c.is_ascii_digit()) => rest,
        _ => trimmed,
    }
}

fn canonical_offset(raw: &str) -> String {
    if raw.eq_ignore_ascii_case("z") {
        "+0000".to_string()
    } else {
        raw.replace(':', "")
    }
}

fn format_offset(offset: FixedOffset) -> String {
    let total = offset.local_minus_utc();
    let sign = if total < 0 { '-' } else { '+' };
    let abs = total.abs();
    format!("{}{:02}{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_naive_is_utc() {
        let normalized = normalize("2024-01-01 12:00:00");
        assert_eq!(normalized, "2024-01-01 12:00:00+0000");
        assert_eq!(
            parse_instant(&normalized).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_zulu_keeps_instant() {
        let normalized = normalize("2024-01-01T12:00:00Z");
        assert_eq!(normalized, "2024-01-01T12:00:00+0000");
        assert_eq!(
            parse_instant(&normalized).unwrap(),
            parse_instant("2024-01-01T12:00:00Z").unwrap()
        );
    }

    #[test]
    fn test_explicit_offsets_canonicalized() {
        assert_eq!(normalize("2024-01-01T12:00:00+08:00"), "2024-01-01T12:00:00+0800");
        assert_eq!(normalize("2024-01-01 12:00:00 -0530"), "2024-01-01 12:00:00-0530");
        assert_eq!(normalize("2024-01-01 12:00:00.123"), "2024-01-01 12:00:00.123+0000");
        assert_eq!(
            parse_instant("2024-01-01T12:00:00+08:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_idempotent_and_passthrough() {
        for input in ["2024-01-01 12:00:00", "2024-01-01T12:00:00Z", "2024-06-01 08:30"] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
        }
        assert_eq!(normalize("yesterday"), "yesterday");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_default_offset() {
        let offset = parse_offset("+08:00").unwrap();
        assert_eq!(normalize_with_offset("2025-04-22 13:00", offset), "2025-04-22 13:00+0800");
        assert_eq!(parse_offset("-0330").unwrap().local_minus_utc(), -(3 * 3600 + 30 * 60));
        assert_eq!(parse_offset("UTC"), Some(utc()));
        assert_eq!(parse_offset("Asia/Shanghai"), None);
    }

    #[test]
    fn test_strip_utc_marker() {
        assert_eq!(strip_utc_marker("2025-04-22 13:00:00 +0000"), "2025-04-22 13:00:00");
        assert_eq!(strip_utc_marker("2025-04-22T13:00:00Z"), "2025-04-22T13:00:00");
        assert_eq!(strip_utc_marker("2025-04-22 13:00:00+0800"), "2025-04-22 13:00:00+0800");
    }
}
