//! Escape and HTML entity decoding over arbitrary value trees.

use regex::{Captures, Regex};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Named entities resolved by the decoder.
pub const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("copy", '\u{a9}'),
    ("reg", '\u{ae}'),
    ("trade", '\u{2122}'),
    ("hellip", '\u{2026}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("laquo", '\u{ab}'),
    ("raquo", '\u{bb}'),
    ("middot", '\u{b7}'),
    ("bull", '\u{2022}'),
    ("deg", '\u{b0}'),
    ("times", '\u{d7}'),
    ("divide", '\u{f7}'),
    ("euro", '\u{20ac}'),
    ("pound", '\u{a3}'),
    ("yen", '\u{a5}'),
    ("cent", '\u{a2}'),
    ("sect", '\u{a7}'),
    ("para", '\u{b6}'),
];

/// Decode every string leaf of `value`; keys and non-string leaves are kept.
pub fn decode(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(decode_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(decode).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, decode(v))).collect()),
        other => other,
    }
}

/// Decode a single string until it stops changing.
///
/// Every replacement shortens the string, so the loop terminates.
pub fn decode_str(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        match decode_pass(&current) {
            Cow::Borrowed(_) => return current,
            Cow::Owned(next) if next == current => return current,
            Cow::Owned(next) => current = next,
        }
    }
}

fn decode_pass(s: &str) -> Cow<'_, str> {
    static CONTROL: OnceLock<Regex> = OnceLock::new();
    static UNICODE: OnceLock<Regex> = OnceLock::new();
    static NAMED: OnceLock<Regex> = OnceLock::new();
    static DECIMAL: OnceLock<Regex> = OnceLock::new();
    static HEX: OnceLock<Regex> = OnceLock::new();

    let control = CONTROL.get_or_init(|| Regex::new(r"\\([nrt\\])").unwrap());
    let unicode = UNICODE.get_or_init(|| {
        Regex::new(r"\\u([0-9a-fA-F]{4})(?:\\u([0-9a-fA-F]{4}))?").unwrap()
    });
    let named = NAMED.get_or_init(|| Regex::new(r"&([A-Za-z]+);").unwrap());
    let decimal = DECIMAL.get_or_init(|| Regex::new(r"&#([0-9]{1,7});").unwrap());
    let hex = HEX.get_or_init(|| Regex::new(r"&#[xX]([0-9a-fA-F]{1,6});").unwrap());

    let mut out = Cow::Borrowed(s);

    out = replace(out, control, |caps| {
        match &caps[1] {
            "n" => "\n",
            "r" => "\r",
            "t" => "\t",
            _ => "\\",
        }
        .to_string()
    });

    out = replace(out, unicode, |caps| {
        let high = u32::from_str_radix(&caps[1], 16).unwrap_or(0xFFFF_FFFF);
        match caps.get(2) {
            Some(second) => {
                let low = u32::from_str_radix(second.as_str(), 16).unwrap_or(0xFFFF_FFFF);
                if (0xD800..=0xDBFF).contains(&high) && (0xDC00..=0xDFFF).contains(&low) {
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    if let Some(c) = char::from_u32(combined) {
                        return c.to_string();
                    }
                }
                let mut both = unicode_unit(high, &caps[1]);
                both.push_str(&unicode_unit(low, second.as_str()));
                both
            }
            None => unicode_unit(high, &caps[1]),
        }
    });

    out = replace(out, named, |caps| {
        NAMED_ENTITIES
            .iter()
            .find(|(name, _)| *name == &caps[1])
            .map(|(_, c)| c.to_string())
            .unwrap_or_else(|| caps[0].to_string())
    });

    out = replace(out, decimal, |caps| {
        caps[1]
            .parse::<u32>()
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });

    replace(out, hex, |caps| {
        u32::from_str_radix(&caps[1], 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    })
}

/// Apply one replacement stage, staying borrowed when nothing matches.
fn replace<'a, F>(input: Cow<'a, str>, re: &Regex, f: F) -> Cow<'a, str>
where
    F: Fn(&Captures<'_>) -> String,
{
    if !re.is_match(&input) {
        return input;
    }
    let replaced = re.replace_all(&input, |caps: &Captures<'_>| f(caps)).into_owned();
    Cow::Owned(replaced)
}

fn unicode_unit(code: u32, digits: &str) -> String {
    char::from_u32(code)
        .map(String::from)
        .unwrap_or_else(|| format!("\\u{}", digits))
}
