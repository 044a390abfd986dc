//! Locating the embedded state inside the status page markup.

use regex::Regex;
use std::sync::OnceLock;

/// Element id of the embedded state script.
pub const PRELOAD_SCRIPT_ID: &str = "preload-data";

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b(?P<attrs>[^>]*)>(?P<body>.*?)</script\s*>").unwrap())
}

fn id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"(?i)\bid\s*=\s*["']?{}(?:["'\s/]|$)"#,
            regex::escape(PRELOAD_SCRIPT_ID)
        ))
        .unwrap()
    })
}

fn assignment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bpreloadData\s*=").unwrap())
}

/// Return the text of the embedded state script, if the page has one.
///
/// The element tagged `id="preload-data"` wins; otherwise the first script
/// assigning `preloadData` is used. Blank scripts count as absent.
pub fn find_preload_script(html: &str) -> Option<&str> {
    let scripts: Vec<_> = script_re()
        .captures_iter(html)
        .filter_map(|caps| Some((caps.name("attrs")?.as_str(), caps.name("body")?.as_str())))
        .collect();

    scripts
        .iter()
        .find(|(attrs, _)| id_re().is_match(attrs))
        .or_else(|| scripts.iter().find(|(_, body)| assignment_re().is_match(body)))
        .map(|(_, body)| body.trim())
        .filter(|body| !body.is_empty())
}
