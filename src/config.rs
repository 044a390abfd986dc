//! Configuration module for KumaView.
//!
//! Loads configuration from environment variables with sensible defaults.
//! The result is built once at startup and handed to the service by `Arc`.

use crate::stats::{Cutoff, TierPolicy};

use reqwest::Url;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Base URL of the upstream monitoring server, without trailing slash
    pub base_url: String,
    /// Status page slug on the upstream server
    pub page_id: String,
    /// Accept invalid upstream certificates (default: false)
    pub dev_mode: bool,
    /// Per-attempt request timeout (default: 10s)
    pub fetch_timeout: Duration,
    /// Retries after the first attempt (default: 3)
    pub fetch_max_retries: u32,
    /// Base retry delay, scaled by attempt number (default: 1s)
    pub fetch_retry_delay: Duration,
    /// Recent heartbeats used for ping statistics (default: 50)
    pub stats_window: usize,
    /// Latency tier cutoffs
    pub tier_policy: TierPolicy,
    /// Window in which repeated queries share one upstream round trip (default: 5s)
    pub cache_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            base_url: String::new(),
            page_id: String::new(),
            dev_mode: false,
            fetch_timeout: Duration::from_millis(10_000),
            fetch_max_retries: 3,
            fetch_retry_delay: Duration::from_millis(1_000),
            stats_window: 50,
            tier_policy: TierPolicy::default(),
            cache_ttl: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KUMAVIEW_BASE_URL`: upstream base URL (required)
    /// - `KUMAVIEW_PAGE_ID`: status page slug (required)
    /// - `KUMAVIEW_HTTP_PORT`: HTTP port (default: 8080)
    /// - `KUMAVIEW_DEV_MODE`: `true`/`1` to skip certificate validation
    /// - `KUMAVIEW_FETCH_TIMEOUT_MS`, `KUMAVIEW_FETCH_MAX_RETRIES`,
    ///   `KUMAVIEW_FETCH_RETRY_DELAY_MS`: fetch client tuning
    /// - `KUMAVIEW_STATS_WINDOW`: heartbeats used for ping statistics
    /// - `KUMAVIEW_TIER_POLICY`: `percentile` (default) or `fixed`
    /// - `KUMAVIEW_TIER_EXCELLENT_MS`, `KUMAVIEW_TIER_GOOD_MS`: fixed cutoffs
    /// - `KUMAVIEW_CACHE_TTL_SECS`: response dedup window
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        let base_url = lookup("KUMAVIEW_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("KUMAVIEW_BASE_URL"))?;
        let parsed = Url::parse(base_url.trim()).map_err(|e| ConfigError::Invalid {
            key: "KUMAVIEW_BASE_URL",
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::Invalid {
                key: "KUMAVIEW_BASE_URL",
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        cfg.base_url = base_url.trim().trim_end_matches('/').to_string();

        cfg.page_id = lookup("KUMAVIEW_PAGE_ID")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("KUMAVIEW_PAGE_ID"))?;

        if let Some(port) = parse_var::<u16, _>(&lookup, "KUMAVIEW_HTTP_PORT")? {
            cfg.http_port = port;
        }

        if let Some(flag) = lookup("KUMAVIEW_DEV_MODE") {
            cfg.dev_mode = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }

        if let Some(ms) = parse_var::<u64, _>(&lookup, "KUMAVIEW_FETCH_TIMEOUT_MS")? {
            cfg.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = parse_var::<u32, _>(&lookup, "KUMAVIEW_FETCH_MAX_RETRIES")? {
            cfg.fetch_max_retries = retries;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "KUMAVIEW_FETCH_RETRY_DELAY_MS")? {
            cfg.fetch_retry_delay = Duration::from_millis(ms);
        }

        if let Some(window) = parse_var::<usize, _>(&lookup, "KUMAVIEW_STATS_WINDOW")? {
            if window == 0 {
                return Err(ConfigError::Invalid {
                    key: "KUMAVIEW_STATS_WINDOW",
                    reason: "must be at least 1".to_string(),
                });
            }
            cfg.stats_window = window;
        }

        cfg.tier_policy = match lookup("KUMAVIEW_TIER_POLICY").as_deref().map(str::trim) {
            None | Some("") | Some("percentile") => TierPolicy::percentile(),
            Some("fixed") => {
                let mut policy = TierPolicy::fixed();
                if let Some(ms) = parse_var::<f64, _>(&lookup, "KUMAVIEW_TIER_EXCELLENT_MS")? {
                    policy.excellent = Cutoff::Millis(ms);
                }
                if let Some(ms) = parse_var::<f64, _>(&lookup, "KUMAVIEW_TIER_GOOD_MS")? {
                    policy.good = Cutoff::Millis(ms);
                }
                policy
            }
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "KUMAVIEW_TIER_POLICY",
                    reason: format!("unknown policy {:?}", other),
                })
            }
        };

        if let Some(secs) = parse_var::<u64, _>(&lookup, "KUMAVIEW_CACHE_TTL_SECS")? {
            cfg.cache_ttl = Duration::from_secs(secs);
        }

        Ok(cfg)
    }

    /// URL of the server-rendered status page.
    pub fn html_endpoint(&self) -> String {
        format!("{}/status/{}", self.base_url, self.page_id)
    }

    /// URL of the heartbeat/uptime JSON feed.
    pub fn api_endpoint(&self) -> String {
        format!("{}/api/status-page/heartbeat/{}", self.base_url, self.page_id)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("KUMAVIEW_BASE_URL", "https://status.example.com/"),
            ("KUMAVIEW_PAGE_ID", "main"),
        ]))
        .unwrap();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.fetch_max_retries, 3);
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(10));
        assert_eq!(cfg.fetch_retry_delay, Duration::from_secs(1));
        assert_eq!(cfg.stats_window, 50);
        assert!(!cfg.dev_mode);
        assert_eq!(cfg.tier_policy, TierPolicy::percentile());
    }

    #[test]
    fn test_endpoints_trim_trailing_slash() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("KUMAVIEW_BASE_URL", "https://status.example.com/"),
            ("KUMAVIEW_PAGE_ID", "main"),
        ]))
        .unwrap();
        assert_eq!(cfg.html_endpoint(), "https://status.example.com/status/main");
        assert_eq!(
            cfg.api_endpoint(),
            "https://status.example.com/api/status-page/heartbeat/main"
        );
    }

    #[test]
    fn test_missing_required() {
        let err = ServerConfig::from_lookup(lookup(&[("KUMAVIEW_PAGE_ID", "main")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("KUMAVIEW_BASE_URL"));

        let err = ServerConfig::from_lookup(lookup(&[
            ("KUMAVIEW_BASE_URL", "https://status.example.com"),
            ("KUMAVIEW_PAGE_ID", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("KUMAVIEW_PAGE_ID"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad_scheme = ServerConfig::from_lookup(lookup(&[
            ("KUMAVIEW_BASE_URL", "ftp://status.example.com"),
            ("KUMAVIEW_PAGE_ID", "main"),
        ]));
        assert!(matches!(bad_scheme, Err(ConfigError::Invalid { key: "KUMAVIEW_BASE_URL", .. })));

        let bad_port = ServerConfig::from_lookup(lookup(&[
            ("KUMAVIEW_BASE_URL", "http://localhost:3001"),
            ("KUMAVIEW_PAGE_ID", "main"),
            ("KUMAVIEW_HTTP_PORT", "eighty"),
        ]));
        assert!(matches!(bad_port, Err(ConfigError::Invalid { key: "KUMAVIEW_HTTP_PORT", .. })));
    }

    #[test]
    fn test_fixed_tier_policy() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("KUMAVIEW_BASE_URL", "http://localhost:3001"),
            ("KUMAVIEW_PAGE_ID", "main"),
            ("KUMAVIEW_TIER_POLICY", "fixed"),
            ("KUMAVIEW_TIER_GOOD_MS", "350"),
            ("KUMAVIEW_DEV_MODE", "true"),
        ]))
        .unwrap();
        assert!(cfg.dev_mode);
        assert_eq!(cfg.tier_policy.excellent, Cutoff::Millis(100.0));
        assert_eq!(cfg.tier_policy.good, Cutoff::Millis(350.0));
    }
}
