//! Resilient HTTP client for the upstream monitoring server.
//!
//! Transient connection failures are retried with a linearly growing delay;
//! everything else is returned immediately.

mod tls;

pub use tls::{client_config, crypto_provider};

use crate::config::ServerConfig;

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// Fetch error types.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("network error for {url}: {message}")]
    Network {
        url: String,
        message: String,
        transient: bool,
    },
    #[error("invalid request: {0}")]
    Request(String),
    #[error("TLS setup failed: {0}")]
    Tls(String),
    #[error("failed to decode response body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::Network { transient, .. } => *transient,
            _ => false,
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before retry `n` is `retry_delay * n`
    pub retry_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "user-agent".to_string(),
            concat!("kumaview/", env!("CARGO_PKG_VERSION")).to_string(),
        );
        headers.insert(
            "accept".to_string(),
            "text/html,application/json,*/*".to_string(),
        );

        Self {
            method: Method::GET,
            headers,
            body: None,
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl FetchOptions {
    /// Defaults with timeout and retry policy taken from the configuration.
    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self {
            timeout: cfg.fetch_timeout,
            max_retries: cfg.fetch_max_retries,
            retry_delay: cfg.fetch_retry_delay,
            ..Self::default()
        }
    }

    /// Set a header; names are case-insensitive.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

/// A buffered upstream response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    /// 2xx status
    pub ok: bool,
    /// Lower-cased names; repeated headers joined with `", "`
    pub headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl FetchResponse {
    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<String, FetchError> {
        String::from_utf8(self.body.clone()).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Body decoded as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        serde_json::from_slice(&self.body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// HTTP client with retry and TLS policy applied.
#[derive(Clone)]
pub struct FetchClient {
    client: reqwest::Client,
}

impl FetchClient {
    pub fn new(dev_mode: bool) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .use_preconfigured_tls(client_config(dev_mode)?)
            .build()
            .map_err(|e| FetchError::Tls(e.to_string()))?;
        Ok(Self { client })
    }

    /// Perform a request, retrying transient failures.
    ///
    /// At most `max_retries + 1` attempts are made. A non-2xx status is a
    /// response, not an error.
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let mut attempt: u32 = 1;
        loop {
            match self.send_once(url, options).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt <= options.max_retries => {
                    let delay = backoff(options.retry_delay, attempt);
                    warn!(
                        url,
                        attempt,
                        max_retries = options.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(url, attempt, error = %e, "Fetch failed");
                    return Err(e);
                }
            }
        }
    }

    async fn send_once(&self, url: &str, options: &FetchOptions) -> Result<FetchResponse, FetchError> {
        let mut request = self
            .client
            .request(options.method.clone(), url)
            .timeout(options.timeout);
        for (name, value) in &options.headers {
            request = request.header(name.to_ascii_lowercase(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify(url, options.timeout, e))?;

        let status = response.status();
        let headers = collect_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| classify(url, options.timeout, e))?;

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            ok: status.is_success(),
            headers,
            body: body.to_vec(),
        })
    }
}

/// Delay before the retry that follows attempt `attempt`, saturating.
fn backoff(retry_delay: Duration, attempt: u32) -> Duration {
    retry_delay.checked_mul(attempt).unwrap_or(Duration::MAX)
}

fn collect_headers(map: &HeaderMap) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    headers
}

fn classify(url: &str, timeout: Duration, e: reqwest::Error) -> FetchError {
    if e.is_timeout() || io_kind(&e) == Some(io::ErrorKind::TimedOut) {
        return FetchError::Timeout {
            url: url.to_string(),
            timeout,
        };
    }
    if e.is_builder() {
        return FetchError::Request(error_chain(&e));
    }

    // DNS, TLS and certificate failures are connect errors too; only these retry
    let transient = matches!(
        io_kind(&e),
        Some(
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionRefused
                | io::ErrorKind::HostUnreachable
                | io::ErrorKind::NetworkUnreachable
        )
    );

    FetchError::Network {
        url: url.to_string(),
        message: error_chain(&e),
        transient,
    }
}

/// Kind of the innermost I/O error behind a request failure.
fn io_kind(e: &reqwest::Error) -> Option<io::ErrorKind> {
    let mut source = e.source();
    let mut kind = None;
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            kind = Some(io_err.kind());
        }
        source = err.source();
    }
    kind
}

fn error_chain(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
