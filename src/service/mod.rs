//! Read-only queries over the upstream status page.
//!
//! Every query has a fallible `try_*` form that propagates the failure and
//! an infallible form that logs it and serves a safe default instead.

use crate::config::ServerConfig;
use crate::extract::{self, ExtractionError, SchemaViolation};
use crate::fetch::{FetchClient, FetchError, FetchOptions};
use crate::model::{uptime_key, GlobalConfig, Monitor, MonitorGroup, MonitoringData, PreloadData};
use crate::stats::{self, MonitorStatistics, StatusSummary};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Service error types.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("network error: {0}")]
    Network(#[from] FetchError),
    #[error("upstream returned status {status} for {url}")]
    UpstreamStatus { url: String, status: u16 },
    #[error("embedded state element not found at {0}")]
    MissingMarkup(String),
    #[error("extraction failed: {0}")]
    Extraction(ExtractionError),
    #[error("embedded state has an unexpected shape: {0}")]
    Schema(SchemaViolation),
    #[error("malformed heartbeat feed: {0}")]
    Feed(String),
}

impl From<ExtractionError> for ServiceError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::Schema(v) => ServiceError::Schema(v),
            other => ServiceError::Extraction(other),
        }
    }
}

/// Monitor groups, their raw feed and the figures derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSnapshot {
    pub monitor_groups: Vec<MonitorGroup>,
    pub data: MonitoringData,
    pub statistics: BTreeMap<String, MonitorStatistics>,
    pub summary: StatusSummary,
}

impl MonitoringSnapshot {
    /// One monitor with its heartbeats and 24h uptime (0 when unknown).
    pub fn monitor(&self, id: i64) -> Option<MonitorDetail> {
        let monitor = self
            .monitor_groups
            .iter()
            .flat_map(|group| &group.monitor_list)
            .find(|m| m.id == id)?
            .clone();

        let mut data = MonitoringData::default();
        data.heartbeat_list
            .insert(id.to_string(), self.data.heartbeats(id).to_vec());
        data.uptime_list
            .insert(uptime_key(id, 24), self.data.uptime(id, 24).unwrap_or(0.0));

        Some(MonitorDetail { monitor, data })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorDetail {
    pub monitor: Monitor,
    pub data: MonitoringData,
}

/// Validate and decode the heartbeat/uptime feed.
pub fn parse_feed(body: Value) -> Result<MonitoringData, ServiceError> {
    let root = body
        .as_object()
        .ok_or_else(|| ServiceError::Feed("body is not an object".to_string()))?;
    for key in ["heartbeatList", "uptimeList"] {
        if !root.get(key).is_some_and(Value::is_object) {
            return Err(ServiceError::Feed(format!("`{}` is missing or not an object", key)));
        }
    }
    serde_json::from_value(body).map_err(|e| ServiceError::Feed(e.to_string()))
}

/// Entry point over fetch, extraction and aggregation.
pub struct StatusService {
    config: Arc<ServerConfig>,
    client: FetchClient,
    options: FetchOptions,
}

impl StatusService {
    pub fn new(config: Arc<ServerConfig>) -> Result<Self, FetchError> {
        Ok(Self {
            client: FetchClient::new(config.dev_mode)?,
            options: FetchOptions::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Site configuration, incident and maintenance; never fails.
    pub async fn get_global_config(&self) -> GlobalConfig {
        match self.try_global_config(Utc::now()).await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Serving default site configuration");
                GlobalConfig::fallback()
            }
        }
    }

    /// Monitor groups with heartbeats, uptime and statistics; never fails.
    pub async fn get_monitoring_data(&self) -> MonitoringSnapshot {
        match self.try_monitoring_data().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Serving empty monitoring data");
                MonitoringSnapshot::default()
            }
        }
    }

    pub async fn try_global_config(&self, now: DateTime<Utc>) -> Result<GlobalConfig, ServiceError> {
        let preload = self.load_preload().await?;
        Ok(GlobalConfig {
            maintenance_list: preload
                .maintenance_list
                .iter()
                .map(|m| m.view_at(now))
                .collect(),
            config: preload.config,
            incident: preload.incident,
        })
    }

    pub async fn try_monitoring_data(&self) -> Result<MonitoringSnapshot, ServiceError> {
        let (preload, feed) = tokio::join!(self.load_preload(), self.load_feed());
        let (preload, data) = (preload?, feed?);

        let statistics = stats::aggregate(
            &preload.public_group_list,
            &data,
            self.config.stats_window,
            &self.config.tier_policy,
        );
        let summary = StatusSummary::from_statistics(&statistics);

        Ok(MonitoringSnapshot {
            monitor_groups: preload.public_group_list,
            data,
            statistics,
            summary,
        })
    }

    /// Fetch the status page and extract its embedded state.
    pub async fn load_preload(&self) -> Result<PreloadData, ServiceError> {
        let url = self.config.html_endpoint();
        let html = self.fetch_ok(&url).await?.text()?;

        let script =
            extract::find_preload_script(&html).ok_or_else(|| ServiceError::MissingMarkup(url.clone()))?;
        let mut preload = extract::extract(&extract::sanitize(script))?;
        preload.normalize_timestamps();

        debug!(
            groups = preload.public_group_list.len(),
            maintenance = preload.maintenance_list.len(),
            "Loaded status page"
        );
        Ok(preload)
    }

    /// Fetch the heartbeat/uptime feed.
    pub async fn load_feed(&self) -> Result<MonitoringData, ServiceError> {
        let url = self.config.api_endpoint();
        let body: Value = self
            .fetch_ok(&url)
            .await?
            .json()
            .map_err(|e| ServiceError::Feed(e.to_string()))?;

        let mut data = parse_feed(body)?;
        data.normalize_timestamps();
        Ok(data)
    }

    async fn fetch_ok(&self, url: &str) -> Result<crate::fetch::FetchResponse, ServiceError> {
        let response = self.client.fetch(url, &self.options).await?;
        if !response.ok {
            return Err(ServiceError::UpstreamStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }
}
