//! Monitor, group and heartbeat records.

use super::lenient::{flag, lenient_number_map, lenient_vec, lenient_vec_map, null_as_default};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Probe type of a monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MonitorKind {
    Http,
    Keyword,
    JsonQuery,
    Ping,
    Port,
    Dns,
    Push,
    Docker,
    Steam,
    Gamedig,
    Mqtt,
    KafkaProducer,
    SqlServer,
    Postgres,
    Mysql,
    Mongodb,
    Radius,
    Redis,
    Group,
    RealBrowser,
    TailscalePing,
    GrpcKeyword,
    Other(String),
}

impl MonitorKind {
    pub fn as_str(&self) -> &str {
        match self {
            MonitorKind::Http => "http",
            MonitorKind::Keyword => "keyword",
            MonitorKind::JsonQuery => "json-query",
            MonitorKind::Ping => "ping",
            MonitorKind::Port => "port",
            MonitorKind::Dns => "dns",
            MonitorKind::Push => "push",
            MonitorKind::Docker => "docker",
            MonitorKind::Steam => "steam",
            MonitorKind::Gamedig => "gamedig",
            MonitorKind::Mqtt => "mqtt",
            MonitorKind::KafkaProducer => "kafka-producer",
            MonitorKind::SqlServer => "sqlserver",
            MonitorKind::Postgres => "postgres",
            MonitorKind::Mysql => "mysql",
            MonitorKind::Mongodb => "mongodb",
            MonitorKind::Radius => "radius",
            MonitorKind::Redis => "redis",
            MonitorKind::Group => "group",
            MonitorKind::RealBrowser => "real-browser",
            MonitorKind::TailscalePing => "tailscale-ping",
            MonitorKind::GrpcKeyword => "grpc-keyword",
            MonitorKind::Other(name) => name,
        }
    }
}

impl Default for MonitorKind {
    fn default() -> Self {
        MonitorKind::Other(String::new())
    }
}

impl From<String> for MonitorKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "http" => MonitorKind::Http,
            "keyword" => MonitorKind::Keyword,
            "json-query" => MonitorKind::JsonQuery,
            "ping" => MonitorKind::Ping,
            "port" => MonitorKind::Port,
            "dns" => MonitorKind::Dns,
            "push" => MonitorKind::Push,
            "docker" => MonitorKind::Docker,
            "steam" => MonitorKind::Steam,
            "gamedig" => MonitorKind::Gamedig,
            "mqtt" => MonitorKind::Mqtt,
            "kafka-producer" => MonitorKind::KafkaProducer,
            "sqlserver" => MonitorKind::SqlServer,
            "postgres" => MonitorKind::Postgres,
            "mysql" => MonitorKind::Mysql,
            "mongodb" => MonitorKind::Mongodb,
            "radius" => MonitorKind::Radius,
            "redis" => MonitorKind::Redis,
            "group" => MonitorKind::Group,
            "real-browser" => MonitorKind::RealBrowser,
            "tailscale-ping" => MonitorKind::TailscalePing,
            "grpc-keyword" => MonitorKind::GrpcKeyword,
            _ => MonitorKind::Other(name),
        }
    }
}

impl From<MonitorKind> for String {
    fn from(kind: MonitorKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Annotation attached to a monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub monitor_id: i64,
    #[serde(default)]
    pub tag_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Monitor {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "flag")]
    pub send_url: bool,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: MonitorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_expiry_days_remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_cert: Option<bool>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorGroup {
    #[serde(default)]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub weight: i64,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub monitor_list: Vec<Monitor>,
}

/// Probe outcome code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum HeartbeatStatus {
    Down = 0,
    Up = 1,
    Pending = 2,
    Maintenance = 3,
}

impl TryFrom<i64> for HeartbeatStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(HeartbeatStatus::Down),
            1 => Ok(HeartbeatStatus::Up),
            2 => Ok(HeartbeatStatus::Pending),
            3 => Ok(HeartbeatStatus::Maintenance),
            other => Err(format!("unknown heartbeat status {}", other)),
        }
    }
}

impl From<HeartbeatStatus> for u8 {
    fn from(status: HeartbeatStatus) -> Self {
        status as u8
    }
}

/// A single probe result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub status: HeartbeatStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub msg: String,
    /// Latency in milliseconds
    #[serde(default)]
    pub ping: Option<f64>,
}

impl Heartbeat {
    /// Latency usable for statistics: present, finite and positive.
    pub fn latency(&self) -> Option<f64> {
        self.ping.filter(|p| p.is_finite() && *p > 0.0)
    }

    pub fn is_up(&self) -> bool {
        self.status == HeartbeatStatus::Up
    }
}

/// Heartbeats keyed by monitor id, oldest first.
pub type HeartbeatList = BTreeMap<String, Vec<Heartbeat>>;

/// Uptime ratios keyed by `{monitorId}_{windowHours}`.
pub type UptimeList = BTreeMap<String, f64>;

/// Key of an uptime ratio in the feed.
pub fn uptime_key(monitor_id: i64, window_hours: u32) -> String {
    format!("{}_{}", monitor_id, window_hours)
}

/// The heartbeat/uptime feed of one status page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringData {
    #[serde(deserialize_with = "lenient_vec_map")]
    pub heartbeat_list: HeartbeatList,
    #[serde(deserialize_with = "lenient_number_map")]
    pub uptime_list: UptimeList,
}

impl MonitoringData {
    pub fn heartbeats(&self, monitor_id: i64) -> &[Heartbeat] {
        self.heartbeat_list
            .get(&monitor_id.to_string())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn uptime(&self, monitor_id: i64, window_hours: u32) -> Option<f64> {
        self.uptime_list.get(&uptime_key(monitor_id, window_hours)).copied()
    }

    /// Attach explicit offsets to every heartbeat timestamp.
    pub fn normalize_timestamps(&mut self) {
        for heartbeats in self.heartbeat_list.values_mut() {
            for hb in heartbeats.iter_mut() {
                hb.time = crate::timezone::normalize(&hb.time);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_monitor_kind_roundtrip_names() {
        let kind: MonitorKind = serde_json::from_value(json!("json-query")).unwrap();
        assert_eq!(kind, MonitorKind::JsonQuery);

        let other: MonitorKind = serde_json::from_value(json!("smtp")).unwrap();
        assert_eq!(other, MonitorKind::Other("smtp".to_string()));
        assert_eq!(serde_json::to_value(&other).unwrap(), json!("smtp"));
    }

    #[test]
    fn test_group_drops_malformed_monitors() {
        let group: MonitorGroup = serde_json::from_value(json!({
            "id": 1,
            "name": "Services",
            "weight": 1,
            "monitorList": [
                { "id": 7, "name": "API", "type": "http", "url": "https://api.example.com", "sendUrl": 1 },
                "garbage",
                { "name": "missing id" },
                { "id": 8, "name": "DB", "type": "postgres", "tags": [{ "name": "prod", "color": "#f00" }, 5] }
            ]
        }))
        .unwrap();

        assert_eq!(group.monitor_list.len(), 2);
        assert!(group.monitor_list[0].send_url);
        assert_eq!(group.monitor_list[1].kind, MonitorKind::Postgres);
        assert_eq!(group.monitor_list[1].tags.len(), 1);
        assert_eq!(group.monitor_list[1].tags[0].value, None);
    }

    #[test]
    fn test_feed_drops_unknown_status() {
        let data: MonitoringData = serde_json::from_value(json!({
            "heartbeatList": {
                "7": [
                    { "status": 1, "time": "2024-01-01 12:00:00", "msg": "", "ping": 42 },
                    { "status": 9, "time": "2024-01-01 12:01:00", "msg": "", "ping": 40 },
                    { "status": 0, "time": "2024-01-01 12:02:00", "msg": "timeout", "ping": null }
                ]
            },
            "uptimeList": { "7_24": 0.5, "7_720": null }
        }))
        .unwrap();

        assert_eq!(data.heartbeats(7).len(), 2);
        assert_eq!(data.heartbeats(7)[1].status, HeartbeatStatus::Down);
        assert_eq!(data.uptime(7, 24), Some(0.5));
        assert_eq!(data.uptime(7, 720), None);
        assert!(data.heartbeats(99).is_empty());
    }

    #[test]
    fn test_latency_filters_zero_and_null() {
        let hb = |ping: Option<f64>| Heartbeat {
            status: HeartbeatStatus::Up,
            time: String::new(),
            msg: String::new(),
            ping,
        };
        assert_eq!(hb(Some(12.0)).latency(), Some(12.0));
        assert_eq!(hb(Some(0.0)).latency(), None);
        assert_eq!(hb(None).latency(), None);
    }
}
