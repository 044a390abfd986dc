//! Ping statistics and latency tiers over heartbeat series.
//!
//! Nothing in here fails: a monitor without usable samples simply has no
//! statistics, which is the normal state of a freshly created monitor.

use crate::model::{Heartbeat, HeartbeatStatus, MonitorGroup, MonitoringData};

use serde::Serialize;
use std::collections::BTreeMap;

/// Nearest-rank latency distribution of a monitor's up heartbeats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PingStats {
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

/// Headline latency figures, rounded to whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingMetrics {
    pub latest: f64,
    pub average: f64,
    pub trimmed_average: f64,
}

fn sorted_up_latencies(heartbeats: &[Heartbeat]) -> Vec<f64> {
    let mut pings: Vec<f64> = heartbeats
        .iter()
        .filter(|hb| hb.is_up())
        .filter_map(Heartbeat::latency)
        .collect();
    pings.sort_by(f64::total_cmp);
    pings
}

/// Compute min/p25/p50/p75/max over up heartbeats with a latency.
///
/// Percentiles index the sorted samples at `floor(count * p)`.
pub fn calculate_ping_stats(heartbeats: &[Heartbeat]) -> Option<PingStats> {
    let pings = sorted_up_latencies(heartbeats);
    let last = pings.len().checked_sub(1)?;
    let at = |p: f64| pings[((pings.len() as f64 * p).floor() as usize).min(last)];

    Some(PingStats {
        min: pings[0],
        p25: at(0.25),
        p50: at(0.5),
        p75: at(0.75),
        max: pings[last],
    })
}

/// Latest latency plus plain and 10%-trimmed means of up latencies.
pub fn calculate_ping_metrics(heartbeats: &[Heartbeat]) -> Option<PingMetrics> {
    let pings = sorted_up_latencies(heartbeats);
    if pings.is_empty() {
        return None;
    }

    let n = pings.len() as f64;
    let start = (n * 0.1).floor() as usize;
    let end = ((n * 0.9).ceil() as usize).clamp(start + 1, pings.len());
    let trimmed = &pings[start..end];

    Some(PingMetrics {
        latest: heartbeats.last().and_then(Heartbeat::latency).unwrap_or(0.0),
        average: mean(&pings).round(),
        trimmed_average: mean(trimmed).round(),
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Upper bound of a latency tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    P25,
    P50,
    P75,
    Max,
    Millis(f64),
}

impl Cutoff {
    /// Concrete bound in milliseconds; statistic cutoffs need stats.
    pub fn resolve(&self, stats: Option<&PingStats>) -> Option<f64> {
        match self {
            Cutoff::Millis(ms) => Some(*ms),
            Cutoff::P25 => stats.map(|s| s.p25),
            Cutoff::P50 => stats.map(|s| s.p50),
            Cutoff::P75 => stats.map(|s| s.p75),
            Cutoff::Max => stats.map(|s| s.max),
        }
    }
}

/// Cutoffs separating excellent, good and normal latencies.
#[derive(Debug, Clone, PartialEq)]
pub struct TierPolicy {
    pub excellent: Cutoff,
    pub good: Cutoff,
}

impl TierPolicy {
    /// Relative to the monitor's own distribution: excellent up to the
    /// median, good up to the third quartile.
    pub fn percentile() -> Self {
        Self {
            excellent: Cutoff::P50,
            good: Cutoff::P75,
        }
    }

    /// Global thresholds of 100 ms and 200 ms.
    pub fn fixed() -> Self {
        Self {
            excellent: Cutoff::Millis(100.0),
            good: Cutoff::Millis(200.0),
        }
    }
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::percentile()
    }
}

/// Display bucket of a single heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyTier {
    Excellent,
    Good,
    Normal,
    Warning,
    Maintenance,
    Error,
}

/// Classify a heartbeat.
///
/// Non-up statuses map to fixed tiers. Up heartbeats that cannot be placed
/// (no latency, or no statistics for a relative policy) are excellent.
pub fn classify(heartbeat: &Heartbeat, stats: Option<&PingStats>, policy: &TierPolicy) -> LatencyTier {
    match heartbeat.status {
        HeartbeatStatus::Down => return LatencyTier::Error,
        HeartbeatStatus::Pending => return LatencyTier::Warning,
        HeartbeatStatus::Maintenance => return LatencyTier::Maintenance,
        HeartbeatStatus::Up => {}
    }

    let Some(latency) = heartbeat.latency() else {
        return LatencyTier::Excellent;
    };
    let (Some(excellent), Some(good)) = (policy.excellent.resolve(stats), policy.good.resolve(stats)) else {
        return LatencyTier::Excellent;
    };

    if latency <= excellent {
        LatencyTier::Excellent
    } else if latency <= good {
        LatencyTier::Good
    } else {
        LatencyTier::Normal
    }
}

/// Derived figures for one monitor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatistics {
    pub uptime_24h: Option<f64>,
    pub uptime_720h: Option<f64>,
    pub ping_stats: Option<PingStats>,
    pub metrics: Option<PingMetrics>,
    /// One tier per heartbeat in the statistics window, oldest first
    pub tiers: Vec<LatencyTier>,
    pub latest_status: Option<HeartbeatStatus>,
}

impl MonitorStatistics {
    /// Compute statistics over the most recent `window` heartbeats of a monitor.
    pub fn compute(monitor_id: i64, data: &MonitoringData, window: usize, policy: &TierPolicy) -> Self {
        let heartbeats = data.heartbeats(monitor_id);
        let recent = &heartbeats[heartbeats.len().saturating_sub(window)..];
        let ping_stats = calculate_ping_stats(recent);

        Self {
            uptime_24h: data.uptime(monitor_id, 24),
            uptime_720h: data.uptime(monitor_id, 720),
            metrics: calculate_ping_metrics(recent),
            tiers: recent
                .iter()
                .map(|hb| classify(hb, ping_stats.as_ref(), policy))
                .collect(),
            latest_status: heartbeats.last().map(|hb| hb.status),
            ping_stats,
        }
    }
}

/// Statistics for every monitor listed in `groups`, keyed by monitor id.
pub fn aggregate(
    groups: &[MonitorGroup],
    data: &MonitoringData,
    window: usize,
    policy: &TierPolicy,
) -> BTreeMap<String, MonitorStatistics> {
    groups
        .iter()
        .flat_map(|group| &group.monitor_list)
        .map(|monitor| {
            (
                monitor.id.to_string(),
                MonitorStatistics::compute(monitor.id, data, window, policy),
            )
        })
        .collect()
}

/// Overall health level of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLevel {
    #[default]
    Normal,
    Warning,
    Error,
}

/// Counts of monitors by latest status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub up: usize,
    pub down: usize,
    pub pending: usize,
    pub maintenance: usize,
    pub level: SummaryLevel,
}

impl StatusSummary {
    pub fn from_statistics(statistics: &BTreeMap<String, MonitorStatistics>) -> Self {
        let mut summary = StatusSummary::default();
        for status in statistics.values().filter_map(|s| s.latest_status) {
            summary.total += 1;
            match status {
                HeartbeatStatus::Up => summary.up += 1,
                HeartbeatStatus::Down => summary.down += 1,
                HeartbeatStatus::Pending => summary.pending += 1,
                HeartbeatStatus::Maintenance => summary.maintenance += 1,
            }
        }

        summary.level = if summary.total > 0 && summary.down == summary.total {
            SummaryLevel::Error
        } else if summary.down > 0 || summary.pending > 0 {
            SummaryLevel::Warning
        } else {
            SummaryLevel::Normal
        };
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hb(status: HeartbeatStatus, ping: Option<f64>) -> Heartbeat {
        Heartbeat {
            status,
            time: "2024-01-01 12:00:00".to_string(),
            msg: String::new(),
            ping,
        }
    }

    fn up(ping: f64) -> Heartbeat {
        hb(HeartbeatStatus::Up, Some(ping))
    }

    #[test]
    fn test_stats_ignore_non_up() {
        let series = vec![up(50.0), up(100.0), up(150.0), hb(HeartbeatStatus::Down, None)];
        let stats = calculate_ping_stats(&series).unwrap();
        assert_eq!(
            stats,
            PingStats {
                min: 50.0,
                p25: 50.0,
                p50: 100.0,
                p75: 150.0,
                max: 150.0
            }
        );
        assert_eq!(classify(&series[3], Some(&stats), &TierPolicy::default()), LatencyTier::Error);
    }

    #[test]
    fn test_stats_absent_without_up_samples() {
        assert!(calculate_ping_stats(&[]).is_none());
        assert!(calculate_ping_metrics(&[]).is_none());

        let down = vec![
            hb(HeartbeatStatus::Down, Some(30.0)),
            hb(HeartbeatStatus::Pending, Some(40.0)),
            hb(HeartbeatStatus::Maintenance, None),
        ];
        assert!(calculate_ping_stats(&down).is_none());
        assert!(calculate_ping_metrics(&down).is_none());
    }

    #[test]
    fn test_metrics_trim_outliers() {
        let mut series: Vec<_> = [5.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 500.0]
            .into_iter()
            .map(up)
            .collect();
        series.push(hb(HeartbeatStatus::Down, None));

        let metrics = calculate_ping_metrics(&series).unwrap();
        assert_eq!(metrics.latest, 0.0);
        assert_eq!(metrics.average, 59.0);
        assert_eq!(metrics.trimmed_average, 10.0);

        let single = calculate_ping_metrics(&[up(42.4)]).unwrap();
        assert_eq!((single.latest, single.average, single.trimmed_average), (42.4, 42.0, 42.0));
    }

    #[test]
    fn test_percentile_tiers() {
        let series: Vec<_> = [10.0, 20.0, 30.0, 40.0].into_iter().map(up).collect();
        let stats = calculate_ping_stats(&series).unwrap();
        let policy = TierPolicy::percentile();
        let tiers: Vec<_> = series.iter().map(|h| classify(h, Some(&stats), &policy)).collect();
        // p50 = 30, p75 = 40
        assert_eq!(
            tiers,
            vec![LatencyTier::Excellent, LatencyTier::Excellent, LatencyTier::Excellent, LatencyTier::Good]
        );
        assert_eq!(classify(&up(41.0), Some(&stats), &policy), LatencyTier::Normal);
    }

    #[test]
    fn test_fixed_tiers_and_defaults() {
        let policy = TierPolicy::fixed();
        assert_eq!(classify(&up(100.0), None, &policy), LatencyTier::Excellent);
        assert_eq!(classify(&up(150.0), None, &policy), LatencyTier::Good);
        assert_eq!(classify(&up(250.0), None, &policy), LatencyTier::Normal);

        let percentile = TierPolicy::percentile();
        assert_eq!(classify(&up(999.0), None, &percentile), LatencyTier::Excellent);
        assert_eq!(
            classify(&hb(HeartbeatStatus::Up, None), None, &policy),
            LatencyTier::Excellent
        );
        assert_eq!(
            classify(&hb(HeartbeatStatus::Pending, Some(1.0)), None, &policy),
            LatencyTier::Warning
        );
        assert_eq!(
            classify(&hb(HeartbeatStatus::Maintenance, None), None, &policy),
            LatencyTier::Maintenance
        );
    }

    fn fixture() -> (Vec<MonitorGroup>, MonitoringData) {
        let groups: Vec<MonitorGroup> = serde_json::from_value(json!([
            { "id": 1, "name": "Core", "monitorList": [{ "id": 1, "name": "API" }, { "id": 2, "name": "DB" }] },
            { "id": 2, "name": "Edge", "monitorList": [{ "id": 3, "name": "CDN" }] }
        ]))
        .unwrap();
        let data: MonitoringData = serde_json::from_value(json!({
            "heartbeatList": {
                "1": [
                    { "status": 1, "time": "2024-01-01 12:00:00", "msg": "", "ping": 900 },
                    { "status": 1, "time": "2024-01-01 12:01:00", "msg": "", "ping": 20 },
                    { "status": 1, "time": "2024-01-01 12:02:00", "msg": "", "ping": 30 }
                ],
                "2": [
                    { "status": 0, "time": "2024-01-01 12:02:00", "msg": "refused", "ping": null }
                ]
            },
            "uptimeList": { "1_24": 0.9987, "1_720": 0.95, "2_24": 0 }
        }))
        .unwrap();
        (groups, data)
    }

    #[test]
    fn test_aggregate_window_and_uptime() {
        let (groups, data) = fixture();
        let stats = aggregate(&groups, &data, 2, &TierPolicy::default());

        assert_eq!(stats.len(), 3);
        let api = &stats["1"];
        assert_eq!(api.uptime_24h, Some(0.9987));
        assert_eq!(api.uptime_720h, Some(0.95));
        assert_eq!(api.ping_stats.unwrap().max, 30.0);
        assert_eq!(api.tiers.len(), 2);
        assert_eq!(api.latest_status, Some(HeartbeatStatus::Up));

        let cdn = &stats["3"];
        assert!(cdn.ping_stats.is_none());
        assert!(cdn.tiers.is_empty());
        assert_eq!(cdn.latest_status, None);
    }

    #[test]
    fn test_summary_levels() {
        let (groups, data) = fixture();
        let stats = aggregate(&groups, &data, 50, &TierPolicy::default());
        let summary = StatusSummary::from_statistics(&stats);
        assert_eq!((summary.total, summary.up, summary.down), (2, 1, 1));
        assert_eq!(summary.level, SummaryLevel::Warning);

        let only_db: BTreeMap<_, _> = stats.into_iter().filter(|(k, _)| k == "2").collect();
        assert_eq!(StatusSummary::from_statistics(&only_db).level, SummaryLevel::Error);
        assert_eq!(StatusSummary::from_statistics(&BTreeMap::new()).level, SummaryLevel::Normal);
    }

    #[test]
    fn test_statistics_wire_names() {
        let (groups, data) = fixture();
        let stats = aggregate(&groups, &data, 50, &TierPolicy::default());
        let value = serde_json::to_value(&stats["1"]).unwrap();
        assert_eq!(value["uptime24h"], json!(0.9987));
        assert!(value.get("pingStats").is_some());
        assert_eq!(value["tiers"][1], json!("excellent"));
    }
}
