//! Maintenance windows and their derived status.

use super::lenient::{flag, lenient_vec, null_as_default};
use crate::timezone;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A wall-clock time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hours: u32,
    pub minutes: u32,
}

/// One concrete occurrence of a maintenance window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_date: String,
}

impl TimeSlot {
    /// Start and end as absolute instants, if both parse.
    pub fn bounds(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let start = timezone::parse_instant(&self.start_date)?;
        let end = timezone::parse_instant(&self.end_date)?;
        Some((start, end))
    }
}

/// Derived state of a maintenance window, computed against the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaintenanceStatus {
    Scheduled,
    UnderMaintenance,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub strategy: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interval_day: i64,
    #[serde(default, deserialize_with = "flag")]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date_range: Vec<Option<String>>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub time_range: Vec<TimeOfDay>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub weekdays: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub days_of_month: Vec<Value>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub timeslot_list: Vec<TimeSlot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cron: String,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timezone: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timezone_option: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timezone_offset: String,
}

impl Maintenance {
    /// Offset the window's wall-clock values are expressed in (UTC when unset).
    pub fn offset(&self) -> FixedOffset {
        timezone::parse_offset(&self.timezone_offset).unwrap_or_else(timezone::utc)
    }

    /// Rewrite timeslot bounds into absolute timestamps in the window's offset.
    ///
    /// The upstream stamps local wall-clock values with `+0000`, so that
    /// marker is dropped before the window's own offset is applied.
    pub fn normalize_timeslots(&mut self) {
        let offset = self.offset();
        for slot in &mut self.timeslot_list {
            slot.start_date =
                timezone::normalize_with_offset(timezone::strip_utc_marker(&slot.start_date), offset);
            slot.end_date =
                timezone::normalize_with_offset(timezone::strip_utc_marker(&slot.end_date), offset);
        }
    }

    /// Status of the window at `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> MaintenanceStatus {
        if !self.active {
            return MaintenanceStatus::Ended;
        }

        if self.timeslot_list.is_empty() {
            // Manual windows have no schedule and run until switched off
            return MaintenanceStatus::UnderMaintenance;
        }

        let slots: Vec<_> = self.timeslot_list.iter().filter_map(TimeSlot::bounds).collect();

        if slots.iter().any(|(start, end)| *start <= now && now < *end) {
            MaintenanceStatus::UnderMaintenance
        } else if slots.iter().any(|(start, _)| *start > now) {
            MaintenanceStatus::Scheduled
        } else {
            MaintenanceStatus::Ended
        }
    }

    /// Pair the window with its status at `now` for presentation.
    pub fn view_at(&self, now: DateTime<Utc>) -> MaintenanceView {
        MaintenanceView {
            status: self.status_at(now),
            maintenance: self.clone(),
        }
    }
}

/// A maintenance window together with its status at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceView {
    #[serde(flatten)]
    pub maintenance: Maintenance,
    pub status: MaintenanceStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn window(offset: &str, slots: &[(&str, &str)]) -> Maintenance {
        let mut m: Maintenance = serde_json::from_value(json!({
            "id": 1,
            "title": "DB upgrade",
            "strategy": "single",
            "active": true,
            "timezoneOffset": offset,
            "timeslotList": slots
                .iter()
                .map(|(s, e)| json!({ "startDate": s, "endDate": e }))
                .collect::<Vec<_>>(),
            "status": "scheduled"
        }))
        .unwrap();
        m.normalize_timeslots();
        m
    }

    #[test]
    fn test_timeslots_use_window_offset() {
        let m = window("+08:00", &[("2025-04-22 13:00:00 +0000", "2025-04-22 14:00:00")]);
        assert_eq!(m.timeslot_list[0].start_date, "2025-04-22 13:00:00+0800");
        assert_eq!(m.timeslot_list[0].end_date, "2025-04-22 14:00:00+0800");

        let (start, _) = m.timeslot_list[0].bounds().unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 4, 22, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_status_transitions() {
        let m = window("+00:00", &[("2025-04-22 13:00:00", "2025-04-22 14:00:00")]);

        let before = Utc.with_ymd_and_hms(2025, 4, 22, 12, 0, 0).unwrap();
        let during = Utc.with_ymd_and_hms(2025, 4, 22, 13, 30, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 4, 22, 14, 0, 0).unwrap();

        assert_eq!(m.status_at(before), MaintenanceStatus::Scheduled);
        assert_eq!(m.status_at(during), MaintenanceStatus::UnderMaintenance);
        assert_eq!(m.status_at(after), MaintenanceStatus::Ended);
    }

    #[test]
    fn test_inactive_and_manual_windows() {
        let now = Utc.with_ymd_and_hms(2025, 4, 22, 13, 30, 0).unwrap();

        let mut manual = window("", &[]);
        assert_eq!(manual.status_at(now), MaintenanceStatus::UnderMaintenance);

        manual.active = false;
        assert_eq!(manual.status_at(now), MaintenanceStatus::Ended);
    }

    #[test]
    fn test_view_serializes_derived_status() {
        let m = window("+00:00", &[("2025-04-22 13:00:00", "2025-04-22 14:00:00")]);
        let now = Utc.with_ymd_and_hms(2025, 4, 22, 13, 30, 0).unwrap();
        let value = serde_json::to_value(m.view_at(now)).unwrap();
        assert_eq!(value["status"], json!("under-maintenance"));
        assert_eq!(value["title"], json!("DB upgrade"));
    }
}
