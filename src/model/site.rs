//! Site-level records: configuration, incident banner, preload payload.

use super::lenient::{flag, lenient_option, lenient_vec, null_as_default};
use super::maintenance::{Maintenance, MaintenanceView};
use super::monitor::MonitorGroup;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Color scheme preference of the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    /// Map an upstream theme name; anything unrecognized follows the system.
    pub fn from_name(name: &str) -> Self {
        match name {
            "dark" => Theme::Dark,
            "light" => Theme::Light,
            _ => Theme::System,
        }
    }
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value.as_str().map(Theme::from_name).unwrap_or_default())
    }
}

/// Status page configuration as published by the upstream server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    #[serde(deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub icon: String,
    pub theme: Theme,
    #[serde(deserialize_with = "flag")]
    pub published: bool,
    #[serde(deserialize_with = "flag")]
    pub show_tags: bool,
    #[serde(rename = "customCSS", deserialize_with = "null_as_default")]
    pub custom_css: String,
    #[serde(deserialize_with = "null_as_default")]
    pub footer_text: String,
    #[serde(deserialize_with = "flag")]
    pub show_powered_by: bool,
    pub google_analytics_id: Option<String>,
    #[serde(deserialize_with = "flag")]
    pub show_certificate_expiry: bool,
}

impl Default for SiteConfig {
    /// The safe default served when the upstream page cannot be used.
    fn default() -> Self {
        Self {
            slug: String::new(),
            title: String::new(),
            description: String::new(),
            icon: "/favicon.ico".to_string(),
            theme: Theme::System,
            published: true,
            show_tags: false,
            custom_css: String::new(),
            footer_text: String::new(),
            show_powered_by: false,
            google_analytics_id: None,
            show_certificate_expiry: false,
        }
    }
}

/// Severity of the incident banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentStyle {
    #[default]
    Info,
    Warning,
    Danger,
    Primary,
    Light,
    Dark,
}

impl<'de> Deserialize<'de> for IncidentStyle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value.as_str() {
            Some("warning") => IncidentStyle::Warning,
            Some("danger") => IncidentStyle::Danger,
            Some("primary") => IncidentStyle::Primary,
            Some("light") => IncidentStyle::Light,
            Some("dark") => IncidentStyle::Dark,
            _ => IncidentStyle::Info,
        })
    }
}

/// Pinned announcement shown above the monitor list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub style: IncidentStyle,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "flag")]
    pub pin: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_date: String,
    #[serde(default)]
    pub last_updated_date: Option<String>,
}

impl Incident {
    /// Attach explicit offsets to the incident timestamps.
    pub fn normalize_timestamps(&mut self) {
        self.created_date = crate::timezone::normalize(&self.created_date);
        if let Some(updated) = self.last_updated_date.as_mut() {
            *updated = crate::timezone::normalize(updated);
        }
    }
}

/// The embedded state object of the upstream status page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadData {
    pub config: SiteConfig,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub public_group_list: Vec<MonitorGroup>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub maintenance_list: Vec<Maintenance>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub incident: Option<Incident>,
}

impl PreloadData {
    /// Rewrite every naive timestamp into an absolute one.
    pub fn normalize_timestamps(&mut self) {
        if let Some(incident) = self.incident.as_mut() {
            incident.normalize_timestamps();
        }
        for maintenance in &mut self.maintenance_list {
            maintenance.normalize_timeslots();
        }
    }
}

/// Result of the global configuration query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    pub config: SiteConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident: Option<Incident>,
    pub maintenance_list: Vec<MaintenanceView>,
}

impl GlobalConfig {
    /// Safe default: neutral configuration, no announcements.
    pub fn fallback() -> Self {
        Self {
            config: SiteConfig::default(),
            incident: None,
            maintenance_list: Vec::new(),
        }
    }
}
