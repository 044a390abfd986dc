//! Shallow structural check of the embedded state.
//!
//! Only the top level is checked. Malformed monitors, tags or maintenance
//! entries are tolerated here and dropped during deserialization.

use serde_json::Value;
use thiserror::Error;

/// Fields every `config` object must carry.
pub const REQUIRED_CONFIG_FIELDS: &[&str] = &["slug", "title", "description", "icon", "theme", "published"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("payload is not an object")]
    NotAnObject,
    #[error("`config` is missing or not an object")]
    MissingConfig,
    #[error("`config.{0}` is missing")]
    MissingField(&'static str),
    #[error("`config.theme` is not a string")]
    ThemeNotString,
    #[error("`{0}` is not an array")]
    NotAnArray(&'static str),
    #[error("`incident` is not an object")]
    IncidentNotObject,
}

/// Check the top-level shape, naming the first violation found.
pub fn validate(value: &Value) -> Result<(), SchemaViolation> {
    let root = value.as_object().ok_or(SchemaViolation::NotAnObject)?;
    let config = root
        .get("config")
        .and_then(Value::as_object)
        .ok_or(SchemaViolation::MissingConfig)?;

    if let Some(field) = REQUIRED_CONFIG_FIELDS.iter().find(|f| !config.contains_key(**f)) {
        return Err(SchemaViolation::MissingField(*field));
    }
    if !config["theme"].is_string() {
        return Err(SchemaViolation::ThemeNotString);
    }

    if !root.get("publicGroupList").is_some_and(Value::is_array) {
        return Err(SchemaViolation::NotAnArray("publicGroupList"));
    }
    match root.get("maintenanceList") {
        None | Some(Value::Null) | Some(Value::Array(_)) => {}
        Some(_) => return Err(SchemaViolation::NotAnArray("maintenanceList")),
    }
    match root.get("incident") {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => return Err(SchemaViolation::IncidentNotObject),
    }

    Ok(())
}

/// Whether `value` has the required top-level shape.
pub fn is_valid(value: &Value) -> bool {
    validate(value).is_ok()
}
