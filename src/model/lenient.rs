//! Tolerant deserializers for upstream payload fields.
//!
//! The upstream page is rendered for its own front end, so optional fields
//! drift between versions. These helpers drop a malformed element instead
//! of failing the enclosing record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Treat `null` the same as an absent field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept `true`/`false` as well as numeric flags (`0`/`1`).
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.as_str(), "1" | "true"),
        _ => false,
    })
}

/// Deserialize an array, dropping elements that do not fit `T`.
/// A non-array value yields an empty list.
pub fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(collect_lenient(Value::deserialize(deserializer)?))
}

/// Deserialize an optional record, treating a malformed one as absent.
pub fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value => match serde_json::from_value(value) {
            Ok(item) => Ok(Some(item)),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    kind = std::any::type_name::<T>(),
                    "Dropping malformed record"
                );
                Ok(None)
            }
        },
    }
}

/// Deserialize an object of arrays, keeping every key and dropping
/// malformed elements inside each array.
pub fn lenient_vec_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| (key, collect_lenient(value)))
        .collect())
}

/// Deserialize an object of numbers, dropping non-numeric entries.
pub fn lenient_number_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(key, value)| value.as_f64().map(|n| (key, n)))
        .collect())
}

fn collect_lenient<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    kind = std::any::type_name::<T>(),
                    "Dropping malformed element"
                );
                None
            }
        })
        .collect()
}
