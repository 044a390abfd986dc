//! HTTP request handlers.

use super::AppState;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Shared caches may serve the page and feed queries for five minutes.
pub const LIST_CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=300";
pub const DETAIL_CACHE_CONTROL: &str = "public, s-maxage=60, stale-while-revalidate=60";
pub const NO_STORE: &str = "no-store, no-cache, must-revalidate, proxy-revalidate";

// ============================================================================
// Envelope
// ============================================================================

/// Merge `success` and a millisecond `timestamp` into the payload object.
fn success<T: Serialize>(payload: &T, cache_control: &'static str) -> Response {
    let mut body = match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    body.insert("success".to_string(), Value::Bool(true));
    body.insert("timestamp".to_string(), json!(Utc::now().timestamp_millis()));

    ([(header::CACHE_CONTROL, cache_control)], Json(Value::Object(body))).into_response()
}

fn failure(status: StatusCode, message: &str) -> Response {
    (
        status,
        [(header::CACHE_CONTROL, NO_STORE)],
        Json(json!({
            "success": false,
            "error": message,
            "timestamp": Utc::now().timestamp_millis(),
        })),
    )
        .into_response()
}

// ============================================================================
// API
// ============================================================================

pub async fn handle_config(State(state): State<AppState>) -> Response {
    let service = state.service.clone();
    let config = state
        .config_cache
        .get_or_refresh(|| async move { std::sync::Arc::new(service.get_global_config().await) })
        .await;
    success(config.as_ref(), LIST_CACHE_CONTROL)
}

pub async fn handle_monitoring(State(state): State<AppState>) -> Response {
    let snapshot = state.monitoring_snapshot().await;
    success(snapshot.as_ref(), LIST_CACHE_CONTROL)
}

pub async fn handle_monitor(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<i64>() else {
        return failure(StatusCode::NOT_FOUND, "monitor not found");
    };

    match state.monitoring_snapshot().await.monitor(id) {
        Some(detail) => success(&detail, DETAIL_CACHE_CONTROL),
        None => failure(StatusCode::NOT_FOUND, "monitor not found"),
    }
}

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    (
        [
            (header::CACHE_CONTROL, NO_STORE),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        Json(json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339(),
            "uptime": state.started.elapsed().as_secs_f64(),
        })),
    )
}

pub async fn handle_not_found() -> Response {
    failure(StatusCode::NOT_FOUND, "not found")
}
