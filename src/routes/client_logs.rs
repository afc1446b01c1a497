use axum::{body::Bytes, http::StatusCode};
use serde_json::Value;

use crate::error::AppError;

fn field<'a>(entry: &'a serde_json::Map<String, Value>, name: &str) -> &'a str {
    entry.get(name).and_then(Value::as_str).unwrap_or_default()
}

/// Sink for browser and edge-middleware telemetry. Any JSON object is
/// accepted; its fields are re-emitted as a tracing event.
#[utoipa::path(
    post,
    path = "/api/client-logs",
    request_body(content = String, content_type = "application/json",
        description = "{ level, message, stack?, ip?, ua? }"),
    responses(
        (status = 204, description = "Logged"),
        (status = 400, description = "Body is not a JSON object")
    ),
    tag = "Telemetry"
)]
pub async fn client_logs(body: Bytes) -> Result<StatusCode, AppError> {
    let entry = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(entry)) => entry,
        _ => return Err(AppError::BadRequest("Expected a JSON object".to_string())),
    };

    let message = field(&entry, "message");
    let stack = field(&entry, "stack");
    let ip = field(&entry, "ip");
    let ua = field(&entry, "ua");

    match field(&entry, "level") {
        "error" => tracing::error!(target: "client", client_message = message, stack, ip, ua, "client log"),
        "warn" => tracing::warn!(target: "client", client_message = message, stack, ip, ua, "client log"),
        "debug" => tracing::debug!(target: "client", client_message = message, stack, ip, ua, "client log"),
        level => tracing::info!(target: "client", level, client_message = message, stack, ip, ua, "client log"),
    }

    Ok(StatusCode::NO_CONTENT)
}
