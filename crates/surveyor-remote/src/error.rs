//! Mapping of HTTP failures onto `BackendError`

use reqwest::{Response, StatusCode};
use serde_json::Value;
use surveyor_core::BackendError;

pub(crate) fn transport(err: reqwest::Error) -> BackendError {
    if err.is_decode() {
        BackendError::Decode(err.to_string())
    } else if err.is_builder() {
        BackendError::InvalidRequest(err.to_string())
    } else {
        BackendError::Transport(err.to_string())
    }
}

/// Pass 2xx responses through, turn anything else into a typed error
pub(crate) async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> BackendError {
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });
    match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized,
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        _ => BackendError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

/// The human-readable part of a JSON error body. The store, the auth
/// endpoint and the inference service each use different keys.
pub(crate) fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "error_description", "msg", "error", "detail", "details"]
        .iter()
        .find_map(|key| match value.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::String(_) | Value::Null => None,
            other => Some(other.to_string()),
        })
}
