//! Defensive decoding of the `{success, data}` / `{success, error}` envelope.
//!
//! Non-2xx bodies may be empty, HTML, or JSON; whatever can be read is kept
//! and the rest is ignored. Link responses come in two shapes (`data` holding
//! the URL, or a top-level `download_url`) and are normalized here.

use serde::Deserialize;
use serde_json::Value;

use super::error::ApiError;
use super::transport::ApiResponse;
use crate::item::Item;

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    download_url: Option<Value>,
}

fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Parse the envelope, turning non-2xx and `success: false` into errors.
fn open(resp: &ApiResponse) -> Result<Envelope, ApiError> {
    if !resp.is_success() {
        let env: Envelope = serde_json::from_slice(&resp.body).unwrap_or_default();
        return Err(ApiError::Status {
            status: resp.status,
            error: text(env.error),
            detail: text(env.detail),
        });
    }

    let env: Envelope = serde_json::from_slice(&resp.body)
        .map_err(|e| ApiError::Malformed(format!("invalid JSON envelope: {e}")))?;
    if env.success == Some(false) {
        return Err(ApiError::Rejected {
            error: text(env.error),
            detail: text(env.detail),
        });
    }
    Ok(env)
}

/// Decode a list response. A missing or null `data` is an empty list; any other
/// non-array payload, or a record that is not an item, fails validation.
pub fn decode_items(resp: &ApiResponse) -> Result<Vec<Item>, ApiError> {
    let env = open(resp)?;
    match env.data {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(records)) => records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                serde_json::from_value::<Item>(record)
                    .map_err(|e| ApiError::Validation(format!("record {i} is not an item: {e}")))
            })
            .collect(),
        Some(other) => Err(ApiError::Validation(format!(
            "expected a list of items, got {}",
            kind_of(&other)
        ))),
    }
}

/// Decode a download-link response into the issued URL.
pub fn decode_link(resp: &ApiResponse) -> Result<String, ApiError> {
    let env = open(resp)?;
    let url = match env.data {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => text(env.download_url),
    };
    url.ok_or_else(|| ApiError::Malformed("response carried no download URL".to_string()))
}

/// Decode a control response; only `success` matters.
pub fn decode_ack(resp: &ApiResponse) -> Result<(), ApiError> {
    if resp.is_success() && resp.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    open(resp).map(|_| ())
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
