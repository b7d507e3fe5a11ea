//! Lenient body decoding for provider responses and inbound callbacks.

use serde_json::{json, Value};

/// Decode a provider response body, wrapping non-JSON text as `{"raw": text}`.
pub fn response_body(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "raw": text }))
}

/// Decode an inbound callback body.
///
/// Anything that is not a JSON value (or is JSON `null`) is wrapped as
/// `{"raw_body": text}` so it can still be logged.
pub fn callback_payload(body: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) | Err(_) => json!({ "raw_body": String::from_utf8_lossy(body) }),
        Ok(value) => value,
    }
}
