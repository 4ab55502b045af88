//! Response-shape normalization
//!
//! The API is not consistent about how it wraps payloads: the same endpoint
//! may answer with the bare value or with `{ "data": value }`, the recharge
//! count may be `{ "nbChargements": n }` or a bare number, and `/auth/me` may
//! answer `{ "user": ... }` or the user itself. Every body goes through this
//! module once, at the gateway boundary, so nothing above it has to guess.
//!
//! All functions are pure (no I/O) for easy testing.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::LedgerError;

/// Field holding the recharge count
const LOAD_COUNT_FIELD: &str = "nbChargements";

/// Parse a body, unwrapping a `data` envelope if present
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T, LedgerError> {
    let value = unwrap_key(parse(body)?, "data");
    Ok(serde_json::from_value(value)?)
}

/// Parse a body that may additionally wrap its payload under `key`
pub fn decode_keyed<T: DeserializeOwned>(body: &str, key: &str) -> Result<T, LedgerError> {
    let value = unwrap_key(unwrap_key(parse(body)?, "data"), key);
    Ok(serde_json::from_value(value)?)
}

/// Parse a recharge count; a missing or unreadable count is zero
pub fn decode_load_count(body: &str) -> Result<u64, LedgerError> {
    let value = unwrap_key(parse(body)?, "data");
    let count = match &value {
        Value::Object(map) => map.get(LOAD_COUNT_FIELD).and_then(as_count),
        other => as_count(other),
    };
    Ok(count.unwrap_or(0))
}

/// Human-readable reason of a failed response
///
/// Uses the JSON `message` (or `error`) field when there is one, else the
/// raw body, else the fallback.
pub fn error_message(body: &str, fallback: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(message) => message,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => fallback.to_string(),
    }
}

fn parse(body: &str) -> Result<Value, LedgerError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(body)?)
}

fn unwrap_key(value: Value, key: &str) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        other => other,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
