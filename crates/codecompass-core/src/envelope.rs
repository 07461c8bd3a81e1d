//! The upstream's byte envelope.
//!
//! The AI backend serializes each outgoing byte buffer as a plain JSON
//! object: `{"0": 100, "1": 97, "2": 116, ...}`. This is an artifact of how
//! its runtime stringifies typed byte arrays, not a designed protocol. All
//! knowledge of it lives here so it can be removed once the backend sends
//! raw SSE.

use serde_json::{Map, Value};

use crate::error::FragmentError;
use crate::frame::DATA_PREFIX;

/// The key whose presence marks an object as an envelope.
pub const ENVELOPE_FIRST_KEY: &str = "0";

/// Returns true when `value` is an object with a `"0"` key.
pub fn is_envelope(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key(ENVELOPE_FIRST_KEY))
}

/// Reconstructs the byte buffer carried by an envelope.
///
/// Returns `Ok(None)` when `value` is not an envelope. Entries are ordered
/// by ascending numeric key; keys that are not canonical non-negative
/// integers are ignored.
pub fn decode_envelope(value: &Value) -> Result<Option<Vec<u8>>, FragmentError> {
    let Some(map) = value
        .as_object()
        .filter(|map| map.contains_key(ENVELOPE_FIRST_KEY))
    else {
        return Ok(None);
    };

    let mut indexed: Vec<(u64, u8)> = Vec::with_capacity(map.len());
    for (key, entry) in map {
        let Some(index) = canonical_index(key) else {
            continue;
        };
        let byte = entry
            .as_u64()
            .and_then(|b| u8::try_from(b).ok())
            .ok_or_else(|| FragmentError::BadByte { key: key.clone() })?;
        indexed.push((index, byte));
    }
    indexed.sort_unstable_by_key(|(index, _)| *index);

    Ok(Some(indexed.into_iter().map(|(_, byte)| byte).collect()))
}

/// Wraps `bytes` the way the upstream does.
pub fn encode_envelope(bytes: &[u8]) -> Value {
    let map: Map<String, Value> = bytes
        .iter()
        .enumerate()
        .map(|(i, b)| (i.to_string(), Value::from(*b)))
        .collect();
    Value::Object(map)
}

/// Produces one complete upstream document carrying `delta`, exactly as the
/// backend emits it on the wire. Handy for fake backends and fixtures.
pub fn encode_delta_document(delta: &str) -> String {
    let payload = serde_json::json!({ "content": { "delta": delta } });
    let frame = format!("{DATA_PREFIX}{payload}\n\n");
    encode_envelope(frame.as_bytes()).to_string()
}

fn canonical_index(key: &str) -> Option<u64> {
    let index: u64 = key.parse().ok()?;
    (index.to_string() == key).then_some(index)
}
