//! SSE frame parsing and encoding.
//!
//! Inbound, the text reconstructed from an envelope is a single SSE frame
//! (`data: {"content":{"delta":"..."}}`). Outbound, each delta becomes a
//! frame of the form `data: {"content":"..."}\n\n`, which is exactly what
//! the browser's SSE parser expects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FragmentError;

/// Prefix of every SSE data line.
pub const DATA_PREFIX: &str = "data: ";

/// Blank line terminating an SSE event.
pub const EVENT_TERMINATOR: &str = "\n\n";

/// A client-facing event carrying one delta fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFrame {
    pub content: String,
}

impl ContentFrame {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// The JSON payload, e.g. `{"content":"Hello"}`.
    pub fn to_json(&self) -> String {
        serde_json::json!({ "content": self.content }).to_string()
    }

    /// The complete SSE frame, e.g. `data: {"content":"Hello"}\n\n`.
    pub fn to_sse(&self) -> String {
        format!("{DATA_PREFIX}{}{EVENT_TERMINATOR}", self.to_json())
    }
}

/// Extracts `content.delta` from the text of one upstream SSE frame.
pub fn extract_delta(text: &str) -> Result<String, FragmentError> {
    let payload = text
        .strip_prefix(DATA_PREFIX)
        .ok_or(FragmentError::MissingDataPrefix)?;

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| FragmentError::InvalidFrameJson(e.to_string()))?;

    value
        .get("content")
        .and_then(|content| content.get("delta"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(FragmentError::MissingDelta)
}

/// Incremental reader for an SSE body, the client side of the relay.
///
/// Buffers text until a blank line completes an event, then yields the
/// event's `data` payload. Multiple `data:` lines in one event are joined
/// with `\n`; other fields (`event:`, `id:`, comments) are ignored.
#[derive(Debug, Default)]
pub struct SseFrameReader {
    buffer: String,
}

impl SseFrameReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` and returns the payloads of all events it completed.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.find(EVENT_TERMINATOR) {
            let event: String = self.buffer.drain(..end + EVENT_TERMINATOR.len()).collect();
            if let Some(payload) = event_data(&event) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// True when a partial event is still buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.trim().is_empty()
    }
}

/// Extracts the `data` payloads of every complete event in `body`.
pub fn parse_sse_frames(body: &str) -> Vec<String> {
    SseFrameReader::new().push(body)
}

fn event_data(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
