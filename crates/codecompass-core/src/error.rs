//! Reasons a single fragment of the upstream stream is skipped.
//!
//! None of these abort a stream. The transcoder reports them so callers
//! can log them; the fragment itself is dropped.

use thiserror::Error;

/// Why one candidate document produced no output frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FragmentError {
    /// The document ended before the JSON value was complete, typically
    /// because a chunk boundary cut it in half.
    #[error("truncated JSON document")]
    Truncated,

    /// The document is not valid JSON for a reason other than truncation.
    #[error("invalid JSON document: {0}")]
    InvalidJson(String),

    /// Valid JSON, but not an object keyed by `"0"`, `"1"`, ….
    #[error("document is not a byte envelope")]
    NotEnvelope,

    /// An envelope entry held something other than an integer in `0..=255`.
    #[error("envelope key {key:?} does not hold a byte value")]
    BadByte { key: String },

    /// The reconstructed text does not begin with `data: `.
    #[error("envelope text does not start with `data: `")]
    MissingDataPrefix,

    /// The text after `data: ` is not valid JSON.
    #[error("invalid JSON after `data: `: {0}")]
    InvalidFrameJson(String),

    /// The frame payload has no string at `content.delta`.
    #[error("frame payload has no string `content.delta`")]
    MissingDelta,

    /// A truncated trailing document outgrew the carry buffer.
    #[error("carried fragment of {len} bytes exceeds the {limit} byte limit")]
    CarryOverflow { len: usize, limit: usize },
}

impl FragmentError {
    /// Classifies a `serde_json` failure on an outer document.
    pub fn from_json(err: serde_json::Error) -> Self {
        if err.is_eof() {
            FragmentError::Truncated
        } else {
            FragmentError::InvalidJson(err.to_string())
        }
    }
}
