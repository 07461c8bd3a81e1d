//! # CodeCompass Core
//!
//! Pure transcoding logic for the CodeCompass chat relay: turns the AI
//! backend's streamed byte envelopes into client-facing Server-Sent-Events
//! frames carrying only `{"content": "<delta>"}` payloads.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. Chunks go in as
//! byte slices and frames come out as values, so the same pipeline serves
//! the HTTP relay, the offline `transcode` command, and tests.
//!
//! ## Pipeline
//!
//! ```text
//! raw chunk ─▶ utf8 ─▶ split "}{" ─▶ JSON ─▶ envelope bytes ─▶ "data: " ─▶ content.delta
//!                                                                              │
//!                                                        data: {"content":…}\n\n ◀┘
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`utf8`] | Stateful UTF-8 decoding across chunk boundaries |
//! | [`split`] | Splitting concatenated JSON documents |
//! | [`envelope`] | The upstream's byte-array-as-object wire quirk |
//! | [`frame`] | SSE frame parsing and encoding |
//! | [`transcoder`] | The per-stream [`Transcoder`](transcoder::Transcoder) |
//! | [`error`] | Non-fatal fragment skip reasons |

pub mod envelope;
pub mod error;
pub mod frame;
pub mod split;
pub mod transcoder;
pub mod utf8;

pub use error::FragmentError;
pub use frame::ContentFrame;
pub use transcoder::{BoundaryPolicy, TranscodeStats, Transcoded, Transcoder, TranscoderOptions};
