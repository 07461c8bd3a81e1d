//! # CodeCompass
//!
//! The chat relay behind CodeCompass. A signed-in user asks a question about
//! a connected repository; the relay forwards it to the AI backend and
//! streams the answer back to the browser as Server-Sent Events.
//!
//! The backend's stream is awkward: every SSE frame arrives wrapped in a
//! JSON object of byte values (`{"0":100,"1":97,...}`), several such objects
//! are concatenated with no separator, and transport chunks split them at
//! arbitrary points. The relay unwraps all of that and emits only
//! `data: {"content":"<delta>"}` events. The transcoding itself lives in
//! the I/O-free `codecompass-core` crate.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐  POST /api/chat  ┌──────────────────────────────┐  POST {message}  ┌────────────┐
//! │ Browser │ ───────────────▶ │ auth → context → upstream    │ ───────────────▶ │ AI backend │
//! │  (SSE)  │ ◀─────────────── │ relay ◀─ Transcoder (core)   │ ◀─────────────── │            │
//! └─────────┘  data: {...}\n\n └──────────────────────────────┘  byte envelopes  └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`auth`] | Session verification seam |
//! | [`context`] | Request-scoped context |
//! | [`upstream`] | AI backend client |
//! | [`relay`] | Upstream-to-SSE stream |
//! | [`server`] | HTTP server |
//! | [`transcode_cmd`] | Offline transcoding command |
//! | [`chat_cmd`] | Terminal chat client |

pub mod auth;
pub mod chat_cmd;
pub mod config;
pub mod context;
pub mod logging;
pub mod relay;
pub mod server;
pub mod transcode_cmd;
pub mod upstream;
