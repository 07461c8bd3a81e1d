//! `codecompass chat`: a terminal client for a running relay.
//!
//! Posts a query to `/api/chat` and prints each delta as it arrives, which
//! makes it easy to watch token streaming end to end without a browser.

use anyhow::{bail, Context, Result};
use codecompass_core::frame::SseFrameReader;
use codecompass_core::utf8::Utf8StreamDecoder;
use codecompass_core::ContentFrame;
use futures_util::StreamExt;
use std::io::Write;

/// Environment variable consulted when `--token` is not given.
pub const TOKEN_ENV: &str = "CODECOMPASS_TOKEN";

/// Sends `query` to the relay at `url` and streams the answer to stdout.
pub async fn run_chat(url: &str, token: Option<&str>, query: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let mut request = client
        .post(url)
        .json(&serde_json::json!({ "query": query }));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to reach relay at {}", url))?;

    let status = response.status();
    if !status.is_success() {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown error");
        bail!("relay returned {}: {}", status, message);
    }

    let mut decoder = Utf8StreamDecoder::new();
    let mut reader = SseFrameReader::new();
    let mut stdout = std::io::stdout();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("stream interrupted")?;
        for payload in reader.push(&decoder.decode(&chunk)) {
            match serde_json::from_str::<ContentFrame>(&payload) {
                Ok(frame) => {
                    write!(stdout, "{}", frame.content)?;
                    stdout.flush()?;
                }
                Err(e) => tracing::debug!(error = %e, "ignoring unexpected event payload"),
            }
        }
    }
    writeln!(stdout)?;

    if reader.has_partial() {
        bail!("stream ended mid-event");
    }
    Ok(())
}
