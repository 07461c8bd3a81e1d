//! Client for the external AI backend.
//!
//! Sends `POST <backend.url>` with `{"message": <query>}` and hands back the
//! streaming response once its status and body have been checked. There
//! are no retries: a failed upstream call fails the chat request.
//!
//! # Error mapping
//!
//! | Condition | Client status | Message |
//! |-----------|---------------|---------|
//! | Connection/transport failure | 502 | `Backend error: Bad Gateway` |
//! | Upstream 4xx/5xx | same status | `Backend error: <reason phrase>` |
//! | Other non-2xx | 502 | `Backend error: <reason phrase>` |
//! | 204 or `Content-Length: 0` | 500 | `No response body from backend` |

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::context::RequestContext;

/// Header carrying the relay's request id to the backend.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("backend unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("backend returned {0}")]
    Status(StatusCode),

    #[error("backend response has no body")]
    MissingBody,
}

impl UpstreamError {
    /// Status code returned to the client.
    pub fn client_status(&self) -> StatusCode {
        match self {
            UpstreamError::Transport(_) => StatusCode::BAD_GATEWAY,
            UpstreamError::Status(status)
                if status.is_client_error() || status.is_server_error() =>
            {
                *status
            }
            UpstreamError::Status(_) => StatusCode::BAD_GATEWAY,
            UpstreamError::MissingBody => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the client-facing `{"error": ...}` body.
    pub fn client_message(&self) -> String {
        match self {
            UpstreamError::Transport(_) => {
                format!("Backend error: {}", reason(StatusCode::BAD_GATEWAY))
            }
            UpstreamError::Status(status) => format!("Backend error: {}", reason(*status)),
            UpstreamError::MissingBody => "No response body from backend".to_string(),
        }
    }
}

fn reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown Status")
}

#[derive(Serialize)]
struct BackendRequest<'a> {
    message: &'a str,
}

/// Shared HTTP client for backend calls.
///
/// Only a connect timeout is set; a total request timeout would cut off
/// long answers. Stalls mid-stream are handled by the relay's idle timeout.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout());
        if !config.system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;
        Ok(Self { http })
    }

    /// Opens the upstream stream for `query`.
    pub async fn open_stream(
        &self,
        ctx: &RequestContext,
        query: &str,
    ) -> Result<reqwest::Response, UpstreamError> {
        let response = self
            .http
            .post(&ctx.backend_url)
            .header(REQUEST_ID_HEADER, &ctx.request_id)
            .json(&BackendRequest { message: query })
            .send()
            .await
            .map_err(UpstreamError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }
        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(UpstreamError::MissingBody);
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = UpstreamError::Status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "Backend error: Internal Server Error");

        let err = UpstreamError::Status(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.client_status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.client_message(), "Backend error: Too Many Requests");

        let err = UpstreamError::Status(StatusCode::NOT_MODIFIED);
        assert_eq!(err.client_status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.client_message(), "Backend error: Not Modified");
    }

    #[test]
    fn test_missing_body_mapping() {
        let err = UpstreamError::MissingBody;
        assert_eq!(err.client_status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.client_message(), "No response body from backend");
    }
}
