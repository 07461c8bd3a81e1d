//! Request-scoped context.
//!
//! Everything a chat request needs beyond its body is resolved once, up
//! front, into a [`RequestContext`] and passed explicitly to the upstream
//! client and the relay. Nothing downstream reads config or headers again.

use codecompass_core::TranscoderOptions;
use std::time::Duration;
use tracing::Span;
use uuid::Uuid;

use crate::auth::Session;
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlates log lines for one request.
    pub request_id: String,
    pub session: Session,
    pub backend_url: String,
    /// Longest wait for the next upstream chunk before the relay gives up.
    pub idle_timeout: Duration,
    pub transcoder: TranscoderOptions,
    /// `chat` span carrying `request_id` and `user_id`; every event the
    /// request logs is recorded inside it.
    pub span: Span,
}

impl RequestContext {
    pub fn new(config: &Config, session: Session) -> Self {
        let request_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "chat",
            request_id = %request_id,
            user_id = %session.user_id,
        );
        Self {
            request_id,
            span,
            session,
            backend_url: config.backend.url.clone(),
            idle_timeout: config.backend.idle_timeout(),
            transcoder: config.transcoder.options(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecompass_core::BoundaryPolicy;

    #[test]
    fn test_context_captures_config() {
        let mut config = Config::minimal();
        config.backend.url = "http://backend.test/chat".to_string();
        config.backend.idle_timeout_secs = 5;
        config.transcoder.boundary = BoundaryPolicy::Carry;

        let session = Session {
            user_id: "alice".to_string(),
        };
        let a = RequestContext::new(&config, session.clone());
        let b = RequestContext::new(&config, session);

        assert_eq!(a.backend_url, "http://backend.test/chat");
        assert_eq!(a.idle_timeout, Duration::from_secs(5));
        assert_eq!(a.transcoder.policy, BoundaryPolicy::Carry);
        assert_eq!(a.session.user_id, "alice");
        assert_ne!(a.request_id, b.request_id);
    }
}
