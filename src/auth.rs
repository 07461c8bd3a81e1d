//! Session verification.
//!
//! Sessions are owned by an external provider. The relay only needs to know
//! whether a request carries a valid one, so verification sits behind the
//! [`SessionVerifier`] trait. [`StaticTokenVerifier`] is the built-in
//! implementation, backed by the `[auth]` table of the config.
//!
//! A credential is read from `Authorization: Bearer <token>` first, then
//! from the session cookie (`cc_session` by default).

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};

use crate::config::AuthConfig;

/// A verified user session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
}

/// Decides whether a request is authenticated.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    /// Returns the session for a valid credential, or `None`.
    async fn verify(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Verifier that accepts a fixed set of tokens.
///
/// Tokens are stored as SHA-256 digests whether they were configured in
/// plain text or pre-hashed.
pub struct StaticTokenVerifier {
    cookie_name: String,
    digests: Vec<([u8; 32], String)>,
}

impl StaticTokenVerifier {
    pub fn from_config(config: &AuthConfig) -> Self {
        let digests = config
            .tokens
            .iter()
            .filter_map(|entry| {
                let digest = match (&entry.token, &entry.token_sha256) {
                    (Some(token), _) => Some(sha256(token)),
                    (None, Some(hex_digest)) => hex::decode(hex_digest)
                        .ok()
                        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok()),
                    (None, None) => None,
                }?;
                Some((digest, entry.user_id.clone()))
            })
            .collect();

        Self {
            cookie_name: config.cookie_name.clone(),
            digests,
        }
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    fn lookup(&self, credential: &str) -> Option<Session> {
        let presented = sha256(credential);
        self.digests
            .iter()
            .find(|(digest, _)| *digest == presented)
            .map(|(_, user_id)| Session {
                user_id: user_id.clone(),
            })
    }
}

#[async_trait]
impl SessionVerifier for StaticTokenVerifier {
    async fn verify(&self, headers: &HeaderMap) -> Option<Session> {
        let credential =
            bearer_token(headers).or_else(|| cookie_value(headers, &self.cookie_name))?;
        self.lookup(credential)
    }
}

/// Extracts the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Extracts a named cookie from any `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Lowercase hex SHA-256 of `token`, the form `token_sha256` expects.
pub fn token_digest_hex(token: &str) -> String {
    hex::encode(sha256(token))
}

fn sha256(input: &str) -> [u8; 32] {
    Sha256::digest(input.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use axum::http::HeaderValue;

    fn verifier() -> StaticTokenVerifier {
        StaticTokenVerifier::from_config(&AuthConfig {
            cookie_name: "cc_session".to_string(),
            tokens: vec![
                TokenConfig {
                    user_id: "alice".to_string(),
                    token: Some("alice-secret".to_string()),
                    token_sha256: None,
                },
                TokenConfig {
                    user_id: "bob".to_string(),
                    token: None,
                    token_sha256: Some(token_digest_hex("bob-secret")),
                },
            ],
        })
    }

    fn headers(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(name, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn test_plain_and_hashed_tokens_both_loaded() {
        let v = verifier();
        assert_eq!(v.len(), 2);
        assert!(!v.is_empty());
        assert!(StaticTokenVerifier::from_config(&AuthConfig::default()).is_empty());
    }

    #[tokio::test]
    async fn test_bearer_plain_token() {
        let session = verifier()
            .verify(&headers(header::AUTHORIZATION, "Bearer alice-secret"))
            .await;
        assert_eq!(session.map(|s| s.user_id), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_cookie_hashed_token() {
        let session = verifier()
            .verify(&headers(header::COOKIE, "theme=dark; cc_session=bob-secret"))
            .await;
        assert_eq!(session.map(|s| s.user_id), Some("bob".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_or_missing_credential() {
        let v = verifier();
        assert!(v.verify(&HeaderMap::new()).await.is_none());
        assert!(v
            .verify(&headers(header::AUTHORIZATION, "Bearer nope"))
            .await
            .is_none());
        assert!(v
            .verify(&headers(header::AUTHORIZATION, "Basic alice-secret"))
            .await
            .is_none());
        assert!(v
            .verify(&headers(header::COOKIE, "cc_session="))
            .await
            .is_none());
    }

    #[test]
    fn test_digest_hex_shape() {
        let digest = token_digest_hex("x");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
